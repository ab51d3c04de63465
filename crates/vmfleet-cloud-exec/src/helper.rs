//! Helper executable wrapper
//!
//! Runs `<program> [args...] <subcommand> [options] --output json`. Requests
//! that carry a document (create, and every per-instance call) write it as
//! JSON on the helper's stdin; replies are JSON on stdout.

use crate::error::{ExecError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use vmfleet_core::{GroupSpec, InstanceRecord, InstanceState};

/// Helper program wrapper
#[derive(Debug, Clone)]
pub struct Helper {
    program: String,
    /// Passed before the subcommand on every call
    args: Vec<String>,
    /// Passed after the subcommand on every call (project, resource group...)
    options: Vec<String>,
}

/// An instance as reported by the helper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperInstance {
    #[serde(flatten)]
    pub record: InstanceRecord,
    #[serde(default = "running")]
    pub state: InstanceState,
}

fn running() -> InstanceState {
    InstanceState::Running
}

/// Document sent to `create`
#[derive(Debug, Serialize)]
pub struct CreatePayload<'a> {
    pub deployment_id: &'a str,
    pub name: &'a str,
    pub index: u32,
    pub instance_type: &'a str,
    pub tags: BTreeMap<String, String>,
    pub group: &'a GroupSpec,
}

#[derive(Debug, Serialize)]
struct ResizePayload<'a> {
    instance: &'a InstanceRecord,
    instance_type: &'a str,
}

impl Helper {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add `--<name> <value>` to every call.
    pub fn with_option(mut self, name: &str, value: impl Into<String>) -> Self {
        self.options.push(format!("--{}", name));
        self.options.push(value.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run a subcommand and return stdout
    async fn run(&self, subcommand: &str, extra: &[&str], input: Option<Vec<u8>>) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.arg(subcommand);
        cmd.args(&self.options);
        cmd.args(extra);
        cmd.args(["--output", "json"]);
        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: {} {} {}", self.program, subcommand, extra.join(" "));

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExecError::HelperNotFound(self.program.clone()),
            _ => ExecError::IoError(e),
        })?;

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            let mut written = stdin.write_all(&input).await;
            if written.is_ok() {
                written = stdin.shutdown().await;
            }
            // a helper may exit without reading its input
            if let Err(e) = written {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecError::CommandFailed {
                program: self.program.clone(),
                subcommand: subcommand.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn parse<T: serde::de::DeserializeOwned>(subcommand: &str, output: &str) -> Result<T> {
        if output.trim().is_empty() {
            return Err(ExecError::InvalidOutput {
                subcommand: subcommand.to_string(),
                message: "empty output".to_string(),
            });
        }
        Ok(serde_json::from_str(output)?)
    }

    /// Regions the helper can list in
    pub async fn regions(&self) -> Result<Vec<String>> {
        let output = self.run("regions", &[], None).await?;
        Self::parse("regions", &output)
    }

    /// Instances tagged with `deployment_id`, in any state
    pub async fn list(&self, deployment_id: &str, region: Option<&str>) -> Result<Vec<HelperInstance>> {
        let mut args = vec!["--deployment-id", deployment_id];
        if let Some(region) = region {
            args.push("--region");
            args.push(region);
        }
        let output = self.run("list", &args, None).await?;

        if output.trim().is_empty() || output.trim() == "[]" {
            return Ok(Vec::new());
        }
        Self::parse("list", &output)
    }

    pub async fn create(&self, payload: &CreatePayload<'_>) -> Result<HelperInstance> {
        let input = serde_json::to_vec(payload)?;
        let output = self
            .run("create", &["--name", payload.name], Some(input))
            .await?;
        Self::parse("create", &output)
    }

    /// Current view of an instance; `None` when the helper prints nothing
    /// (or `null`) because the instance no longer exists.
    pub async fn describe(&self, instance: &InstanceRecord) -> Result<Option<HelperInstance>> {
        let output = self.run_on("describe", instance).await?;
        let trimmed = output.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }
        Self::parse("describe", trimmed).map(Some)
    }

    pub async fn delete(&self, instance: &InstanceRecord) -> Result<()> {
        self.run_on("delete", instance).await?;
        Ok(())
    }

    pub async fn stop(&self, instance: &InstanceRecord) -> Result<()> {
        self.run_on("stop", instance).await?;
        Ok(())
    }

    pub async fn start(&self, instance: &InstanceRecord) -> Result<()> {
        self.run_on("start", instance).await?;
        Ok(())
    }

    pub async fn resize(&self, instance: &InstanceRecord, instance_type: &str) -> Result<()> {
        let input = serde_json::to_vec(&ResizePayload {
            instance,
            instance_type,
        })?;
        self.run(
            "resize",
            &["--id", instance.id.as_str(), "--instance-type", instance_type],
            Some(input),
        )
        .await?;
        Ok(())
    }

    async fn run_on(&self, subcommand: &str, instance: &InstanceRecord) -> Result<String> {
        let input = serde_json::to_vec(instance)?;
        self.run(subcommand, &["--id", instance.id.as_str()], Some(input)).await
    }
}
