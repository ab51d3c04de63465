//! Helper-executable provisioning backend for vmfleet
//!
//! Implements `ProvisioningBackend` by running one external program per
//! cloud (`vmfleet-aws`, `vmfleet-gcp`, `vmfleet-azure` by default). The
//! helper owns the provider SDK and credentials; this crate only speaks its
//! JSON protocol.
//!
//! # Helper protocol
//!
//! Every call is `<program> <subcommand> [options] --output json`:
//!
//! | subcommand | stdin | stdout |
//! |---|---|---|
//! | `regions` | - | `["us-east-1", ...]` |
//! | `list --deployment-id ID [--region R]` | - | `[instance, ...]` |
//! | `create --name NAME` | create document | `instance` |
//! | `describe --id ID` | instance | `instance`, or nothing/`null` once it is gone |
//! | `delete`, `stop`, `start --id ID` | instance | ignored |
//! | `resize --id ID --instance-type T` | `{instance, instance_type}` | ignored |
//!
//! An `instance` is an `InstanceRecord` plus a `state` field (`pending`,
//! `running`, `stopping`, `stopped`, `terminating`, `terminated`). A non-zero
//! exit status is a failure; stderr becomes the error message.
//!
//! # Example
//!
//! ```ignore
//! use vmfleet_cloud_exec::{ExecBackend, Helper};
//! use vmfleet_core::Cloud;
//!
//! let backend = ExecBackend::new(Cloud::Gcp, Helper::new("vmfleet-gcp").with_option("project", "acme"));
//! ```

pub mod error;
pub mod helper;
pub mod provider;

pub use error::{ExecError, Result};
pub use helper::{CreatePayload, Helper, HelperInstance};
pub use provider::ExecBackend;
