//! vmfleet tool settings
//!
//! Which helper program drives each cloud, where each cloud is queried,
//! how many provider calls may run at once and how long readiness waits
//! last. Declarations (deployments, instance defaults) are not settings and
//! are loaded by `vmfleet-core`.

pub mod error;
pub mod settings;

pub use error::{Result, SettingsError};
pub use settings::{CloudSettings, Clouds, Scopes, Settings, WaitSettings};

use std::path::PathBuf;

/// Environment variable pointing directly at a settings file
pub const CONFIG_ENV: &str = "VMFLEET_CONFIG";

const CANDIDATES: [&str; 2] = ["vmfleet.local.yaml", "vmfleet.yaml"];

/// Find the settings file.
///
/// Search order:
/// 1. `VMFLEET_CONFIG` (direct path)
/// 2. current directory: `vmfleet.local.yaml`, `vmfleet.yaml`
/// 3. `~/.config/vmfleet/vmfleet.yaml`
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(path = %path.display(), "{} points to a missing file", CONFIG_ENV);
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("vmfleet").join("vmfleet.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

/// Load settings from the discovered file (or defaults) and apply
/// environment overrides.
pub fn load_settings() -> Result<Settings> {
    let mut settings = match find_settings_file()? {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading settings");
            Settings::from_path(&path)?
        }
        None => {
            tracing::debug!("No settings file, using defaults");
            Settings::default()
        }
    };
    settings.apply_env();
    Ok(settings)
}
