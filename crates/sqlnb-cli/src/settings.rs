//! Settings file utilities

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sqlnb_connection::ManagerSettings;

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("sqlnb"))
}

pub fn settings_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Load manager settings from the default location
pub fn load() -> Result<ManagerSettings> {
    load_from(&settings_file()?)
}

/// Load manager settings from `path`
///
/// A missing file means defaults; a file that exists but does not parse
/// is an error rather than being silently ignored.
pub fn load_from(path: &Path) -> Result<ManagerSettings> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(ManagerSettings::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {:?}", path))?;
    let settings: ManagerSettings = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings file: {:?}", path))?;
    tracing::debug!(path = %path.display(), ?settings, "loaded settings");
    Ok(settings)
}
