//! Optional settings file
//!
//! Looked up at `--config` or `<config dir>/summarizely/config.toml`.
//! Command-line flags override anything set here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Provider id, e.g. "ollama" or "claude-cli"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_chars: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub stream: Option<bool>,
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("summarizely").join("config.toml"))
}

/// Load settings. An explicit path must exist; the default one may not.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_path() {
            Some(path) => (path, false),
            None => return Ok(Settings::default()),
        },
    };

    if !path.exists() {
        if explicit {
            bail!("config file not found: {}", path.display());
        }
        tracing::debug!("No config file at {:?}, using defaults", path);
        return Ok(Settings::default());
    }

    tracing::debug!("Loading config from {:?}", path);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_settings(&contents).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents)?;
    if settings.max_chars == Some(0) {
        bail!("max_chars must be a positive number");
    }
    Ok(settings)
}
