//! Binding layer configuration (`ulbind.toml`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BindError, Result};

/// Default config file name looked up by the CLI.
pub const CONFIG_FILE: &str = "ulbind.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Used by [`Renderer::create_view_default`](crate::Renderer::create_view_default).
    pub force_cpu_renderer: bool,
    /// Ask the engine to log its memory statistics right before disposal.
    pub log_memory_on_dispose: bool,
    /// Sweep stale registry entries every this many update calls; 0 disables.
    pub sweep_interval: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            force_cpu_renderer: false,
            log_memory_on_dispose: false,
            sweep_interval: 64,
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| BindError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| BindError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("{} not found, using default config", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str("force_cpu_renderer = true\n").unwrap();
        assert!(config.force_cpu_renderer);
        assert!(!config.log_memory_on_dispose);
        assert_eq!(config.sweep_interval, 64);
    }

    #[test]
    fn test_malformed_file() {
        let err = Config::from_toml_str("sweep_interval = \"often\"").unwrap_err();
        assert!(matches!(err, BindError::Config(_)));
    }

    #[test]
    fn test_missing_file_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/ulbind.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
