use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ValueError, ValueResult};

/// Name of the environment variable containing the path to the configuration file.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CONFIG_HOME/lazyval/config.toml` or `$HOME/.config/lazyval/config.toml`
///  (2) on Windows: `%APPDATA%\lazyval\config.toml`
pub const ENV_CONFIG_PATH: &str = "LAZYVAL_CONFIG_PATH";

/// Number of layers an update chain may reach before its base is flattened.
pub const DEFAULT_MAX_LAYER_DEPTH: usize = 8;

/// Nesting limit of a deep extraction.
pub const DEFAULT_MAX_EXTRACT_DEPTH: usize = 4096;

/// Tunables of the value model, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValueConfig {
    /// Update chains are flattened once they reach this many layers.
    pub max_layer_depth: usize,

    /// Deep extraction faults past this many nested containers.
    pub max_extract_depth: usize,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            max_layer_depth: DEFAULT_MAX_LAYER_DEPTH,
            max_extract_depth: DEFAULT_MAX_EXTRACT_DEPTH,
        }
    }
}

impl ValueConfig {
    /// Get the default path to the configuration file.
    pub fn default_path() -> PathBuf {
        if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
            return config_path.into();
        }

        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push("lazyval");
        path.push("config.toml");
        path
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ValueResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ValueError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> ValueResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!("Loaded value model configuration from `{}`: {:?}", path.display(), config);
        Ok(config)
    }

    /// Load `path`, or the defaults when no file exists there.
    pub fn load_or_default(path: &Path) -> ValueResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No configuration at `{}`, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> ValueResult<String> {
        toml::to_string(self).map_err(|e| ValueError::Config(e.to_string()))
    }

    fn validate(&self) -> ValueResult<()> {
        if self.max_layer_depth == 0 {
            return Err(ValueError::Config(
                "`max_layer_depth` must be at least 1".to_string(),
            ));
        }
        if self.max_extract_depth == 0 {
            return Err(ValueError::Config(
                "`max_extract_depth` must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ValueConfig::from_toml_str("max_layer_depth = 3").unwrap();
        assert_eq!(config.max_layer_depth, 3);
        assert_eq!(config.max_extract_depth, DEFAULT_MAX_EXTRACT_DEPTH);
    }

    #[test]
    fn rejects_zero_depth_and_unknown_keys() {
        assert!(
            ValueConfig::from_toml_str("max_layer_depth = 0")
                .unwrap_err()
                .is_config()
        );
        assert!(
            ValueConfig::from_toml_str("flatten = true")
                .unwrap_err()
                .is_config()
        );
    }

    #[test]
    fn toml_roundtrip() {
        let config = ValueConfig {
            max_layer_depth: 5,
            max_extract_depth: 64,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(ValueConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("lazyval-missing-config/config.toml");
        assert_eq!(
            ValueConfig::load_or_default(&path).unwrap(),
            ValueConfig::default()
        );
    }
}
