use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Session tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Maximum number of queued changes coalesced into one render
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Run deferred effects at the end of every render cycle
    #[serde(default = "default_run_effects")]
    pub run_effects: bool,

    /// Trace the wire form of every emitted batch
    #[serde(default)]
    pub log_patches: bool,
}

fn default_max_batch() -> usize {
    1024
}

fn default_run_effects() -> bool {
    true
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_batch: default_max_batch(),
            run_effects: default_run_effects(),
            log_patches: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{ "maxBatch": 8, "runEffects": false, "logPatches": true }"#;

        let config = SessionConfig::from_json(json).unwrap();
        assert_eq!(config.max_batch, 8);
        assert!(!config.run_effects);
        assert!(config.log_patches);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.max_batch, 1024);
        assert!(config.run_effects);
    }

    #[test]
    fn test_invalid_config() {
        let error = SessionConfig::from_json(r#"{ "maxBatch": "many" }"#).unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = SessionConfig::load("/nonexistent/arbor.config.json").unwrap();
        assert_eq!(config, SessionConfig::default());
    }
}
