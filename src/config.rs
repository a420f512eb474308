//! Consensus configuration
//!
//! Configured externally (JSON file or constructors), immutable once the
//! consensus instance is built. Fault injection is off unless the
//! configuration turns it on, so production configs cannot carry hooks.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::consensus::ConsensusError;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ConsensusError {
    fn from(err: ConfigError) -> Self {
        ConsensusError::configuration_error(err.to_string())
    }
}

/// Per-replica consensus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Tablet (partition) this consensus instance replicates. Required.
    pub tablet_id: String,

    /// This peer's identity, auto-generated when absent.
    #[serde(default = "Uuid::new_v4")]
    pub peer_id: Uuid,

    /// Whether fault hooks may be installed (default: false).
    #[serde(default)]
    pub fault_injection_enabled: bool,
}

impl ConsensusConfig {
    /// Create a production configuration for `tablet_id`.
    pub fn new(tablet_id: impl Into<String>) -> Self {
        Self {
            tablet_id: tablet_id.into(),
            peer_id: Uuid::new_v4(),
            fault_injection_enabled: false,
        }
    }

    /// Allow fault hooks to be installed. Test wiring only.
    pub fn with_fault_injection(self) -> Self {
        Self {
            fault_injection_enabled: true,
            ..self
        }
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate configuration from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: ConsensusConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tablet_id.trim().is_empty() {
            return Err(ConfigError::Invalid("tablet_id must not be empty".to_string()));
        }
        if self.peer_id.is_nil() {
            return Err(ConfigError::Invalid("peer_id must not be nil".to_string()));
        }
        Ok(())
    }
}
