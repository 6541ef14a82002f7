//! Client configuration.
//!
//! Set once when the client is constructed and never mutated while a request
//! is in flight.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_USER_AGENT: &str = "PalmHTTP/0.1";
pub const DEFAULT_CONTENT_TYPE: &str = "text/xml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("timeout must be at least one second")]
    ZeroTimeout,
}

/// Process-wide settings shared by every request a client issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connect, read and write timeout enforced by the transport.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Content-Type sent with POST bodies.
    pub content_type: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_timeout_secs(timeout_secs: u64) -> Result<Self, ConfigError> {
        let config = Self {
            timeout_secs,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
