//! Engine configuration
//!
//! Settings that can be serialized and loaded from a RON configuration file.
//! Missing fields fall back to their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for an editing session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Time a single kernel call may take before it is abandoned
    #[serde(default = "default_kernel_time_budget_ms")]
    pub kernel_time_budget_ms: u64,
    /// Author recorded on new branches
    #[serde(default = "default_author")]
    pub default_author: String,
    /// Name of the branch a fresh session starts on
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_kernel_time_budget_ms() -> u64 {
    30_000
}

fn default_author() -> String {
    "anonymous".to_owned()
}

fn default_branch() -> String {
    "main".to_owned()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kernel_time_budget_ms: default_kernel_time_budget_ms(),
            default_author: default_author(),
            default_branch: default_branch(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kernel_time_budget(&self) -> Duration {
        Duration::from_millis(self.kernel_time_budget_ms)
    }

    pub fn with_kernel_time_budget(mut self, budget: Duration) -> Self {
        self.kernel_time_budget_ms = budget.as_millis() as u64;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.default_author = author.into();
        self
    }

    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        ron::from_str(&content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Save configuration to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

/// Configuration file errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}
