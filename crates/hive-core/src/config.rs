//! Runtime configuration for the swarm kernel.
//!
//! Every field has a serde default, so a partial (or absent) config file
//! yields a working configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Kernel configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmConfig {
    /// Base directory under which bound projects resolve.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Maximum engine recursion depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// How many trailing history entries go into the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// How many trailing source entries a handoff carries.
    #[serde(default = "default_handoff_window")]
    pub handoff_window: usize,
    /// Provider retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_project_root() -> PathBuf {
    PathBuf::from("/projects")
}
fn default_max_depth() -> u32 {
    5
}
fn default_history_window() -> usize {
    50
}
fn default_handoff_window() -> usize {
    10
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            max_depth: default_max_depth(),
            history_window: default_history_window(),
            handoff_window: default_handoff_window(),
            retry: RetryConfig::default(),
        }
    }
}

impl SwarmConfig {
    /// Load from a JSON file. Missing file yields the defaults; a present
    /// but malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Resolve a project name to its absolute root directory.
    #[must_use]
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.project_root.join(project)
    }
}
