use crate::engine::error::EngineError;
use crate::engine::policy::{
    ExecutionPolicy, DEFAULT_MAX_DATA_BYTES, DEFAULT_MAX_SHELL_SECONDS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

/// YAML-loadable mirror of the policy knobs. `into_policy` is the only way
/// from here to an [`ExecutionPolicy`], so the allow-list narrowing invariant
/// is enforced on every load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,
    #[serde(default = "default_max_data_bytes")]
    pub max_data_bytes: u64,
    #[serde(default)]
    pub allow_network: bool,
    #[serde(default)]
    pub allow_shell: bool,
    #[serde(default)]
    pub allowed_shell_commands: Vec<String>,
    #[serde(default = "default_max_shell_seconds")]
    pub max_shell_seconds: u64,
    #[serde(default = "default_require_approval")]
    pub require_approval_for_destructive: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_paths: Vec::new(),
            max_data_bytes: default_max_data_bytes(),
            allow_network: false,
            allow_shell: false,
            allowed_shell_commands: Vec::new(),
            max_shell_seconds: default_max_shell_seconds(),
            require_approval_for_destructive: default_require_approval(),
        }
    }
}

impl PolicyConfig {
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    pub fn into_policy(self, trusted_root: &Path) -> Result<ExecutionPolicy, EngineError> {
        let mut policy = ExecutionPolicy::new(trusted_root)?;
        policy.max_data_bytes = self.max_data_bytes;
        policy.allow_network = self.allow_network;
        policy.allow_shell = self.allow_shell;
        policy.allowed_shell_commands = self.allowed_shell_commands;
        policy.max_shell_seconds = self.max_shell_seconds;
        policy.require_approval_for_destructive = self.require_approval_for_destructive;
        policy.with_allowed_paths(&self.allowed_paths)
    }
}

pub fn load_policy_config(path: &Path) -> Result<PolicyConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn default_max_data_bytes() -> u64 {
    DEFAULT_MAX_DATA_BYTES
}

fn default_max_shell_seconds() -> u64 {
    DEFAULT_MAX_SHELL_SECONDS
}

fn default_require_approval() -> bool {
    true
}
