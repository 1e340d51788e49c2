use crate::engine::model::StepStatus;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("sandbox violation for `{path}`: {reason}")]
    SandboxViolation { path: String, reason: String },
    #[error("approval required for tool `{tool}`")]
    ApprovalRequired { tool: String },
    #[error("tool not registered: `{tool}`")]
    UnknownTool { tool: String },
    #[error("missing required argument `{arg}` for tool `{tool}`")]
    MissingToolArg { tool: String, arg: String },
    #[error("unknown argument `{arg}` for tool `{tool}`")]
    UnknownToolArg { tool: String, arg: String },
    #[error("invalid argument type for `{tool}.{arg}`; expected {expected}")]
    InvalidToolArgType {
        tool: String,
        arg: String,
        expected: String,
    },
    #[error("tool `{tool}` failed: {reason}")]
    ToolFailed { tool: String, reason: String },
    #[error("shell execution is disabled by policy")]
    ShellDisabled,
    #[error("shell command not in allow-list: `{command}`")]
    ShellCommandNotAllowed { command: String },
    #[error("shell command timed out after {timeout_seconds}s")]
    ShellTimeout { timeout_seconds: u64 },
    #[error("action record `{record_id}` not found")]
    UnknownRecord { record_id: String },
    #[error("action record transition `{from}` -> `{to}` is invalid")]
    InvalidRecordTransition { from: StepStatus, to: StepStatus },
    #[error("snapshot `{snapshot_id}` not found")]
    SnapshotNotFound { snapshot_id: String },
    #[error("policy error: {0}")]
    Config(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("sqlite error at {path}: {source}")]
    Sqlite {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl EngineError {
    /// Containment failures, as opposed to policy gates such as
    /// [`EngineError::ApprovalRequired`].
    pub fn is_sandbox_violation(&self) -> bool {
        matches!(self, Self::SandboxViolation { .. })
    }
}
