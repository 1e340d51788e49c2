use crate::shared::clock::now_secs;
use crate::shared::ids::generate_id;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Applied,
    RolledBack,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Applied | StepStatus::Failed | StepStatus::Skipped | StepStatus::RolledBack
        )
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Approved => write!(f, "approved"),
            StepStatus::Applied => write!(f, "applied"),
            StepStatus::RolledBack => write!(f, "rolled_back"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A recorded human grant permitting one specific step to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub approved_by: String,
    pub approved_at: i64,
    #[serde(default)]
    pub note: Option<String>,
}

impl Approval {
    pub fn new(approved_by: impl Into<String>) -> Self {
        Self {
            approved_by: approved_by.into(),
            approved_at: now_secs(),
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default = "default_requires_approval")]
    pub requires_approval: bool,
    #[serde(default = "default_status")]
    pub status: StepStatus,
}

impl PlanStep {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: generate_id("step", now_secs()),
            title: title.into(),
            description: description.into(),
            tool: None,
            args: Map::new(),
            requires_approval: true,
            status: StepStatus::Pending,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>, args: Map<String, Value>) -> Self {
        self.tool = Some(tool.into());
        self.args = args;
        self
    }

    pub fn auto_approved(mut self) -> Self {
        self.requires_approval = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub objective: String,
    pub steps: Vec<PlanStep>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Plan {
    pub fn new(objective: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let now = now_secs();
        Self {
            id: generate_id("plan", now),
            objective: objective.into(),
            steps,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What a tool handler hands back to the engine; ephemeral, copied into the
/// journal record on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(default)]
    pub output: Map<String, Value>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub diff: Option<String>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
}

impl ToolResult {
    pub fn with_output(output: Map<String, Value>) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }
}

/// One audit entry per execution attempt; never mutated after reaching a
/// terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub id: String,
    pub run_id: String,
    pub step_id: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
    pub status: StepStatus,
    pub started_at: i64,
    #[serde(default)]
    pub finished_at: Option<i64>,
    #[serde(default)]
    pub output: Option<Map<String, Value>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub diff: Option<String>,
}

impl ActionRecord {
    pub(crate) fn start(run_id: &str, step: &PlanStep) -> Self {
        let now = now_secs();
        Self {
            id: generate_id("act", now),
            run_id: run_id.to_string(),
            step_id: step.id.clone(),
            tool: step.tool.clone(),
            args: step.args.clone(),
            status: StepStatus::Pending,
            started_at: now,
            finished_at: None,
            output: None,
            error: None,
            approvals: Vec::new(),
            artifacts: Vec::new(),
            diff: None,
        }
    }
}

/// Pointer to a captured prior state of a workspace path; content mechanics
/// live with the snapshot store, not the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRef {
    pub id: String,
    pub kind: String,
    pub target_path: String,
    pub created_at: i64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_requires_approval() -> bool {
    true
}

fn default_status() -> StepStatus {
    StepStatus::Pending
}
