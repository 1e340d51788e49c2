pub mod error;
pub mod journal;
pub mod model;
pub mod policy;
pub mod router;
pub mod runtime;
pub mod snapshot;

pub use error::EngineError;
pub use journal::ActionJournal;
pub use model::{ActionRecord, Approval, Plan, PlanStep, SnapshotRef, StepStatus, ToolResult};
pub use policy::{validate_path, ExecutionPolicy};
pub use router::{ToolArgSchema, ToolArgType, ToolDefinition, ToolHandler, ToolRouter, ToolSchema};
pub use runtime::PlanRuntime;
pub use snapshot::SnapshotStore;
