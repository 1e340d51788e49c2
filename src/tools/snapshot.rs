use crate::engine::model::ToolResult;
use crate::engine::policy::{validate_path, ExecutionPolicy};
use crate::engine::router::{ToolArgType, ToolDefinition};
use crate::engine::snapshot::SnapshotStore;
use crate::tools::{args_schema, optional_str, required_str};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Lets a plan step capture state before a destructive edit. The store handle
/// is shared with the runtime, so references created here are visible to the
/// caller for rollback after the run.
pub fn create_snapshot_tool(
    policy: &ExecutionPolicy,
    store: &Arc<Mutex<SnapshotStore>>,
) -> ToolDefinition {
    let policy = policy.clone();
    let store = Arc::clone(store);
    ToolDefinition {
        name: "create_snapshot".to_string(),
        description: "Capture a point-in-time snapshot of a workspace path.".to_string(),
        destructive: false,
        args: args_schema(&[
            ("path", ToolArgType::String, true, "workspace path to snapshot"),
            (
                "kind",
                ToolArgType::String,
                false,
                "snapshot kind label, default `file`",
            ),
        ]),
        handler: Box::new(move |args| {
            let path = required_str("create_snapshot", args, "path")?;
            let kind = optional_str(args, "kind").unwrap_or("file");
            let resolved = validate_path(Path::new(path), &policy)?;
            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            // existing files get their content copied; anything else is a
            // reference-only snapshot
            let snapshot = if resolved.is_file() {
                store.capture_file(kind, &resolved.display().to_string(), Map::new())?
            } else {
                store.create_snapshot(kind, &resolved.display().to_string(), Map::new())?
            };
            let mut output = Map::from_iter([
                ("snapshot_id".to_string(), Value::String(snapshot.id)),
                ("path".to_string(), Value::String(snapshot.target_path)),
                (
                    "captured".to_string(),
                    Value::Bool(snapshot.metadata.contains_key("snapshotPath")),
                ),
            ]);
            if let Some(digest) = snapshot.metadata.get("digest") {
                output.insert("digest".to_string(), digest.clone());
            }
            Ok(ToolResult::with_output(output))
        }),
    }
}
