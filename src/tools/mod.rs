pub mod database;
pub mod shell;
pub mod snapshot;
pub mod workspace;

use crate::engine::error::EngineError;
use crate::engine::policy::ExecutionPolicy;
use crate::engine::router::{ToolArgSchema, ToolArgType, ToolRouter};
use crate::engine::snapshot::SnapshotStore;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Installs every built-in tool. Callers layer their own domain tools on top
/// via `router.register`.
pub fn register_builtin_tools(
    router: &mut ToolRouter,
    policy: &ExecutionPolicy,
    snapshots: &Arc<Mutex<SnapshotStore>>,
) {
    router.register(workspace::list_dir_tool(policy));
    router.register(workspace::read_file_tool(policy));
    router.register(workspace::search_text_tool(policy));
    router.register(workspace::write_file_tool(policy));
    router.register(workspace::append_file_tool(policy));
    router.register(workspace::replace_text_tool(policy));
    router.register(workspace::write_markdown_tool(policy));
    router.register(shell::run_shell_tool(policy));
    router.register(database::list_sqlite_files_tool(policy));
    router.register(database::list_db_tables_tool(policy));
    router.register(database::query_db_tool(policy));
    router.register(snapshot::create_snapshot_tool(policy, snapshots));
}

pub(crate) fn args_schema(
    specs: &[(&str, ToolArgType, bool, &str)],
) -> Option<BTreeMap<String, ToolArgSchema>> {
    let mut schema = BTreeMap::new();
    for (name, arg_type, required, description) in specs {
        schema.insert(
            (*name).to_string(),
            ToolArgSchema {
                arg_type: *arg_type,
                required: *required,
                description: (*description).to_string(),
            },
        );
    }
    Some(schema)
}

pub(crate) fn tool_failure(tool: &str, reason: impl Into<String>) -> EngineError {
    EngineError::ToolFailed {
        tool: tool.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn required_str<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, EngineError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EngineError::MissingToolArg {
            tool: tool.to_string(),
            arg: key.to_string(),
        })
}

pub(crate) fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn optional_u64(args: &Map<String, Value>, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.display().to_string(),
        source,
    }
}
