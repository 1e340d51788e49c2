use crate::engine::error::EngineError;
use crate::engine::model::ToolResult;
use crate::engine::policy::{validate_path, ExecutionPolicy};
use crate::engine::router::{ToolArgType, ToolDefinition};
use crate::tools::{args_schema, optional_str, optional_u64, required_str, tool_failure};
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SQLITE_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3"];
const MAX_SQLITE_FILES: usize = 50;
const DEFAULT_QUERY_LIMIT: u64 = 200;

pub fn list_sqlite_files_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "list_sqlite_files".to_string(),
        description: "List SQLite database files in the workspace.".to_string(),
        destructive: false,
        args: args_schema(&[(
            "path",
            ToolArgType::String,
            false,
            "directory to scan; defaults to the workspace root",
        )]),
        handler: Box::new(move |args| {
            let root = match optional_str(args, "path") {
                Some(path) => validate_path(Path::new(path), &policy)?,
                None => policy.trusted_root().to_path_buf(),
            };
            let mut found = Vec::new();
            if root.is_dir() {
                scan_sqlite_files(&root, &mut found)?;
            }
            let files = found
                .iter()
                .map(|path| Value::String(path.display().to_string()))
                .collect();
            let output = Map::from_iter([("sqlite_files".to_string(), Value::Array(files))]);
            Ok(ToolResult::with_output(output))
        }),
    }
}

pub fn list_db_tables_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "list_db_tables".to_string(),
        description: "List tables and columns from a SQLite database.".to_string(),
        destructive: false,
        args: args_schema(&[(
            "db_path",
            ToolArgType::String,
            true,
            "sqlite file to inspect",
        )]),
        handler: Box::new(move |args| {
            let db_path = required_str("list_db_tables", args, "db_path")?;
            let resolved = validate_path(Path::new(db_path), &policy)?;
            if !resolved.is_file() {
                return Err(tool_failure("list_db_tables", "database file not found"));
            }
            let conn = open_read_only(&resolved)?;

            let mut names = Vec::new();
            {
                let mut statement = conn
                    .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                    .map_err(|err| sqlite_error(&resolved, err))?;
                let mut rows = statement
                    .query([])
                    .map_err(|err| sqlite_error(&resolved, err))?;
                while let Some(row) = rows.next().map_err(|err| sqlite_error(&resolved, err))? {
                    let name: String = row.get(0).map_err(|err| sqlite_error(&resolved, err))?;
                    names.push(name);
                }
            }

            let mut tables = Vec::new();
            for name in names {
                let mut columns = Vec::new();
                let mut statement = conn
                    .prepare(&format!("PRAGMA table_info({name})"))
                    .map_err(|err| sqlite_error(&resolved, err))?;
                let mut rows = statement
                    .query([])
                    .map_err(|err| sqlite_error(&resolved, err))?;
                while let Some(row) = rows.next().map_err(|err| sqlite_error(&resolved, err))? {
                    let column_name: String =
                        row.get(1).map_err(|err| sqlite_error(&resolved, err))?;
                    let column_type: String =
                        row.get(2).map_err(|err| sqlite_error(&resolved, err))?;
                    let not_null: i64 = row.get(3).map_err(|err| sqlite_error(&resolved, err))?;
                    columns.push(Value::Object(Map::from_iter([
                        ("name".to_string(), Value::String(column_name)),
                        ("type".to_string(), Value::String(column_type)),
                        ("nullable".to_string(), Value::Bool(not_null == 0)),
                    ])));
                }
                tables.push(Value::Object(Map::from_iter([
                    ("name".to_string(), Value::String(name)),
                    ("columns".to_string(), Value::Array(columns)),
                ])));
            }

            let output = Map::from_iter([
                (
                    "db_path".to_string(),
                    Value::String(resolved.display().to_string()),
                ),
                ("tables".to_string(), Value::Array(tables)),
            ]);
            Ok(ToolResult::with_output(output))
        }),
    }
}

pub fn query_db_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "query_db".to_string(),
        description: "Run a read-only SQL query against a SQLite database.".to_string(),
        destructive: false,
        args: args_schema(&[
            ("sql", ToolArgType::String, true, "single SELECT statement"),
            ("db_path", ToolArgType::String, true, "sqlite file to query"),
            (
                "limit",
                ToolArgType::Integer,
                false,
                "row cap, default 200",
            ),
        ]),
        handler: Box::new(move |args| {
            let sql = required_str("query_db", args, "sql")?;
            let cleaned = sql.trim().trim_end_matches([';', ' ']);
            if cleaned.contains(';') {
                return Err(tool_failure(
                    "query_db",
                    "only single SQL statements are allowed",
                ));
            }
            if !is_readonly_sql(cleaned) {
                return Err(tool_failure(
                    "query_db",
                    "only read-only SELECT queries are allowed",
                ));
            }
            let db_path = required_str("query_db", args, "db_path")?;
            let resolved = validate_path(Path::new(db_path), &policy)?;
            if !resolved.is_file() {
                return Err(tool_failure("query_db", "database file not found"));
            }
            let limit = match optional_u64(args, "limit") {
                Some(0) | None => DEFAULT_QUERY_LIMIT,
                Some(value) => value,
            } as usize;

            let conn = open_read_only(&resolved)?;
            let mut statement = conn
                .prepare(cleaned)
                .map_err(|err| sqlite_error(&resolved, err))?;
            let columns: Vec<String> = statement
                .column_names()
                .iter()
                .map(|name| name.to_string())
                .collect();
            let column_count = columns.len();

            let mut rows = statement
                .query([])
                .map_err(|err| sqlite_error(&resolved, err))?;
            let mut payload = Vec::new();
            while payload.len() < limit {
                let Some(row) = rows.next().map_err(|err| sqlite_error(&resolved, err))? else {
                    break;
                };
                let mut object = Map::new();
                for idx in 0..column_count {
                    let value: rusqlite::types::Value =
                        row.get(idx).map_err(|err| sqlite_error(&resolved, err))?;
                    object.insert(columns[idx].clone(), sqlite_value_to_json(value));
                }
                payload.push(Value::Object(object));
            }

            let output = Map::from_iter([
                (
                    "db_path".to_string(),
                    Value::String(resolved.display().to_string()),
                ),
                (
                    "columns".to_string(),
                    Value::Array(columns.into_iter().map(Value::String).collect()),
                ),
                ("rows".to_string(), Value::Array(payload)),
            ]);
            Ok(ToolResult::with_output(output))
        }),
    }
}

fn open_read_only(path: &Path) -> Result<Connection, EngineError> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|err| sqlite_error(path, err))
}

fn is_readonly_sql(sql: &str) -> bool {
    let lowered = sql.trim().to_lowercase();
    if lowered.is_empty() {
        return false;
    }
    if !lowered.starts_with("select") && !lowered.starts_with("with") {
        return false;
    }
    let blocked = [
        "insert", "update", "delete", "drop", "alter", "create", "pragma",
    ];
    !blocked.iter().any(|token| lowered.contains(token))
}

fn sqlite_value_to_json(value: rusqlite::types::Value) -> Value {
    match value {
        rusqlite::types::Value::Null => Value::Null,
        rusqlite::types::Value::Integer(v) => Value::from(v),
        rusqlite::types::Value::Real(v) => Value::from(v),
        rusqlite::types::Value::Text(v) => Value::String(v),
        rusqlite::types::Value::Blob(v) => Value::String(hex_encode(&v)),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn scan_sqlite_files(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), EngineError> {
    if found.len() >= MAX_SQLITE_FILES {
        return Ok(());
    }
    let reader = fs::read_dir(dir).map_err(|err| crate::tools::io_error(dir, err))?;
    let mut paths = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|err| crate::tools::io_error(dir, err))?;
        paths.push(entry.path());
    }
    paths.sort();
    for path in paths {
        if found.len() >= MAX_SQLITE_FILES {
            break;
        }
        if path.is_dir() {
            scan_sqlite_files(&path, found)?;
        } else if path
            .extension()
            .and_then(|v| v.to_str())
            .map(|v| SQLITE_EXTENSIONS.contains(&v))
            .unwrap_or(false)
        {
            found.push(path);
        }
    }
    Ok(())
}

fn sqlite_error(path: &Path, source: rusqlite::Error) -> EngineError {
    EngineError::Sqlite {
        path: path.display().to_string(),
        source,
    }
}
