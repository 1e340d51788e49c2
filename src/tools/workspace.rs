use crate::engine::error::EngineError;
use crate::engine::model::ToolResult;
use crate::engine::policy::{validate_path, ExecutionPolicy};
use crate::engine::router::{ToolArgSchema, ToolArgType, ToolDefinition};
use crate::shared::fs_atomic::atomic_write_file;
use crate::tools::{args_schema, io_error, optional_str, optional_u64, required_str, tool_failure};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_MATCHES: u64 = 50;

pub fn list_dir_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "list_dir".to_string(),
        description: "List files and folders in a workspace directory.".to_string(),
        destructive: false,
        args: args_schema(&[
            (
                "path",
                ToolArgType::String,
                false,
                "directory to list; defaults to the workspace root",
            ),
            (
                "depth",
                ToolArgType::Integer,
                false,
                "recursion depth, default 1",
            ),
        ]),
        handler: Box::new(move |args| {
            let target = match optional_str(args, "path") {
                Some(path) => validate_path(Path::new(path), &policy)?,
                None => policy.trusted_root().to_path_buf(),
            };
            if !target.exists() {
                return Err(tool_failure("list_dir", "path does not exist"));
            }
            let mut entries = Vec::new();
            if target.is_dir() {
                let depth = optional_u64(args, "depth").unwrap_or(1) as usize;
                walk_dir(&target, depth, &mut entries)?;
            }
            let output = Map::from_iter([
                (
                    "path".to_string(),
                    Value::String(target.display().to_string()),
                ),
                ("entries".to_string(), Value::Array(entries)),
            ]);
            Ok(ToolResult::with_output(output))
        }),
    }
}

pub fn read_file_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "read_file".to_string(),
        description: "Read a text file from the workspace with optional line ranges.".to_string(),
        destructive: false,
        args: args_schema(&[
            ("path", ToolArgType::String, true, "file to read"),
            (
                "start_line",
                ToolArgType::Integer,
                false,
                "1-based first line",
            ),
            (
                "end_line",
                ToolArgType::Integer,
                false,
                "1-based last line, inclusive",
            ),
            (
                "max_bytes",
                ToolArgType::Integer,
                false,
                "truncation ceiling; defaults to the policy data ceiling",
            ),
        ]),
        handler: Box::new(move |args| {
            let path = required_str("read_file", args, "path")?;
            let resolved = validate_path(Path::new(path), &policy)?;
            if !resolved.is_file() {
                return Err(tool_failure("read_file", "file not found"));
            }
            let bytes = fs::read(&resolved).map_err(|err| io_error(&resolved, err))?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let line_count = text.lines().count();

            let start_line = optional_u64(args, "start_line");
            let end_line = optional_u64(args, "end_line");
            let content = if start_line.is_some() || end_line.is_some() {
                let start_idx = start_line.unwrap_or(1).saturating_sub(1) as usize;
                let end_idx = end_line.unwrap_or(line_count as u64) as usize;
                text.lines()
                    .skip(start_idx)
                    .take(end_idx.saturating_sub(start_idx))
                    .collect::<Vec<&str>>()
                    .join("\n")
            } else {
                text
            };

            let max_bytes = optional_u64(args, "max_bytes").unwrap_or(policy.max_data_bytes) as usize;
            let truncated = content.len() > max_bytes;
            let content = if truncated {
                String::from_utf8_lossy(&content.as_bytes()[..max_bytes]).into_owned()
            } else {
                content
            };

            let output = Map::from_iter([
                (
                    "path".to_string(),
                    Value::String(resolved.display().to_string()),
                ),
                ("content".to_string(), Value::String(content)),
                ("lines".to_string(), Value::from(line_count)),
                ("truncated".to_string(), Value::Bool(truncated)),
            ]);
            Ok(ToolResult::with_output(output))
        }),
    }
}

pub fn search_text_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "search_text".to_string(),
        description: "Search for a literal pattern in files under a path.".to_string(),
        destructive: false,
        args: args_schema(&[
            ("pattern", ToolArgType::String, true, "literal text to find"),
            (
                "path",
                ToolArgType::String,
                false,
                "file or directory to search; defaults to the workspace root",
            ),
            (
                "max_matches",
                ToolArgType::Integer,
                false,
                "match cap, default 50",
            ),
        ]),
        handler: Box::new(move |args| {
            let pattern = required_str("search_text", args, "pattern")?;
            let target = match optional_str(args, "path") {
                Some(path) => validate_path(Path::new(path), &policy)?,
                None => policy.trusted_root().to_path_buf(),
            };
            if !target.exists() {
                return Err(tool_failure("search_text", "path does not exist"));
            }
            let max_matches = optional_u64(args, "max_matches").unwrap_or(DEFAULT_MAX_MATCHES) as usize;

            let mut candidates = Vec::new();
            if target.is_file() {
                candidates.push(target.clone());
            } else {
                collect_files(&target, &mut candidates)?;
            }

            let mut matches = Vec::new();
            let mut truncated = false;
            'files: for candidate in &candidates {
                let Ok(bytes) = fs::read(candidate) else {
                    continue;
                };
                let text = String::from_utf8_lossy(&bytes);
                for (idx, line) in text.lines().enumerate() {
                    if !line.contains(pattern) {
                        continue;
                    }
                    matches.push(Value::Object(Map::from_iter([
                        (
                            "path".to_string(),
                            Value::String(candidate.display().to_string()),
                        ),
                        ("line".to_string(), Value::from(idx + 1)),
                        ("text".to_string(), Value::String(line.to_string())),
                    ])));
                    if matches.len() >= max_matches {
                        truncated = true;
                        break 'files;
                    }
                }
            }

            let output = Map::from_iter([
                ("matches".to_string(), Value::Array(matches)),
                ("truncated".to_string(), Value::Bool(truncated)),
            ]);
            Ok(ToolResult::with_output(output))
        }),
    }
}

pub fn write_file_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "write_file".to_string(),
        description: "Write a text file to the workspace.".to_string(),
        destructive: true,
        args: write_args(),
        handler: Box::new(move |args| write_handler("write_file", &policy, args, None)),
    }
}

pub fn write_markdown_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "write_markdown".to_string(),
        description: "Write a markdown report in the workspace.".to_string(),
        destructive: true,
        args: write_args(),
        handler: Box::new(move |args| write_handler("write_markdown", &policy, args, Some("md"))),
    }
}

pub fn append_file_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "append_file".to_string(),
        description: "Append text content to a file in the workspace.".to_string(),
        destructive: true,
        args: write_args(),
        handler: Box::new(move |args| {
            let path = required_str("append_file", args, "path")?;
            let content = args
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let resolved = validate_path(Path::new(path), &policy)?;
            if let Some(parent) = resolved.parent() {
                fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
            }
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .map_err(|err| io_error(&resolved, err))?;
            file.write_all(content.as_bytes())
                .map_err(|err| io_error(&resolved, err))?;
            let size = fs::metadata(&resolved)
                .map_err(|err| io_error(&resolved, err))?
                .len();
            Ok(ToolResult::with_output(written_output(&resolved, size)))
        }),
    }
}

pub fn replace_text_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "replace_text".to_string(),
        description: "Replace literal text in a workspace file.".to_string(),
        destructive: true,
        args: args_schema(&[
            ("path", ToolArgType::String, true, "file to edit"),
            ("old", ToolArgType::String, true, "text to replace"),
            ("new", ToolArgType::String, true, "replacement text"),
            (
                "count",
                ToolArgType::Integer,
                false,
                "max replacements; default all",
            ),
        ]),
        handler: Box::new(move |args| {
            let path = required_str("replace_text", args, "path")?;
            let old = required_str("replace_text", args, "old")?;
            let new = args.get("new").and_then(Value::as_str).unwrap_or_default();
            let resolved = validate_path(Path::new(path), &policy)?;
            if !resolved.is_file() {
                return Err(tool_failure("replace_text", "file not found"));
            }
            let bytes = fs::read(&resolved).map_err(|err| io_error(&resolved, err))?;
            let content = String::from_utf8_lossy(&bytes).into_owned();
            let updated = match optional_u64(args, "count") {
                Some(count) => content.replacen(old, new, count as usize),
                None => content.replace(old, new),
            };
            if updated == content {
                return Err(tool_failure(
                    "replace_text",
                    "no matches found for replacement",
                ));
            }
            atomic_write_file(&resolved, updated.as_bytes())
                .map_err(|err| io_error(&resolved, err))?;
            let size = updated.len() as u64;
            Ok(ToolResult::with_output(written_output(&resolved, size)))
        }),
    }
}

fn write_args() -> Option<BTreeMap<String, ToolArgSchema>> {
    args_schema(&[
        ("path", ToolArgType::String, true, "destination file"),
        ("content", ToolArgType::String, true, "text content"),
    ])
}

fn write_handler(
    tool: &str,
    policy: &ExecutionPolicy,
    args: &Map<String, Value>,
    required_extension: Option<&str>,
) -> Result<ToolResult, EngineError> {
    let path = required_str(tool, args, "path")?;
    let content = args
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let resolved = validate_path(Path::new(path), policy)?;
    if let Some(extension) = required_extension {
        let matches = resolved
            .extension()
            .and_then(|v| v.to_str())
            .map(|v| v.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !matches {
            return Err(tool_failure(
                tool,
                format!("file must end with .{extension}"),
            ));
        }
    }
    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
    }
    atomic_write_file(&resolved, content.as_bytes()).map_err(|err| io_error(&resolved, err))?;
    Ok(ToolResult::with_output(written_output(
        &resolved,
        content.len() as u64,
    )))
}

fn written_output(path: &Path, bytes: u64) -> Map<String, Value> {
    Map::from_iter([
        ("path".to_string(), Value::String(path.display().to_string())),
        ("bytes".to_string(), Value::from(bytes)),
    ])
}

fn walk_dir(dir: &Path, remaining: usize, entries: &mut Vec<Value>) -> Result<(), EngineError> {
    if remaining == 0 {
        return Ok(());
    }
    let reader = fs::read_dir(dir).map_err(|err| io_error(dir, err))?;
    let mut paths = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|err| io_error(dir, err))?;
        paths.push(entry.path());
    }
    paths.sort();
    for path in paths {
        let is_dir = path.is_dir();
        entries.push(Value::Object(Map::from_iter([
            ("path".to_string(), Value::String(path.display().to_string())),
            (
                "type".to_string(),
                Value::String(if is_dir { "dir" } else { "file" }.to_string()),
            ),
        ])));
        if is_dir {
            walk_dir(&path, remaining - 1, entries)?;
        }
    }
    Ok(())
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), EngineError> {
    let reader = fs::read_dir(dir).map_err(|err| io_error(dir, err))?;
    let mut paths = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|err| io_error(dir, err))?;
        paths.push(entry.path());
    }
    paths.sort();
    for path in paths {
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}
