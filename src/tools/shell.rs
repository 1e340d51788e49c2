use crate::engine::error::EngineError;
use crate::engine::model::ToolResult;
use crate::engine::policy::{validate_path, ExecutionPolicy};
use crate::engine::router::{ToolArgType, ToolDefinition};
use crate::tools::{args_schema, optional_str, optional_u64, required_str, tool_failure};
use serde_json::{Map, Value};
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub fn run_shell_tool(policy: &ExecutionPolicy) -> ToolDefinition {
    let policy = policy.clone();
    ToolDefinition {
        name: "run_shell".to_string(),
        description: "Run a shell command inside the workspace.".to_string(),
        destructive: true,
        args: args_schema(&[
            ("command", ToolArgType::String, true, "command line to run"),
            (
                "cwd",
                ToolArgType::String,
                false,
                "working directory; defaults to the workspace root",
            ),
            (
                "timeout",
                ToolArgType::Integer,
                false,
                "seconds before the process is killed; capped by policy",
            ),
        ]),
        handler: Box::new(move |args| run_shell(&policy, args)),
    }
}

/// An allow-list entry must cover whole tokens: `ls` admits `ls -la` but not
/// `lsblk`.
fn command_matches_prefix(command_line: &str, prefix: &str) -> bool {
    match command_line.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

fn run_shell(policy: &ExecutionPolicy, args: &Map<String, Value>) -> Result<ToolResult, EngineError> {
    if !policy.allow_shell {
        return Err(EngineError::ShellDisabled);
    }
    let command_line = required_str("run_shell", args, "command")?;
    if !policy.allowed_shell_commands.is_empty()
        && !policy
            .allowed_shell_commands
            .iter()
            .any(|prefix| command_matches_prefix(command_line, prefix))
    {
        return Err(EngineError::ShellCommandNotAllowed {
            command: command_line.to_string(),
        });
    }
    let cwd = match optional_str(args, "cwd") {
        Some(path) => validate_path(Path::new(path), policy)?,
        None => policy.trusted_root().to_path_buf(),
    };
    let timeout_seconds = optional_u64(args, "timeout")
        .unwrap_or(policy.max_shell_seconds)
        .min(policy.max_shell_seconds);
    let timeout = Duration::from_secs(timeout_seconds);

    let mut argv = command_line.split_whitespace();
    let Some(program) = argv.next() else {
        return Err(tool_failure("run_shell", "command is empty"));
    };
    let argv: Vec<&str> = argv.collect();

    let mut child = Command::new(program)
        .args(&argv)
        .current_dir(&cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| tool_failure("run_shell", format!("failed to spawn `{program}`: {err}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| tool_failure("run_shell", "missing stdout pipe"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| tool_failure("run_shell", "missing stderr pipe"))?;

    let stdout_reader = thread::spawn(move || {
        let mut buf = String::new();
        let mut reader = BufReader::new(stdout);
        let _ = reader.read_to_string(&mut buf);
        buf
    });
    let stderr_reader = thread::spawn(move || {
        let mut buf = String::new();
        let mut reader = BufReader::new(stderr);
        let _ = reader.read_to_string(&mut buf);
        buf
    });

    let start = Instant::now();
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Err(EngineError::ShellTimeout { timeout_seconds });
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(err) => {
                return Err(tool_failure(
                    "run_shell",
                    format!("failed waiting for `{program}`: {err}"),
                ))
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    if !exit_status.success() {
        return Err(tool_failure(
            "run_shell",
            format!(
                "command failed ({}): {}",
                exit_status.code().unwrap_or(-1),
                stderr.trim()
            ),
        ));
    }

    let output = Map::from_iter([
        (
            "command".to_string(),
            Value::String(command_line.to_string()),
        ),
        (
            "exit_code".to_string(),
            Value::from(exit_status.code().unwrap_or(0)),
        ),
        ("stdout".to_string(), Value::String(stdout)),
        ("stderr".to_string(), Value::String(stderr)),
    ]);
    Ok(ToolResult::with_output(output))
}
