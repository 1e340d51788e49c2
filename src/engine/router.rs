use crate::engine::error::EngineError;
use crate::engine::model::ToolResult;
use crate::engine::policy::{validate_path, ExecutionPolicy};
use crate::shared::logging::append_security_log;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type ToolHandler = Box<dyn Fn(&Map<String, Value>) -> Result<ToolResult, EngineError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolArgType {
    String,
    Boolean,
    Integer,
    Object,
}

impl ToolArgType {
    pub(crate) fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for ToolArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Object => write!(f, "object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolArgSchema {
    #[serde(rename = "type")]
    pub arg_type: ToolArgType,
    pub required: bool,
    pub description: String,
}

/// Catalog entry exposed to an external planner; the handler stays private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub args: BTreeMap<String, ToolArgSchema>,
    pub destructive: bool,
}

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub destructive: bool,
    /// When present, `call` validates and normalizes arguments against it
    /// before dispatch; when absent, arguments pass through untouched.
    pub args: Option<BTreeMap<String, ToolArgSchema>>,
    pub handler: ToolHandler,
}

impl ToolDefinition {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            args: self.args.clone().unwrap_or_default(),
            destructive: self.destructive,
        }
    }
}

/// Name-keyed tool catalog. Every dispatch passes the approval gate and the
/// path guard before a handler runs.
pub struct ToolRouter {
    policy: ExecutionPolicy,
    tools: BTreeMap<String, ToolDefinition>,
    log_root: Option<PathBuf>,
}

impl ToolRouter {
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            tools: BTreeMap::new(),
            log_root: None,
        }
    }

    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.log_root = Some(log_root.into());
        self
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Registration is last-write-wins: a tool registered under an existing
    /// name silently replaces the earlier definition.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list_tools(&self) -> Vec<ToolSchema> {
        self.tools.values().map(ToolDefinition::schema).collect()
    }

    pub fn call(
        &self,
        name: &str,
        args: &Map<String, Value>,
        approved: bool,
    ) -> Result<ToolResult, EngineError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| EngineError::UnknownTool {
                tool: name.to_string(),
            })?;
        if tool.destructive && self.policy.require_approval_for_destructive && !approved {
            return Err(EngineError::ApprovalRequired {
                tool: name.to_string(),
            });
        }
        let args = match &tool.args {
            Some(schema) => normalize_args(name, schema, args)?,
            None => args.clone(),
        };
        for (key, value) in &args {
            if key != "path" && !key.ends_with("_path") {
                continue;
            }
            let Some(raw) = value.as_str() else { continue };
            // relative paths are the handler's business to resolve
            if !Path::new(raw).is_absolute() {
                continue;
            }
            if let Err(err) = validate_path(Path::new(raw), &self.policy) {
                if let Some(root) = &self.log_root {
                    append_security_log(
                        root,
                        &format!("path guard rejected `{raw}` for tool `{name}`: {err}"),
                    );
                }
                return Err(err);
            }
        }
        (tool.handler)(&args)
    }
}

fn normalize_args(
    tool: &str,
    schema: &BTreeMap<String, ToolArgSchema>,
    args: &Map<String, Value>,
) -> Result<Map<String, Value>, EngineError> {
    let mut normalized = Map::new();
    for (key, value) in args {
        if value.is_null() {
            continue;
        }
        let Some(arg_schema) = schema.get(key) else {
            return Err(EngineError::UnknownToolArg {
                tool: tool.to_string(),
                arg: key.clone(),
            });
        };
        if !arg_schema.arg_type.matches(value) {
            return Err(EngineError::InvalidToolArgType {
                tool: tool.to_string(),
                arg: key.clone(),
                expected: arg_schema.arg_type.to_string(),
            });
        }
        normalized.insert(key.clone(), value.clone());
    }
    for (key, arg_schema) in schema {
        if arg_schema.required && !normalized.contains_key(key) {
            return Err(EngineError::MissingToolArg {
                tool: tool.to_string(),
                arg: key.clone(),
            });
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn echo_tool(name: &str, destructive: bool) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: "echo the arguments back".to_string(),
            destructive,
            args: None,
            handler: Box::new(|args| Ok(ToolResult::with_output(args.clone()))),
        }
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let router = ToolRouter::new(ExecutionPolicy::new(temp.path()).expect("policy"));
        let err = router
            .call("nope", &Map::new(), false)
            .expect_err("unknown tool");
        assert!(matches!(err, EngineError::UnknownTool { .. }));
    }

    #[test]
    fn register_is_last_write_wins() {
        let temp = tempdir().expect("tempdir");
        let mut router = ToolRouter::new(ExecutionPolicy::new(temp.path()).expect("policy"));
        router.register(echo_tool("probe", true));
        router.register(echo_tool("probe", false));
        assert_eq!(router.list_tools().len(), 1);
        // the replacement is non-destructive, so no approval is needed
        router.call("probe", &Map::new(), false).expect("call");
    }

    #[test]
    fn null_args_are_dropped_during_normalization() {
        let temp = tempdir().expect("tempdir");
        let mut router = ToolRouter::new(ExecutionPolicy::new(temp.path()).expect("policy"));
        let mut schema = BTreeMap::new();
        schema.insert(
            "note".to_string(),
            ToolArgSchema {
                arg_type: ToolArgType::String,
                required: false,
                description: "optional note".to_string(),
            },
        );
        let mut tool = echo_tool("probe", false);
        tool.args = Some(schema);
        router.register(tool);

        let mut args = Map::new();
        args.insert("note".to_string(), Value::Null);
        let result = router.call("probe", &args, false).expect("call");
        assert!(result.output.is_empty());
    }
}
