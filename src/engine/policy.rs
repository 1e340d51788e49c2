use crate::engine::error::EngineError;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_MAX_DATA_BYTES: u64 = 50_000_000;
pub const DEFAULT_MAX_SHELL_SECONDS: u64 = 30;

/// Immutable sandbox description for one plan execution. The trusted root and
/// allow-list are only settable through constructors that enforce containment,
/// so a policy can narrow access but never widen it past the trusted root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicy {
    trusted_root: PathBuf,
    allowed_paths: Vec<PathBuf>,
    pub max_data_bytes: u64,
    pub allow_network: bool,
    pub allow_shell: bool,
    pub allowed_shell_commands: Vec<String>,
    pub max_shell_seconds: u64,
    pub require_approval_for_destructive: bool,
}

impl ExecutionPolicy {
    pub fn new(trusted_root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let raw = trusted_root.into();
        if !raw.is_absolute() {
            return Err(EngineError::Config(format!(
                "trusted root must be absolute, got `{}`",
                raw.display()
            )));
        }
        let trusted_root = canonicalize_absolute_path_if_exists(&raw)?;
        Ok(Self {
            trusted_root,
            allowed_paths: Vec::new(),
            max_data_bytes: DEFAULT_MAX_DATA_BYTES,
            allow_network: false,
            allow_shell: false,
            allowed_shell_commands: Vec::new(),
            max_shell_seconds: DEFAULT_MAX_SHELL_SECONDS,
            require_approval_for_destructive: true,
        })
    }

    /// Narrows the sandbox to the given roots. Entries are resolved relative
    /// to the trusted root and must stay inside it.
    pub fn with_allowed_paths(mut self, paths: &[PathBuf]) -> Result<Self, EngineError> {
        let mut resolved_paths = Vec::with_capacity(paths.len());
        for path in paths {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                self.trusted_root.join(path)
            };
            let resolved = canonicalize_absolute_path_if_exists(&absolute)?;
            if !resolved.starts_with(&self.trusted_root) {
                return Err(EngineError::Config(format!(
                    "allowed path `{}` escapes trusted root `{}`",
                    resolved.display(),
                    self.trusted_root.display()
                )));
            }
            resolved_paths.push(resolved);
        }
        self.allowed_paths = resolved_paths;
        Ok(self)
    }

    pub fn trusted_root(&self) -> &Path {
        &self.trusted_root
    }

    pub fn allowed_paths(&self) -> &[PathBuf] {
        &self.allowed_paths
    }
}

/// The single choke point for every filesystem argument a tool receives.
/// Resolves `.`/`..`/symlinks, then checks containment in the trusted root
/// and, when the allow-list is non-empty, in at least one of its entries.
pub fn validate_path(path: &Path, policy: &ExecutionPolicy) -> Result<PathBuf, EngineError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        policy.trusted_root().join(path)
    };
    let resolved = canonicalize_absolute_path_if_exists(&absolute)?;
    if !resolved.starts_with(policy.trusted_root()) {
        return Err(EngineError::SandboxViolation {
            path: resolved.display().to_string(),
            reason: format!(
                "path escapes trusted root `{}`",
                policy.trusted_root().display()
            ),
        });
    }
    if !policy.allowed_paths().is_empty()
        && !policy
            .allowed_paths()
            .iter()
            .any(|allowed| resolved.starts_with(allowed))
    {
        return Err(EngineError::SandboxViolation {
            path: resolved.display().to_string(),
            reason: "path not in allow-list".to_string(),
        });
    }
    Ok(resolved)
}

fn canonicalize_absolute_path_if_exists(path: &Path) -> Result<PathBuf, EngineError> {
    match fs::canonicalize(path) {
        Ok(canonical) => normalize_absolute_path(&canonical),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            canonicalize_deepest_ancestor(path)
        }
        Err(source) => Err(EngineError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// A missing leaf must not skip symlink resolution: the deepest existing
/// ancestor is canonicalized for real, and only the non-existing suffix is
/// handled lexically.
fn canonicalize_deepest_ancestor(path: &Path) -> Result<PathBuf, EngineError> {
    let normalized = normalize_absolute_path(path)?;
    let mut existing = normalized.as_path();
    let mut suffix: Vec<std::ffi::OsString> = Vec::new();
    loop {
        match fs::canonicalize(existing) {
            Ok(canonical) => {
                let mut resolved = canonical;
                for component in suffix.iter().rev() {
                    resolved.push(component);
                }
                return normalize_absolute_path(&resolved);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        suffix.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return Ok(normalized),
                }
            }
            Err(source) => {
                return Err(EngineError::Io {
                    path: existing.display().to_string(),
                    source,
                })
            }
        }
    }
}

fn normalize_absolute_path(path: &Path) -> Result<PathBuf, EngineError> {
    if !path.is_absolute() {
        return Err(EngineError::SandboxViolation {
            path: path.display().to_string(),
            reason: "path must be absolute".to_string(),
        });
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::Normal(v) => normalized.push(v),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(EngineError::SandboxViolation {
                        path: path.display().to_string(),
                        reason: "path escapes filesystem root".to_string(),
                    });
                }
            }
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
        }
    }
    Ok(normalized)
}
