use crate::engine::error::EngineError;
use crate::engine::model::SnapshotRef;
use crate::engine::policy::{validate_path, ExecutionPolicy};
use crate::shared::clock::now_secs;
use crate::shared::ids::generate_id;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

const SNAPSHOTS_SUBDIR: &str = "artifacts/snapshots";

/// Issues and resolves point-in-time references to workspace paths. The store
/// owns reference bookkeeping and optional file capture; anything beyond a
/// single-file copy is the caller's restore machinery.
pub struct SnapshotStore {
    policy: ExecutionPolicy,
    snapshots: Vec<SnapshotRef>,
}

impl SnapshotStore {
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            snapshots: Vec::new(),
        }
    }

    /// Validates the target through the path guard and records a reference.
    /// No content is captured; see [`SnapshotStore::capture_file`].
    pub fn create_snapshot(
        &mut self,
        kind: impl Into<String>,
        target_path: &str,
        metadata: Map<String, Value>,
    ) -> Result<SnapshotRef, EngineError> {
        validate_path(Path::new(target_path), &self.policy)?;
        let now = now_secs();
        let snapshot = SnapshotRef {
            id: generate_id("snap", now),
            kind: kind.into(),
            target_path: target_path.to_string(),
            created_at: now,
            metadata,
        };
        self.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Records a reference and copies the target file into
    /// `artifacts/snapshots/` under the trusted root, stamping the copy's
    /// location and a sha256 digest into the reference metadata.
    pub fn capture_file(
        &mut self,
        kind: impl Into<String>,
        target_path: &str,
        mut metadata: Map<String, Value>,
    ) -> Result<SnapshotRef, EngineError> {
        let resolved = validate_path(Path::new(target_path), &self.policy)?;
        if !resolved.is_file() {
            return Err(EngineError::Io {
                path: resolved.display().to_string(),
                source: std::io::Error::other("snapshot target is not a file"),
            });
        }
        let bytes = fs::read(&resolved).map_err(|source| io_error(&resolved, source))?;
        let digest = format!("{:x}", Sha256::digest(&bytes));

        let now = now_secs();
        let id = generate_id("snap", now);
        let snapshots_dir = self.policy.trusted_root().join(SNAPSHOTS_SUBDIR);
        fs::create_dir_all(&snapshots_dir).map_err(|source| io_error(&snapshots_dir, source))?;
        let file_name = resolved
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("file");
        let dest_path = snapshots_dir.join(format!("{id}-{file_name}"));
        fs::copy(&resolved, &dest_path).map_err(|source| io_error(&dest_path, source))?;

        metadata.insert(
            "snapshotPath".to_string(),
            Value::String(dest_path.display().to_string()),
        );
        metadata.insert("digest".to_string(), Value::String(digest));
        let snapshot = SnapshotRef {
            id,
            kind: kind.into(),
            target_path: resolved.display().to_string(),
            created_at: now,
            metadata,
        };
        self.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Pure lookup by id.
    pub fn get(&self, snapshot_id: &str) -> Option<&SnapshotRef> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.id == snapshot_id)
    }

    pub fn snapshots(&self) -> &[SnapshotRef] {
        &self.snapshots
    }

    /// Copies a captured file back over its original target. Both the stored
    /// copy and the restoration target are re-validated through the path
    /// guard before the copy; a stale reference pointing outside the sandbox
    /// must not become an escape hatch at restore time.
    pub fn restore_file(&self, snapshot_id: &str) -> Result<SnapshotRef, EngineError> {
        let snapshot = self
            .get(snapshot_id)
            .ok_or_else(|| EngineError::SnapshotNotFound {
                snapshot_id: snapshot_id.to_string(),
            })?;
        let stored = snapshot
            .metadata
            .get("snapshotPath")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "snapshot `{snapshot_id}` has no captured file to restore"
                ))
            })?;
        let source = validate_path(Path::new(stored), &self.policy)?;
        let target = validate_path(Path::new(&snapshot.target_path), &self.policy)?;
        if !source.is_file() {
            return Err(EngineError::Io {
                path: source.display().to_string(),
                source: std::io::Error::other("captured snapshot file is missing"),
            });
        }
        fs::copy(&source, &target).map_err(|err| io_error(&target, err))?;
        Ok(snapshot.clone())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_snapshot_rejects_escaping_target() {
        let temp = tempdir().expect("tempdir");
        let mut store = SnapshotStore::new(ExecutionPolicy::new(temp.path()).expect("policy"));
        let err = store
            .create_snapshot("file", "/etc/passwd", Map::new())
            .expect_err("escape");
        assert!(err.is_sandbox_violation());
        assert!(store.snapshots().is_empty());
    }

    #[test]
    fn capture_and_restore_round_trip() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("notes.txt");
        fs::write(&target, b"original").expect("write target");
        let mut store = SnapshotStore::new(ExecutionPolicy::new(temp.path()).expect("policy"));

        let snapshot = store
            .capture_file("file", &target.display().to_string(), Map::new())
            .expect("capture");
        assert!(snapshot.metadata.contains_key("digest"));

        fs::write(&target, b"clobbered").expect("overwrite target");
        store.restore_file(&snapshot.id).expect("restore");
        assert_eq!(fs::read(&target).expect("read back"), b"original");
    }

    #[test]
    fn restore_unknown_snapshot_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = SnapshotStore::new(ExecutionPolicy::new(temp.path()).expect("policy"));
        let err = store.restore_file("snap-nope").expect_err("missing");
        assert!(matches!(err, EngineError::SnapshotNotFound { .. }));
    }

    #[test]
    fn restore_refuses_reference_without_captured_file() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("data.csv");
        fs::write(&target, b"a,b\n").expect("write target");
        let mut store = SnapshotStore::new(ExecutionPolicy::new(temp.path()).expect("policy"));
        let snapshot = store
            .create_snapshot("file", &target.display().to_string(), Map::new())
            .expect("create");
        let err = store.restore_file(&snapshot.id).expect_err("no capture");
        assert!(matches!(err, EngineError::Config(_)));
    }
}
