use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn engine_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/engine.log")
}

pub fn security_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/security.log")
}

pub fn append_engine_log_line(state_root: &Path, line: &str) -> std::io::Result<()> {
    append_line(&engine_log_path(state_root), line)
}

/// Best effort: a failed log write must never mask the violation being logged.
pub fn append_security_log(state_root: &Path, line: &str) {
    let _ = append_line(&security_log_path(state_root), line);
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn engine_log_lines_append_in_order() {
        let temp = tempdir().expect("tempdir");
        append_engine_log_line(temp.path(), "ts=1 first").expect("append");
        append_engine_log_line(temp.path(), "ts=2 second").expect("append");
        let raw = fs::read_to_string(engine_log_path(temp.path())).expect("read log");
        assert_eq!(raw, "ts=1 first\nts=2 second\n");
    }

    #[test]
    fn security_log_write_is_silent_on_failure() {
        // state root is a file, so creating logs/ under it fails
        let temp = tempdir().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"x").expect("write blocker");
        append_security_log(&blocker, "denied");
    }
}
