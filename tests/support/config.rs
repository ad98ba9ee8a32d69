use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Writes `contents` to `courier.toml` inside a fresh temp dir.
///
/// The directory is removed when the returned guard is dropped.
pub fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("courier.toml");
    fs::write(&path, contents).expect("write temp config");
    (dir, path)
}
