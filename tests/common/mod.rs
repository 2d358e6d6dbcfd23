#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A scratch directory holding suite files.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, content).expect("write file");
        path
    }
}

pub const CHAIN_SUITE: &str = r#"
name: chain
label: Chained commands
tests:
  - name: first
    run: echo one
    expect:
      stdout_equals: "one\n"
  - name: second
    run: exit 4
    depends: [first]
  - name: third
    run: echo never
    skip_if_failed: [second]
"#;

pub const PASSING_SUITE: &str = r#"
name: green
tests:
  - name: only
    run: "true"
"#;
