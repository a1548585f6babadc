//! [`TestRegistry`] fixture for resolver scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory and a separate temporary global root.
///
/// # Example
///
/// ```rust,no_run
/// use forge_test_utils::TestRegistry;
///
/// let registry = TestRegistry::new();
/// registry.write_local("tools", "web-search", "yaml", "type: tool\nname: web-search\n");
/// registry.write_global("tools", "web-search", "1.2.0", "yaml", "type: tool\n");
/// ```
pub struct TestRegistry {
    project: TempDir,
    global: TempDir,
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRegistry {
    pub fn new() -> Self {
        Self {
            project: TempDir::new().unwrap(),
            global: TempDir::new().unwrap(),
        }
    }

    /// Project root; local definitions live under `.fractary/` inside it.
    pub fn project_root(&self) -> &Path {
        self.project.path()
    }

    /// Global root holding `registry/` and `cache/`.
    pub fn global_root(&self) -> &Path {
        self.global.path()
    }

    /// Write `{project}/.fractary/{dir}/{name}.{ext}`.
    ///
    /// # Panics
    /// Panics if the filesystem operations fail.
    pub fn write_local(&self, dir: &str, name: &str, ext: &str, content: &str) -> PathBuf {
        let path = self
            .project_root()
            .join(".fractary")
            .join(dir)
            .join(format!("{name}.{ext}"));
        write(&path, content);
        path
    }

    /// Write `{global}/registry/{dir}/{name}@{version}/{file}.{ext}`, where
    /// `file` is the singular of `dir` (`agent` or `tool`).
    ///
    /// # Panics
    /// Panics if the filesystem operations fail.
    pub fn write_global(&self, dir: &str, name: &str, version: &str, ext: &str, content: &str) -> PathBuf {
        let file = dir.strip_suffix('s').unwrap_or(dir);
        let path = self
            .global_root()
            .join("registry")
            .join(dir)
            .join(format!("{name}@{version}"))
            .join(format!("{file}.{ext}"));
        write(&path, content);
        path
    }

    /// Write `{project}/.fractary/config.yaml`.
    pub fn write_project_config(&self, content: &str) -> PathBuf {
        let path = self.project_root().join(".fractary").join("config.yaml");
        write(&path, content);
        path
    }

    /// Read a file relative to the project root.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read_project(&self, relative: &str) -> String {
        let path = self.project_root().join(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("could not read {}: {e}", path.display()))
    }

    /// Assert that `relative` exists under the project root.
    pub fn assert_project_file_exists(&self, relative: &str) {
        let path = self.project_root().join(relative);
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("could not create {}: {e}", parent.display()));
    }
    fs::write(path, content).unwrap_or_else(|e| panic!("could not write {}: {e}", path.display()));
}
