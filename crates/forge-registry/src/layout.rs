//! On-disk storage layout.
//!
//! ```text
//! {project}/.fractary/
//!     agents/{name}.md | {name}.yaml        one file per name, no versions
//!     tools/{name}.md  | {name}.yaml
//!     config.yaml
//!     forge-lock.json
//!
//! {global}/                                 default: ~/.fractary
//!     registry/agents/{name}@{version}/agent.md | agent.yaml
//!     registry/tools/{name}@{version}/tool.md  | tool.yaml
//!     registry/manifests/{agents|tools}/{name}.json
//!     cache/manifests/{registry}.json
//!     config.yaml
//! ```

use std::path::{Path, PathBuf};

use crate::definition::DefinitionKind;

/// Name of the per-project and per-user configuration directory.
pub const FORGE_DIR: &str = ".fractary";
pub const CONFIG_FILE: &str = "config.yaml";
pub const LOCKFILE_NAME: &str = "forge-lock.json";

/// Definition file extensions, in order of preference.
pub const DEFINITION_EXTENSIONS: [&str; 2] = ["md", "yaml"];

/// Resolved directory roots for the local and global tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    project_root: PathBuf,
    global_root: PathBuf,
}

impl StorageLayout {
    /// Build a layout from explicit roots.
    ///
    /// `global_root` is the directory that contains `registry/` and `cache/`
    /// (normally `~/.fractary`).
    pub fn new(project_root: impl Into<PathBuf>, global_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            global_root: global_root.into(),
        }
    }

    /// Build a layout with the global root in the user's home directory.
    ///
    /// Falls back to a `.fractary` directory under the project when no home
    /// directory can be determined.
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let global_root = default_global_root().unwrap_or_else(|| project_root.join(FORGE_DIR));
        Self::new(project_root, global_root)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn global_root(&self) -> &Path {
        &self.global_root
    }

    /// `{project}/.fractary`
    pub fn project_dir(&self) -> PathBuf {
        self.project_root.join(FORGE_DIR)
    }

    /// `{project}/.fractary/{agents|tools}`
    pub fn local_dir(&self, kind: DefinitionKind) -> PathBuf {
        self.project_dir().join(kind.plural())
    }

    /// Candidate local files for `name`, preferred format first.
    pub fn local_candidates(&self, kind: DefinitionKind, name: &str) -> Vec<PathBuf> {
        let dir = self.local_dir(kind);
        DEFINITION_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{name}.{ext}")))
            .collect()
    }

    /// Path a newly written local definition (e.g. a fork) is stored at.
    pub fn local_yaml_path(&self, kind: DefinitionKind, name: &str) -> PathBuf {
        self.local_dir(kind).join(format!("{name}.yaml"))
    }

    /// `{global}/registry`
    pub fn registry_dir(&self) -> PathBuf {
        self.global_root.join("registry")
    }

    /// `{global}/registry/{agents|tools}`
    pub fn global_dir(&self, kind: DefinitionKind) -> PathBuf {
        self.registry_dir().join(kind.plural())
    }

    /// `{global}/registry/{agents|tools}/{name}@{version}`
    pub fn global_version_dir(&self, kind: DefinitionKind, name: &str, version: &str) -> PathBuf {
        self.global_dir(kind).join(format!("{name}@{version}"))
    }

    /// Candidate files inside a global version directory, preferred format first.
    pub fn global_candidates(&self, kind: DefinitionKind, name: &str, version: &str) -> Vec<PathBuf> {
        let dir = self.global_version_dir(kind, name, version);
        DEFINITION_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{ext}", kind.as_str())))
            .collect()
    }

    /// `{global}/registry/manifests/{agents|tools}/{name}.json`
    pub fn manifest_path(&self, kind: DefinitionKind, name: &str) -> PathBuf {
        self.registry_dir()
            .join("manifests")
            .join(kind.plural())
            .join(format!("{name}.json"))
    }

    /// `{global}/cache/manifests`
    pub fn manifest_cache_dir(&self) -> PathBuf {
        self.global_root.join("cache").join("manifests")
    }

    /// `{project}/.fractary/forge-lock.json`
    pub fn lockfile_path(&self) -> PathBuf {
        self.project_dir().join(LOCKFILE_NAME)
    }

    pub fn global_config_path(&self) -> PathBuf {
        self.global_root.join(CONFIG_FILE)
    }

    pub fn project_config_path(&self) -> PathBuf {
        self.project_dir().join(CONFIG_FILE)
    }
}

/// `~/.fractary`, when a home directory is known.
pub fn default_global_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(FORGE_DIR))
}

/// Split a global version directory name (`name@1.2.0`) into its parts.
///
/// Scoped names keep their leading `@`.
pub fn split_version_dir(dir_name: &str) -> Option<(&str, &str)> {
    let idx = dir_name.rfind('@').filter(|idx| *idx > 0)?;
    let (name, version) = (&dir_name[..idx], &dir_name[idx + 1..]);
    if version.is_empty() {
        None
    } else {
        Some((name, version))
    }
}
