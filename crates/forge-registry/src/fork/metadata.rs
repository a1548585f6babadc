//! Reverse fork index kept next to the global registry.
//!
//! `{global}/registry/manifests/{agents|tools}/{name}.json`:
//!
//! ```json
//! {"name": "base", "type": "agent", "forks": [{"name": "my-base", "forked_at": "...", "path": "..."}]}
//! ```

use chrono::{DateTime, Utc};
use forge_fs::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::definition::{DefinitionKind, FieldMap};
use crate::error::Result;
use crate::layout::StorageLayout;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkEntry {
    pub name: String,
    pub forked_at: DateTime<Utc>,
    /// Where the fork was written.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    #[serde(default)]
    pub forks: Vec<ForkEntry>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone)]
pub struct ManifestStore {
    layout: StorageLayout,
    store: DocumentStore,
}

impl ManifestStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            store: DocumentStore::new(),
        }
    }

    pub fn load(&self, kind: DefinitionKind, name: &str) -> Result<Option<SourceManifest>> {
        Ok(self.store.load_optional(&self.layout.manifest_path(kind, name))?)
    }

    /// Add `entry` to the forks of `source`, replacing an entry of the same name.
    pub fn record_fork(&self, kind: DefinitionKind, source: &str, entry: ForkEntry) -> Result<()> {
        let mut manifest = self.load(kind, source)?.unwrap_or_else(|| SourceManifest {
            name: source.to_string(),
            kind,
            forks: Vec::new(),
            extra: FieldMap::new(),
        });

        manifest.forks.retain(|existing| existing.name != entry.name);
        manifest.forks.push(entry);

        self.store
            .save(&self.layout.manifest_path(kind, source), &manifest)?;
        Ok(())
    }

    pub fn forks_of(&self, kind: DefinitionKind, source: &str) -> Result<Vec<ForkEntry>> {
        Ok(self
            .load(kind, source)?
            .map(|manifest| manifest.forks)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_replaces_and_preserves_unknown_fields() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path().join("p"), temp.path().join("g"));
        let path = layout.manifest_path(DefinitionKind::Agent, "base");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"name":"base","type":"agent","owner":"core"}"#).unwrap();

        let store = ManifestStore::new(layout);
        let entry = |p: &str| ForkEntry {
            name: "mine".into(),
            forked_at: Utc::now(),
            path: p.into(),
        };
        store.record_fork(DefinitionKind::Agent, "base", entry("a.yaml")).unwrap();
        store.record_fork(DefinitionKind::Agent, "base", entry("b.yaml")).unwrap();

        let manifest = store.load(DefinitionKind::Agent, "base").unwrap().unwrap();
        assert_eq!(manifest.forks.len(), 1);
        assert_eq!(manifest.forks[0].path, "b.yaml");
        assert_eq!(manifest.extra["owner"], "core");
        assert!(store.forks_of(DefinitionKind::Tool, "base").unwrap().is_empty());
    }
}
