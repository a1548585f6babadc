use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::definition::DefinitionKind;

/// Top-level document served at a registry URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryManifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub plugins: Vec<ManifestEntry>,
}

impl RegistryManifest {
    /// Plugin entries named `name`.
    pub fn plugins_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ManifestEntry> {
        self.plugins.iter().filter(move |p| p.name == name)
    }
}

/// A downloadable document: a plugin manifest or a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    /// `sha256:<hex>` of the document at `url`.
    #[serde(default)]
    pub checksum: String,
}

/// Item categories a plugin can ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Agent,
    Tool,
    Workflow,
    Template,
    Hook,
    Command,
}

impl ItemKind {
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Agent => "agents",
            Self::Tool => "tools",
            Self::Workflow => "workflows",
            Self::Template => "templates",
            Self::Hook => "hooks",
            Self::Command => "commands",
        }
    }

    /// The resolvable definition kind, for agents and tools.
    pub fn definition_kind(&self) -> Option<DefinitionKind> {
        match self {
            Self::Agent => Some(DefinitionKind::Agent),
            Self::Tool => Some(DefinitionKind::Tool),
            _ => None,
        }
    }
}

impl From<DefinitionKind> for ItemKind {
    fn from(kind: DefinitionKind) -> Self {
        match kind {
            DefinitionKind::Agent => Self::Agent,
            DefinitionKind::Tool => Self::Tool,
        }
    }
}

/// Contents of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub agents: Vec<ManifestEntry>,
    pub tools: Vec<ManifestEntry>,
    pub workflows: Vec<ManifestEntry>,
    pub templates: Vec<ManifestEntry>,
    pub hooks: Vec<ManifestEntry>,
    pub commands: Vec<ManifestEntry>,
}

impl PluginManifest {
    pub fn entries(&self, kind: ItemKind) -> &[ManifestEntry] {
        match kind {
            ItemKind::Agent => &self.agents,
            ItemKind::Tool => &self.tools,
            ItemKind::Workflow => &self.workflows,
            ItemKind::Template => &self.templates,
            ItemKind::Hook => &self.hooks,
            ItemKind::Command => &self.commands,
        }
    }

    /// Every item with its kind, agents first.
    pub fn items(&self) -> impl Iterator<Item = (ItemKind, &ManifestEntry)> {
        [
            ItemKind::Agent,
            ItemKind::Tool,
            ItemKind::Workflow,
            ItemKind::Template,
            ItemKind::Hook,
            ItemKind::Command,
        ]
        .into_iter()
        .flat_map(move |kind| self.entries(kind).iter().map(move |entry| (kind, entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_manifest_parses() {
        let manifest: RegistryManifest = serde_json::from_value(json!({
            "name": "fractary",
            "version": "1.0.0",
            "description": "Core registry",
            "updated": "2025-01-15T10:00:00Z",
            "plugins": [{
                "name": "research", "version": "1.2.0", "description": "",
                "url": "plugins/research.json", "checksum": "sha256:00"
            }]
        }))
        .unwrap();
        assert_eq!(manifest.plugins_named("research").count(), 1);
        assert!(manifest.updated.is_some());
    }

    #[test]
    fn plugin_items_in_kind_order() {
        let entry = |name: &str| ManifestEntry {
            name: name.into(),
            version: "1.0.0".into(),
            description: String::new(),
            url: format!("{name}.yaml"),
            checksum: String::new(),
        };
        let plugin = PluginManifest {
            tools: vec![entry("t")],
            agents: vec![entry("a")],
            hooks: vec![entry("h")],
            ..Default::default()
        };

        let kinds: Vec<ItemKind> = plugin.items().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![ItemKind::Agent, ItemKind::Tool, ItemKind::Hook]);
        assert_eq!(ItemKind::Hook.definition_kind(), None);
    }
}
