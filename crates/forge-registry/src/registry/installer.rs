//! Installs plugin items into the global registry layout.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::RegistryConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::layout::StorageLayout;
use crate::loader::{DefinitionFormat, DefinitionLoader};
use crate::name::{ParsedName, validate_name};
use crate::version::VersionRange;

use super::client::{RegistryClient, resolve_url};
use super::manifest::{ItemKind, ManifestEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledItem {
    pub kind: ItemKind,
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub kind: ItemKind,
    pub name: String,
    pub version: String,
    /// Machine-readable error code.
    pub code: String,
    pub message: String,
}

/// Result of installing one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub plugin: String,
    pub version: String,
    pub installed: Vec<InstalledItem>,
    pub failed: Vec<FailedItem>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Downloads, verifies and writes plugin items.
///
/// Each item is verified against its checksum before anything is written. A
/// failing item is recorded in the report and does not stop its siblings.
#[derive(Clone)]
pub struct Installer {
    client: RegistryClient,
    loader: Arc<dyn DefinitionLoader>,
    layout: StorageLayout,
}

impl Installer {
    pub fn new(client: RegistryClient, loader: Arc<dyn DefinitionLoader>, layout: StorageLayout) -> Self {
        Self {
            client,
            loader,
            layout,
        }
    }

    /// Install the highest version of `plugin` (`name[@range]`) listed by `registry`.
    pub async fn install_plugin(&self, registry: &RegistryConfig, plugin: &str) -> Result<InstallReport> {
        let query = ParsedName::parse(plugin)?;
        let range = VersionRange::parse(&query.version_range);

        let manifest = self.client.registry_manifest(registry).await?;
        let listed: Vec<&ManifestEntry> = manifest.plugins_named(&query.name).collect();
        let version = range
            .max_satisfying(listed.iter().map(|p| p.version.as_str()))
            .map(str::to_string);

        let Some(entry) = version.and_then(|v| listed.iter().find(|p| p.version == v).copied()) else {
            let available = listed.iter().map(|p| p.version.clone()).collect();
            return Err(Error::PluginNotFound {
                registry: registry.name.clone(),
                name: query.name.clone(),
                range: query.version_range.clone(),
                available,
            });
        };

        let plugin_manifest = self.client.plugin_manifest(registry, entry).await?;
        let plugin_url = resolve_url(&registry.url, &entry.url);

        let mut report = InstallReport {
            plugin: entry.name.clone(),
            version: entry.version.clone(),
            installed: Vec::new(),
            failed: Vec::new(),
        };

        for (kind, item) in plugin_manifest.items() {
            match self.install_item(kind, item, &plugin_url).await {
                Ok(path) => {
                    tracing::info!(kind = ?kind, name = %item.name, version = %item.version, "installed");
                    report.installed.push(InstalledItem {
                        kind,
                        name: item.name.clone(),
                        version: item.version.clone(),
                        path,
                    });
                }
                Err(e) => {
                    tracing::warn!(kind = ?kind, name = %item.name, error = %e, "item installation failed");
                    report.failed.push(FailedItem {
                        kind,
                        name: item.name.clone(),
                        version: item.version.clone(),
                        code: e.kind().as_str().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn install_item(&self, kind: ItemKind, item: &ManifestEntry, plugin_url: &str) -> Result<PathBuf> {
        validate_name(&item.name)?;
        let url = resolve_url(plugin_url, &item.url);
        let body = self
            .client
            .download_verified(&item.name, &url, &item.checksum)
            .await?;

        let format = DefinitionFormat::from_path(&url);
        let path = match kind.definition_kind() {
            Some(definition_kind) => {
                let format = format.unwrap_or(DefinitionFormat::Yaml);
                // refuse to install something the resolver could not load
                self.loader.parse(&body, format, &url, definition_kind)?;
                self.layout
                    .global_version_dir(definition_kind, &item.name, &item.version)
                    .join(format!("{}.{}", definition_kind.as_str(), format.extension()))
            }
            None => {
                let file_name = url
                    .rsplit('/')
                    .next()
                    .filter(|segment| !segment.is_empty() && !segment.contains(['?', '#']))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}.yaml", item.name));
                self.layout
                    .registry_dir()
                    .join(kind.plural())
                    .join(format!("{}@{}", item.name, item.version))
                    .join(file_name)
            }
        };

        forge_fs::io::write_text(&path, &body)?;
        Ok(path)
    }
}

impl FailedItem {
    pub fn is_checksum_mismatch(&self) -> bool {
        self.code == ErrorKind::ChecksumMismatch.as_str()
    }
}
