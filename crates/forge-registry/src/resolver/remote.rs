//! Remote tier.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RegistryConfig;
use crate::definition::{DefinitionKind, ResolvedDefinition, Source};
use crate::error::Result;
use crate::loader::{DefinitionFormat, DefinitionLoader};
use crate::registry::{ItemKind, ItemSearch, RegistryClient};
use crate::version::VersionRange;

use super::Lookup;

/// A fetch-and-validate source consulted after the on-disk tiers.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn lookup(&self, kind: DefinitionKind, name: &str, range: &VersionRange) -> Result<Lookup>;
}

/// [`RemoteSource`] backed by configured registries, walked in priority order.
pub struct RegistryRemoteSource {
    client: RegistryClient,
    registries: Vec<RegistryConfig>,
    loader: Arc<dyn DefinitionLoader>,
}

impl RegistryRemoteSource {
    /// `registries` should already be filtered to enabled ones and sorted.
    pub fn new(
        client: RegistryClient,
        registries: Vec<RegistryConfig>,
        loader: Arc<dyn DefinitionLoader>,
    ) -> Self {
        Self {
            client,
            registries,
            loader,
        }
    }
}

#[async_trait]
impl RemoteSource for RegistryRemoteSource {
    async fn lookup(&self, kind: DefinitionKind, name: &str, range: &VersionRange) -> Result<Lookup> {
        let mut available = Vec::new();

        for registry in &self.registries {
            let search = match self
                .client
                .find_item(registry, ItemKind::from(kind), name, range)
                .await
            {
                Ok(search) => search,
                Err(e) => {
                    tracing::warn!(registry = %registry.name, error = %e, "registry unavailable");
                    continue;
                }
            };

            let item = match search {
                ItemSearch::Found(item) => item,
                ItemSearch::NotFound { available: seen } => {
                    available.extend(seen);
                    continue;
                }
            };

            let body = self
                .client
                .download_verified(&item.entry.name, &item.url, &item.entry.checksum)
                .await?;
            let format = DefinitionFormat::from_path(&item.url).unwrap_or(DefinitionFormat::Yaml);
            let definition = self.loader.parse(&body, format, &item.url, kind)?;

            tracing::debug!(registry = %registry.name, name, version = %item.entry.version, "remote match");
            return Ok(Lookup::Found(ResolvedDefinition {
                definition,
                source: Source::Remote,
                version: item.entry.version,
                path: item.url,
            }));
        }

        Ok(if available.is_empty() {
            Lookup::Missing
        } else {
            Lookup::Unsatisfied { available }
        })
    }
}
