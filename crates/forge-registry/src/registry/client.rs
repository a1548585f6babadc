use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::ManifestCache;
use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::version::VersionRange;

use super::manifest::{ItemKind, ManifestEntry, PluginManifest, RegistryManifest};

/// Transport for registry documents.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch the body at `url` as text.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// [`ManifestFetcher`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("forge-registry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network {
                url: String::new(),
                status: None,
                message: e.to_string(),
            })?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            Error::Network {
                url: url.to_string(),
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ManifestFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "fetching");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("unexpected status {status}"),
            });
        }

        response.text().await.map_err(|e| self.map_error(url, e))
    }
}

/// Resolve `url` against the document it was listed in.
///
/// Absolute URLs are returned unchanged; relative ones replace the last path
/// segment of `base`.
pub fn resolve_url(base: &str, url: &str) -> String {
    if url.contains("://") {
        return url.to_string();
    }
    match base.rfind('/') {
        Some(idx) if base[..idx].contains("://") || !base.contains("://") => {
            format!("{}/{}", &base[..idx], url.trim_start_matches("./"))
        }
        _ => url.to_string(),
    }
}

/// A versioned item found in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMatch {
    pub registry: String,
    pub plugin: String,
    pub entry: ManifestEntry,
    /// Absolute download URL.
    pub url: String,
}

/// Outcome of [`RegistryClient::find_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSearch {
    Found(ItemMatch),
    /// No version satisfied; `available` lists the versions seen, if any.
    NotFound { available: Vec<String> },
}

/// Reads registry and plugin manifests and downloads verified items.
#[derive(Clone)]
pub struct RegistryClient {
    fetcher: Arc<dyn ManifestFetcher>,
    cache: Option<ManifestCache>,
}

impl RegistryClient {
    pub fn new(fetcher: Arc<dyn ManifestFetcher>) -> Self {
        Self {
            fetcher,
            cache: None,
        }
    }

    /// Consult and populate `cache` for registry manifests.
    pub fn with_cache(mut self, cache: ManifestCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&ManifestCache> {
        self.cache.as_ref()
    }

    /// The registry's manifest, from cache while fresh.
    pub async fn registry_manifest(&self, registry: &RegistryConfig) -> Result<RegistryManifest> {
        if let Some(entry) = self.cache.as_ref().and_then(|c| c.get(&registry.name)) {
            match serde_json::from_value(entry.manifest) {
                Ok(manifest) => {
                    tracing::debug!(registry = %registry.name, "registry manifest cache hit");
                    return Ok(manifest);
                }
                Err(e) => {
                    tracing::debug!(registry = %registry.name, error = %e, "cached manifest unusable, refetching");
                }
            }
        }

        let body = self.fetcher.fetch_text(&registry.url).await?;
        let value: Value = parse_json(&registry.url, &body)?;
        let manifest: RegistryManifest = from_json_value(&registry.url, value.clone())?;

        if let Some(cache) = &self.cache {
            cache.set(&registry.name, &registry.url, value, registry.cache_ttl());
        }
        Ok(manifest)
    }

    /// Fetch and verify a plugin manifest listed by `registry`.
    pub async fn plugin_manifest(
        &self,
        registry: &RegistryConfig,
        plugin: &ManifestEntry,
    ) -> Result<PluginManifest> {
        let url = resolve_url(&registry.url, &plugin.url);
        let body = self.download_verified(&plugin.name, &url, &plugin.checksum).await?;
        let value = parse_json(&url, &body)?;
        from_json_value(&url, value)
    }

    /// Download `url` and check it against a `sha256:` checksum.
    ///
    /// An empty checksum skips verification with a warning.
    pub async fn download_verified(&self, item: &str, url: &str, checksum: &str) -> Result<String> {
        let body = self.fetcher.fetch_text(url).await?;
        if checksum.is_empty() {
            tracing::warn!(item, url, "registry entry has no checksum, skipping verification");
            return Ok(body);
        }

        forge_fs::checksum::verify_checksum(body.as_bytes(), checksum).map_err(|e| match e {
            forge_fs::Error::ChecksumMismatch { expected, actual } => Error::ChecksumMismatch {
                item: item.to_string(),
                expected,
                actual,
            },
            other => Error::Fs(other),
        })?;
        Ok(body)
    }

    /// Find the highest version of an item satisfying `range` across every
    /// plugin of `registry`.
    ///
    /// Unreadable plugin manifests are skipped with a warning.
    pub async fn find_item(
        &self,
        registry: &RegistryConfig,
        kind: ItemKind,
        name: &str,
        range: &VersionRange,
    ) -> Result<ItemSearch> {
        let manifest = self.registry_manifest(registry).await?;

        let mut candidates = Vec::new();
        for plugin in &manifest.plugins {
            let plugin_manifest = match self.plugin_manifest(registry, plugin).await {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(registry = %registry.name, plugin = %plugin.name, error = %e, "skipping plugin");
                    continue;
                }
            };
            let plugin_url = resolve_url(&registry.url, &plugin.url);
            for entry in plugin_manifest.entries(kind).iter().filter(|e| e.name == name) {
                candidates.push(ItemMatch {
                    registry: registry.name.clone(),
                    plugin: plugin.name.clone(),
                    url: resolve_url(&plugin_url, &entry.url),
                    entry: entry.clone(),
                });
            }
        }

        let best = range
            .max_satisfying(candidates.iter().map(|c| c.entry.version.as_str()))
            .map(str::to_string);

        let found = best.and_then(|version| {
            candidates
                .iter()
                .position(|c| c.entry.version == version)
        });
        Ok(match found {
            Some(idx) => ItemSearch::Found(candidates.swap_remove(idx)),
            None => ItemSearch::NotFound {
                available: candidates.into_iter().map(|c| c.entry.version).collect(),
            },
        })
    }
}

fn parse_json(url: &str, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| Error::Network {
        url: url.to_string(),
        status: None,
        message: format!("invalid manifest JSON: {e}"),
    })
}

fn from_json_value<T: DeserializeOwned>(url: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Network {
        url: url.to_string(),
        status: None,
        message: format!("unexpected manifest shape: {e}"),
    })
}
