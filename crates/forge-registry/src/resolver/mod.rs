//! Multi-tier definition resolution.
//!
//! A `name[@range]` query is answered by the first tier that has a
//! satisfying version, in the fixed order local → global → remote. Disabled
//! tiers are skipped; later tiers are never consulted once one matches, even
//! if they hold a newer version. The match is then flattened through
//! [`InheritanceResolver`] and cached under the original query.
//!
//! ```no_run
//! # async fn demo() -> forge_registry::Result<()> {
//! use forge_registry::definition::DefinitionKind;
//! use forge_registry::layout::StorageLayout;
//! use forge_registry::resolver::{Resolver, ResolverOptions};
//!
//! let resolver = Resolver::new(StorageLayout::for_project("."), ResolverOptions::default());
//! let agent = resolver.resolve("researcher@^1.0.0", DefinitionKind::Agent).await?;
//! println!("{} {} from {}", agent.name(), agent.version, agent.source);
//! # Ok(())
//! # }
//! ```

mod global;
mod local;
mod remote;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{DEFAULT_TTL, DefinitionCache};
use crate::config::ForgeConfig;
use crate::definition::{Definition, DefinitionKind, DefinitionSummary, ResolvedDefinition, Source};
use crate::error::{Error, Result};
use crate::inheritance::{BaseFetcher, InheritanceResolver};
use crate::layout::{DEFINITION_EXTENSIONS, StorageLayout};
use crate::loader::{DefinitionLoader, FileLoader};
use crate::name::ParsedName;
use crate::version::VersionRange;

pub use remote::{RegistryRemoteSource, RemoteSource};

/// Outcome of consulting a single tier.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(ResolvedDefinition),
    /// The name exists in the tier but no version satisfied the range.
    Unsatisfied { available: Vec<String> },
    Missing,
}

/// Which tiers and caches a [`Resolver`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub local: bool,
    pub global: bool,
    pub remote: bool,
    pub cache: bool,
    pub cache_ttl: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            local: true,
            global: true,
            remote: false,
            cache: true,
            cache_ttl: DEFAULT_TTL,
        }
    }
}

impl From<&ForgeConfig> for ResolverOptions {
    fn from(config: &ForgeConfig) -> Self {
        Self {
            local: config.resolver.local.enabled,
            global: config.resolver.global.enabled,
            remote: config.resolver.remote.enabled,
            cache: config.cache.enabled,
            cache_ttl: config.cache.ttl(),
        }
    }
}

pub struct Resolver {
    layout: StorageLayout,
    options: ResolverOptions,
    loader: Arc<dyn DefinitionLoader>,
    remote: Option<Arc<dyn RemoteSource>>,
    cache: DefinitionCache,
}

impl Resolver {
    pub fn new(layout: StorageLayout, options: ResolverOptions) -> Self {
        Self {
            layout,
            options,
            loader: Arc::new(FileLoader::new()),
            remote: None,
            cache: DefinitionCache::new(options.cache_ttl),
        }
    }

    /// Replace the default [`FileLoader`].
    pub fn with_loader(mut self, loader: Arc<dyn DefinitionLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Attach the remote tier. It is only consulted when `options.remote` is set.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn loader(&self) -> Arc<dyn DefinitionLoader> {
        Arc::clone(&self.loader)
    }

    /// Resolve a `name[@range]` query to a fully inherited definition.
    ///
    /// # Errors
    ///
    /// - [`Error::AgentNotFound`] / [`Error::ToolNotFound`] when no tier has the name
    /// - [`Error::VersionNotFound`] when the name exists but no version satisfies the range
    /// - inheritance, parse and schema errors from the matching tier
    pub async fn resolve(&self, query: &str, kind: DefinitionKind) -> Result<ResolvedDefinition> {
        if self.options.cache {
            if let Some(hit) = self.cache.get(kind, query) {
                tracing::debug!(query, kind = %kind, "definition cache hit");
                return Ok(hit);
            }
        }

        let ResolvedDefinition {
            definition,
            source,
            version,
            path,
        } = self.resolve_tiers(query, kind).await?;

        let resolved = ResolvedDefinition {
            definition: InheritanceResolver::new(self).resolve(definition).await?,
            source,
            version,
            path,
        };

        tracing::info!(
            name = resolved.name(),
            kind = %kind,
            version = %resolved.version,
            source = %resolved.source,
            "resolved definition"
        );

        if self.options.cache {
            self.cache.insert(kind, query, resolved.clone());
        }
        Ok(resolved)
    }

    pub async fn resolve_agent(&self, query: &str) -> Result<ResolvedDefinition> {
        self.resolve(query, DefinitionKind::Agent).await
    }

    pub async fn resolve_tool(&self, query: &str) -> Result<ResolvedDefinition> {
        self.resolve(query, DefinitionKind::Tool).await
    }

    /// Walk the tiers without applying inheritance or the cache.
    pub async fn resolve_tiers(&self, query: &str, kind: DefinitionKind) -> Result<ResolvedDefinition> {
        let parsed = ParsedName::parse(query)?;
        let range = VersionRange::parse(&parsed.version_range);
        let name = parsed.name.as_str();

        let mut searched = Vec::new();
        let mut available = Vec::new();

        if self.options.local {
            searched.push(self.layout.local_dir(kind).display().to_string());
            match local::lookup(&self.layout, self.loader.as_ref(), kind, name, &range).await? {
                Lookup::Found(found) => return Ok(found),
                Lookup::Unsatisfied { available: seen } => available.extend(seen),
                Lookup::Missing => tracing::debug!(name, kind = %kind, "not in local tier"),
            }
        }

        if self.options.global {
            searched.push(self.layout.global_dir(kind).display().to_string());
            match global::lookup(&self.layout, self.loader.as_ref(), kind, name, &range).await? {
                Lookup::Found(found) => return Ok(found),
                Lookup::Unsatisfied { available: seen } => available.extend(seen),
                Lookup::Missing => tracing::debug!(name, kind = %kind, "not in global tier"),
            }
        }

        if let Some(remote) = self.remote.as_ref().filter(|_| self.options.remote) {
            searched.push(Source::Remote.to_string());
            match remote.lookup(kind, name, &range).await {
                Ok(Lookup::Found(found)) => return Ok(found),
                Ok(Lookup::Unsatisfied { available: seen }) => available.extend(seen),
                Ok(Lookup::Missing) => tracing::debug!(name, kind = %kind, "not in remote tier"),
                Err(e) => {
                    tracing::warn!(name, kind = %kind, error = %e, "remote tier failed, treating as miss")
                }
            }
        }

        if available.is_empty() {
            Err(Error::not_found(kind, name, &parsed.version_range, searched))
        } else {
            Err(Error::VersionNotFound {
                kind,
                name: parsed.name,
                range: parsed.version_range,
                available,
            })
        }
    }

    /// `true` if the query resolves; not-found errors map to `false`.
    pub async fn exists(&self, query: &str, kind: DefinitionKind) -> Result<bool> {
        match self.resolve(query, kind).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind().is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Enumerate definitions on disk, optionally restricted to one tier.
    ///
    /// Unreadable local files are skipped with a warning. The remote tier is
    /// not listed.
    pub async fn list(&self, kind: DefinitionKind, source: Option<Source>) -> Result<Vec<DefinitionSummary>> {
        let wants = |tier: Source| source.is_none_or(|s| s == tier);
        let mut summaries = Vec::new();

        if self.options.local && wants(Source::Local) {
            for (name, path) in self.local_files(kind).await? {
                match self.loader.load(&path, kind).await {
                    Ok(definition) => summaries.push(DefinitionSummary {
                        name,
                        kind,
                        version: definition.version().to_string(),
                        source: Source::Local,
                        path: path.display().to_string(),
                    }),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable definition")
                    }
                }
            }
        }

        if self.options.global && wants(Source::Global) {
            for installed in global::installed_versions(&self.layout, kind).await? {
                summaries.push(DefinitionSummary {
                    name: installed.name,
                    kind,
                    version: installed.version,
                    source: Source::Global,
                    path: installed.path.display().to_string(),
                });
            }
        }

        Ok(summaries)
    }

    /// Local definition files by name, preferring `.md` over `.yaml`.
    pub(crate) async fn local_files(&self, kind: DefinitionKind) -> Result<Vec<(String, std::path::PathBuf)>> {
        let dir = self.layout.local_dir(kind);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(forge_fs::Error::io(&dir, e).into()),
        };

        let mut by_name: BTreeMap<String, (usize, std::path::PathBuf)> = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| forge_fs::Error::io(&dir, e))?
        {
            let path = entry.path();
            let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
                continue;
            };
            let Some(rank) = DEFINITION_EXTENSIONS
                .iter()
                .position(|candidate| ext.eq_ignore_ascii_case(candidate))
            else {
                continue;
            };

            let name = stem.to_string_lossy().into_owned();
            match by_name.get(&name) {
                Some((existing, _)) if *existing <= rank => {}
                _ => {
                    by_name.insert(name, (rank, path));
                }
            }
        }

        Ok(by_name.into_iter().map(|(name, (_, path))| (name, path)).collect())
    }

    /// Drop every cached query for `name`.
    pub fn invalidate(&self, kind: DefinitionKind, name: &str) {
        self.cache.invalidate_name(kind, name);
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    pub fn cache(&self) -> &DefinitionCache {
        &self.cache
    }
}

#[async_trait]
impl BaseFetcher for Resolver {
    async fn fetch_base(&self, query: &str, kind: DefinitionKind) -> Result<Option<Definition>> {
        match self.resolve_tiers(query, kind).await {
            Ok(resolved) => Ok(Some(resolved.definition)),
            Err(e) if e.kind().is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
