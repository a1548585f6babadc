//! Top-level entry point tying configuration, storage and resolution together.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::ManifestCache;
use crate::config::{ConfigLoader, ForgeConfig};
use crate::definition::{DefinitionKind, ResolvedDefinition};
use crate::dependency::{DependencyOptions, DependencyResolution, DependencyResolver};
use crate::error::Result;
use crate::fork::ForkManager;
use crate::layout::StorageLayout;
use crate::loader::{DefinitionLoader, FileLoader};
use crate::lockfile::LockfileManager;
use crate::registry::{HttpFetcher, Installer, ManifestFetcher, RegistryClient};
use crate::resolver::{RegistryRemoteSource, Resolver};

/// A project opened against the registry.
pub struct Forge {
    config: ForgeConfig,
    resolver: Resolver,
    fetcher: Option<Arc<dyn ManifestFetcher>>,
}

impl Forge {
    /// Open `project_root` using the user's global registry and the process
    /// environment.
    pub fn open(project_root: impl Into<PathBuf>) -> Result<Self> {
        let mut layout = StorageLayout::for_project(project_root);
        let mut config = ConfigLoader::for_layout(&layout).load()?;

        let overridden = apply_path_overrides(&layout, &config);
        if overridden != layout {
            tracing::debug!(
                project = %overridden.project_root().display(),
                global = %overridden.global_root().display(),
                "reloading config for overridden roots"
            );
            layout = overridden;
            config = ConfigLoader::for_layout(&layout).load()?;
        }

        let fetcher: Arc<dyn ManifestFetcher> =
            Arc::new(HttpFetcher::new(config.resolver.remote.timeout())?);
        Ok(Self::with_parts(layout, config, Some(fetcher)))
    }

    /// Assemble from explicit parts.
    ///
    /// The remote tier is attached only when `fetcher` is given, the remote
    /// tier is enabled and at least one registry is active.
    pub fn with_parts(
        layout: StorageLayout,
        config: ForgeConfig,
        fetcher: Option<Arc<dyn ManifestFetcher>>,
    ) -> Self {
        let loader: Arc<dyn DefinitionLoader> = Arc::new(FileLoader);
        let mut resolver = Resolver::new(layout, (&config).into()).with_loader(loader.clone());

        let registries: Vec<_> = config.active_registries().into_iter().cloned().collect();
        match &fetcher {
            Some(fetcher) if config.resolver.remote.enabled && !registries.is_empty() => {
                let client = registry_client(fetcher.clone(), resolver.layout(), &config);
                resolver = resolver.with_remote(Arc::new(RegistryRemoteSource::new(
                    client, registries, loader,
                )));
            }
            _ => tracing::debug!("remote tier not attached"),
        }

        Self {
            config,
            resolver,
            fetcher,
        }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn layout(&self) -> &StorageLayout {
        self.resolver.layout()
    }

    pub async fn resolve(&self, query: &str, kind: DefinitionKind) -> Result<ResolvedDefinition> {
        self.resolver.resolve(query, kind).await
    }

    pub async fn resolve_dependencies(
        &self,
        root: &str,
        kind: DefinitionKind,
        options: DependencyOptions,
    ) -> Result<DependencyResolution> {
        DependencyResolver::new(&self.resolver)
            .resolve(root, kind, options)
            .await
    }

    pub fn forks(&self) -> ForkManager<'_> {
        ForkManager::new(&self.resolver)
    }

    pub fn lockfile(&self) -> LockfileManager<'_> {
        LockfileManager::new(&self.resolver, &self.config)
    }

    /// Installer into the global tier, or `None` without a manifest fetcher.
    pub fn installer(&self) -> Option<Installer> {
        let fetcher = self.fetcher.clone()?;
        let client = registry_client(fetcher, self.layout(), &self.config);
        Some(Installer::new(
            client,
            self.resolver.loader(),
            self.layout().clone(),
        ))
    }
}

fn registry_client(
    fetcher: Arc<dyn ManifestFetcher>,
    layout: &StorageLayout,
    config: &ForgeConfig,
) -> RegistryClient {
    let client = RegistryClient::new(fetcher);
    if config.cache.enabled {
        client.with_cache(ManifestCache::new(layout.manifest_cache_dir()))
    } else {
        client
    }
}

fn apply_path_overrides(layout: &StorageLayout, config: &ForgeConfig) -> StorageLayout {
    let project = config
        .paths
        .project_root
        .clone()
        .unwrap_or_else(|| layout.project_root().to_path_buf());
    let global = config
        .paths
        .global_root
        .clone()
        .unwrap_or_else(|| layout.global_root().to_path_buf());
    StorageLayout::new(project, global)
}
