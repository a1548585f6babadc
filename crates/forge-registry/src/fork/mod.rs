//! Forking definitions and merging upstream changes back in.
//!
//! A fork is a local copy of a resolved definition under a new name, stamped
//! with `fork_of = {name, version, forked_at}` and listed in the source's
//! [`SourceManifest`]. Forking never touches the upstream definition.
//!
//! Merging compares three versions: the upstream at the forked version
//! (`base`), the fork itself (`local`) and the current upstream. A clean or
//! strategy-resolved merge is written back over the fork with `fork_of`
//! advanced to the merged upstream version.

pub mod merge;
pub mod metadata;
pub mod path;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::definition::{Definition, DefinitionKind, ForkOf, Source};
use crate::error::{Error, Result};
use crate::loader::{DefinitionFormat, serialize_definition};
use crate::name::validate_name;
use crate::resolver::Resolver;
use crate::version::is_newer;

pub use merge::{Conflict, MergeResult, MergeStrategy, perform_merge, resolve_conflicts};
pub use metadata::{ForkEntry, ManifestStore, SourceManifest};
pub use path::{JsonPath, PathSegment};

/// A newly created fork.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForkResult {
    pub definition: Definition,
    pub path: PathBuf,
    pub source_name: String,
    pub source_version: String,
}

/// Outcome of [`ForkManager::check_for_updates`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCheck {
    pub fork: String,
    pub upstream: String,
    pub forked_version: String,
    pub latest_version: String,
    pub has_update: bool,
}

/// Outcome of [`ForkManager::merge_upstream`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub result: MergeResult,
    pub from_version: String,
    pub to_version: String,
    /// Whether the merged definition was written over the fork.
    pub written: bool,
    pub path: PathBuf,
}

pub struct ForkManager<'a> {
    resolver: &'a Resolver,
    manifests: ManifestStore,
}

impl<'a> ForkManager<'a> {
    pub fn new(resolver: &'a Resolver) -> Self {
        Self {
            manifests: ManifestStore::new(resolver.layout().clone()),
            resolver,
        }
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Copy the definition resolved for `source` into local storage as `new_name`.
    ///
    /// # Errors
    ///
    /// [`Error::ForkExists`] when a local definition named `new_name` exists
    /// and `force` is not set.
    pub async fn fork(
        &self,
        source: &str,
        kind: DefinitionKind,
        new_name: &str,
        force: bool,
    ) -> Result<ForkResult> {
        validate_name(new_name)?;
        let layout = self.resolver.layout();

        let mut existing = Vec::new();
        for candidate in layout.local_candidates(kind, new_name) {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                existing.push(candidate);
            }
        }
        if !force {
            if let Some(path) = existing.first() {
                return Err(Error::ForkExists { path: path.clone() });
            }
        }

        let upstream = self.resolver.resolve(source, kind).await?;
        let forked_at = Utc::now();

        let mut definition = upstream.definition.clone();
        definition.set_name(new_name);
        definition.set_fork_of(Some(ForkOf {
            name: upstream.name().to_string(),
            version: upstream.version.clone(),
            forked_at,
            merged_at: None,
        }));

        let path = layout.local_yaml_path(kind, new_name);
        let rendered = serialize_definition(&definition, DefinitionFormat::Yaml)?;
        // A stale `.md` would shadow the new `.yaml` on local lookup.
        for stale in existing.iter().filter(|p| **p != path) {
            forge_fs::io::remove_if_exists(stale)?;
            tracing::debug!(path = %stale.display(), "removed replaced local definition");
        }
        forge_fs::io::write_text(&path, &rendered)?;

        self.manifests.record_fork(
            kind,
            upstream.name(),
            ForkEntry {
                name: new_name.to_string(),
                forked_at,
                path: path.display().to_string(),
            },
        )?;
        self.resolver.invalidate(kind, new_name);

        tracing::info!(
            source = upstream.name(),
            version = %upstream.version,
            fork = new_name,
            "forked definition"
        );

        Ok(ForkResult {
            definition,
            path,
            source_name: upstream.name().to_string(),
            source_version: upstream.version,
        })
    }

    /// Compare a fork's recorded upstream version with the current upstream.
    pub async fn check_for_updates(&self, name: &str, kind: DefinitionKind) -> Result<UpdateCheck> {
        let fork = self.resolver.resolve(name, kind).await?;
        let fork_of = fork
            .definition
            .fork_of()
            .cloned()
            .ok_or_else(|| Error::NotAFork {
                kind,
                name: name.to_string(),
            })?;

        let upstream = self.resolver.resolve(&fork_of.name, kind).await?;
        Ok(UpdateCheck {
            fork: fork.name().to_string(),
            upstream: fork_of.name,
            has_update: is_newer(&upstream.version, &fork_of.version),
            forked_version: fork_of.version,
            latest_version: upstream.version,
        })
    }

    /// Three-way merge the latest upstream into the fork `name`.
    ///
    /// Without a `strategy`, conflicts are returned unresolved and nothing
    /// is written.
    pub async fn merge_upstream(
        &self,
        name: &str,
        kind: DefinitionKind,
        strategy: Option<MergeStrategy>,
    ) -> Result<MergeOutcome> {
        let local = self.resolver.resolve_tiers(name, kind).await?;
        let fork_of = local
            .definition
            .fork_of()
            .cloned()
            .ok_or_else(|| Error::NotAFork {
                kind,
                name: name.to_string(),
            })?;
        if local.source != Source::Local {
            return Err(Error::NotAFork {
                kind,
                name: name.to_string(),
            });
        }

        let base = self
            .resolver
            .resolve(&format!("{}@={}", fork_of.name, fork_of.version), kind)
            .await?;
        let upstream = self.resolver.resolve(&fork_of.name, kind).await?;

        let mut result = perform_merge(
            &base.definition.to_value()?,
            &local.definition.to_value()?,
            &upstream.definition.to_value()?,
        );
        if !result.success {
            tracing::info!(fork = name, conflicts = result.conflicts.len(), "merge conflicts");
            if let Some(strategy) = strategy {
                result = resolve_conflicts(result, strategy);
            }
        }

        let path = PathBuf::from(&local.path);
        let mut written = false;
        if result.success {
            let mut merged = Definition::from_value(result.merged.clone())?;
            merged.set_fork_of(Some(advance(fork_of.clone(), &upstream.version, Utc::now())));

            let format = DefinitionFormat::from_path(&local.path).unwrap_or(DefinitionFormat::Yaml);
            forge_fs::io::write_text(&path, &serialize_definition(&merged, format)?)?;
            self.resolver.invalidate(kind, name);
            written = true;

            tracing::info!(
                fork = name,
                from = %fork_of.version,
                to = %upstream.version,
                "merged upstream changes"
            );
        }

        Ok(MergeOutcome {
            result,
            from_version: fork_of.version,
            to_version: upstream.version,
            written,
            path,
        })
    }
}

fn advance(mut fork_of: ForkOf, version: &str, merged_at: DateTime<Utc>) -> ForkOf {
    fork_of.version = version.to_string();
    fork_of.merged_at = Some(merged_at);
    fork_of
}
