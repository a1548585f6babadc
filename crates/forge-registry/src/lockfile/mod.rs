//! Reproducibility lockfile.
//!
//! `{project}/.fractary/forge-lock.json` records, for every agent and tool
//! the project uses, the exact version resolved, the tier it came from and an
//! integrity hash of the resolved definition. The lockfile is declarative: it
//! never triggers installation.

pub mod integrity;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use forge_fs::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::config::ForgeConfig;
use crate::definition::{DefinitionKind, Source};
use crate::error::{Error, Result};
use crate::name::ParsedName;
use crate::resolver::Resolver;

pub use integrity::{calculate_integrity, canonicalize, integrity_of, verify_integrity};

pub const LOCKFILE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileEntry {
    pub version: String,
    pub resolved: Source,
    /// `sha256-<hex>` of the resolved definition.
    pub integrity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    pub generated: DateTime<Utc>,
    #[serde(default)]
    pub agents: BTreeMap<String, LockfileEntry>,
    #[serde(default)]
    pub tools: BTreeMap<String, LockfileEntry>,
}

impl Lockfile {
    pub fn new() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            generated: Utc::now(),
            agents: BTreeMap::new(),
            tools: BTreeMap::new(),
        }
    }

    pub fn entries(&self, kind: DefinitionKind) -> &BTreeMap<String, LockfileEntry> {
        match kind {
            DefinitionKind::Agent => &self.agents,
            DefinitionKind::Tool => &self.tools,
        }
    }

    pub fn entries_mut(&mut self, kind: DefinitionKind) -> &mut BTreeMap<String, LockfileEntry> {
        match kind {
            DefinitionKind::Agent => &mut self.agents,
            DefinitionKind::Tool => &mut self.tools,
        }
    }

    pub fn get(&self, kind: DefinitionKind, name: &str) -> Option<&LockfileEntry> {
        self.entries(kind).get(name)
    }

    pub fn len(&self) -> usize {
        self.agents.len() + self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}

/// A used definition that could not be locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub kind: DefinitionKind,
    pub query: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockfileReport {
    pub path: PathBuf,
    pub lockfile: Lockfile,
    pub skipped: Vec<SkippedEntry>,
}

/// How a locked entry differs from what resolves today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "drift", rename_all = "snake_case")]
pub enum Drift {
    VersionChanged { locked: String, current: String },
    IntegrityMismatch { locked: String, current: String },
    SourceChanged { locked: Source, current: Source },
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftEntry {
    pub kind: DefinitionKind,
    pub name: String,
    #[serde(flatten)]
    pub drift: Drift,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub drift: Vec<DriftEntry>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}

pub struct LockfileManager<'a> {
    resolver: &'a Resolver,
    agents: Vec<String>,
    tools: Vec<String>,
    path: PathBuf,
    store: DocumentStore,
}

impl<'a> LockfileManager<'a> {
    /// `config` supplies the agents and tools referenced by the project.
    pub fn new(resolver: &'a Resolver, config: &ForgeConfig) -> Self {
        Self {
            path: resolver.layout().lockfile_path(),
            resolver,
            agents: config.agents.clone(),
            tools: config.tools.clone(),
            store: DocumentStore::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Lockfile>> {
        Ok(self.store.load_optional(&self.path)?)
    }

    /// Write a fresh lockfile.
    ///
    /// # Errors
    ///
    /// [`Error::LockfileExists`] if one exists and `force` is not set.
    pub async fn generate(&self, force: bool) -> Result<LockfileReport> {
        if !force && tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Err(Error::LockfileExists {
                path: self.path.clone(),
            });
        }

        let (lockfile, skipped) = self.build(None).await?;
        self.store.save(&self.path, &lockfile)?;
        tracing::info!(path = %self.path.display(), entries = lockfile.len(), skipped = skipped.len(), "generated lockfile");

        Ok(LockfileReport {
            path: self.path.clone(),
            lockfile,
            skipped,
        })
    }

    /// Recompute entries for every used definition.
    ///
    /// Entries that fail to resolve keep their previously locked values.
    pub async fn update(&self) -> Result<LockfileReport> {
        let previous = self.load()?;
        let (lockfile, skipped) = self.build(previous.as_ref()).await?;
        self.store.save(&self.path, &lockfile)?;
        tracing::info!(path = %self.path.display(), entries = lockfile.len(), "updated lockfile");

        Ok(LockfileReport {
            path: self.path.clone(),
            lockfile,
            skipped,
        })
    }

    /// Re-resolve every locked entry and report drift.
    ///
    /// Returns an empty report when no lockfile exists.
    pub async fn verify(&self) -> Result<VerifyReport> {
        let Some(lockfile) = self.load()? else {
            return Ok(VerifyReport::default());
        };
        let queries = self.discover().await?;
        let mut report = VerifyReport::default();

        for kind in DefinitionKind::ALL {
            for (name, locked) in lockfile.entries(kind) {
                report.checked += 1;
                let query = queries
                    .get(&(kind, name.clone()))
                    .cloned()
                    .unwrap_or_else(|| name.clone());

                let current = match self.resolver.resolve(&query, kind).await {
                    Ok(current) => current,
                    Err(e) if e.kind().is_not_found() => {
                        report.drift.push(DriftEntry {
                            kind,
                            name: name.clone(),
                            drift: Drift::Missing,
                        });
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let mut push = |drift| {
                    report.drift.push(DriftEntry {
                        kind,
                        name: name.clone(),
                        drift,
                    })
                };

                if current.version != locked.version {
                    push(Drift::VersionChanged {
                        locked: locked.version.clone(),
                        current: current.version.clone(),
                    });
                } else {
                    let integrity = calculate_integrity(&current.definition)?;
                    if integrity != locked.integrity {
                        push(Drift::IntegrityMismatch {
                            locked: locked.integrity.clone(),
                            current: integrity,
                        });
                    }
                }
                if current.source != locked.resolved {
                    push(Drift::SourceChanged {
                        locked: locked.resolved,
                        current: current.source,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Used definitions: every local file plus configured references.
    ///
    /// Keyed by kind and name; a configured `name@range` replaces the bare
    /// local name.
    pub async fn discover(&self) -> Result<BTreeMap<(DefinitionKind, String), String>> {
        let mut used = BTreeMap::new();

        for kind in DefinitionKind::ALL {
            for (name, _) in self.resolver.local_files(kind).await? {
                used.insert((kind, name.clone()), name);
            }
        }

        let configured = self
            .agents
            .iter()
            .map(|q| (DefinitionKind::Agent, q))
            .chain(self.tools.iter().map(|q| (DefinitionKind::Tool, q)));
        for (kind, query) in configured {
            match ParsedName::parse(query) {
                Ok(parsed) => {
                    used.insert((kind, parsed.name), query.clone());
                }
                Err(e) => tracing::warn!(query = %query, error = %e, "ignoring invalid reference in config"),
            }
        }

        Ok(used)
    }

    async fn build(&self, previous: Option<&Lockfile>) -> Result<(Lockfile, Vec<SkippedEntry>)> {
        let mut lockfile = Lockfile::new();
        let mut skipped = Vec::new();

        for ((kind, name), query) in self.discover().await? {
            match self.resolver.resolve(&query, kind).await {
                Ok(resolved) => {
                    let entry = LockfileEntry {
                        version: resolved.version.clone(),
                        resolved: resolved.source,
                        integrity: calculate_integrity(&resolved.definition)?,
                    };
                    lockfile.entries_mut(kind).insert(name, entry);
                }
                Err(e) => {
                    tracing::warn!(query = %query, kind = %kind, error = %e, "could not lock definition");
                    if let Some(kept) = previous.and_then(|p| p.get(kind, &name)) {
                        lockfile.entries_mut(kind).insert(name.clone(), kept.clone());
                    }
                    skipped.push(SkippedEntry {
                        kind,
                        query,
                        code: e.kind().as_str().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok((lockfile, skipped))
    }
}
