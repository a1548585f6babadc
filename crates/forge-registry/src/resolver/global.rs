//! User tier: `{global}/registry/{kind}s/{name}@{version}/{kind}.{md|yaml}`.

use std::path::{Path, PathBuf};

use crate::definition::{DefinitionKind, ResolvedDefinition, Source};
use crate::error::Result;
use crate::layout::{StorageLayout, split_version_dir};
use crate::loader::DefinitionLoader;
use crate::version::VersionRange;

use super::Lookup;

/// A `name@version` directory holding at least one definition file.
#[derive(Debug, Clone)]
pub(super) struct InstalledVersion {
    pub name: String,
    pub version: String,
    /// Preferred definition file in the directory.
    pub path: PathBuf,
}

/// Pick the highest installed version of `name` that satisfies `range`.
pub(super) async fn lookup(
    layout: &StorageLayout,
    loader: &dyn DefinitionLoader,
    kind: DefinitionKind,
    name: &str,
    range: &VersionRange,
) -> Result<Lookup> {
    let installed: Vec<InstalledVersion> = installed_versions(layout, kind)
        .await?
        .into_iter()
        .filter(|v| v.name == name)
        .collect();

    if installed.is_empty() {
        return Ok(Lookup::Missing);
    }

    let best = range
        .max_satisfying(installed.iter().map(|v| v.version.as_str()))
        .map(str::to_string);

    let Some(best) = best else {
        tracing::debug!(name, range = %range, "no global version satisfies range");
        return Ok(Lookup::Unsatisfied {
            available: installed.into_iter().map(|v| v.version).collect(),
        });
    };

    let Some(chosen) = installed.into_iter().find(|v| v.version == best) else {
        return Ok(Lookup::Missing);
    };

    let definition = loader.load(&chosen.path, kind).await?;
    Ok(Lookup::Found(ResolvedDefinition {
        definition,
        source: Source::Global,
        version: chosen.version,
        path: chosen.path.display().to_string(),
    }))
}

/// Enumerate installed version directories for a kind, in name then path order.
///
/// Scoped names (`@scope/name`) live one directory deeper.
pub(super) async fn installed_versions(
    layout: &StorageLayout,
    kind: DefinitionKind,
) -> Result<Vec<InstalledVersion>> {
    let root = layout.global_dir(kind);
    let mut found = Vec::new();

    for (dir, scope) in scan_dirs(&root).await? {
        let Some(dir_name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some((base, version)) = split_version_dir(&dir_name) else {
            continue;
        };

        let name = match &scope {
            Some(scope) => format!("{scope}/{base}"),
            None => base.to_string(),
        };

        if let Some(path) = preferred_file(layout, kind, &name, version).await {
            found.push(InstalledVersion {
                name,
                version: version.to_string(),
                path,
            });
        }
    }

    found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    Ok(found)
}

/// Subdirectories of `root`, descending one level into `@scope` directories.
async fn scan_dirs(root: &Path) -> Result<Vec<(PathBuf, Option<String>)>> {
    let mut dirs = Vec::new();
    for dir in subdirectories(root).await? {
        let file_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if file_name.starts_with('@') && !file_name[1..].contains('@') {
            for scoped in subdirectories(&dir).await? {
                dirs.push((scoped, Some(file_name.clone())));
            }
        } else {
            dirs.push((dir, None));
        }
    }
    Ok(dirs)
}

async fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(forge_fs::Error::io(dir, e).into()),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| forge_fs::Error::io(dir, e))?
    {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

async fn preferred_file(
    layout: &StorageLayout,
    kind: DefinitionKind,
    name: &str,
    version: &str,
) -> Option<PathBuf> {
    for candidate in layout.global_candidates(kind, name, version) {
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}
