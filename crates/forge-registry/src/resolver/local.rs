//! Project tier: exactly one unversioned file per name.

use crate::definition::{DefinitionKind, ResolvedDefinition, Source};
use crate::error::Result;
use crate::layout::StorageLayout;
use crate::loader::DefinitionLoader;
use crate::version::VersionRange;

use super::Lookup;

/// Load `{project}/.fractary/{kind}s/{name}.{md|yaml}` and check its version.
pub(super) async fn lookup(
    layout: &StorageLayout,
    loader: &dyn DefinitionLoader,
    kind: DefinitionKind,
    name: &str,
    range: &VersionRange,
) -> Result<Lookup> {
    for path in layout.local_candidates(kind, name) {
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            continue;
        }

        let definition = loader.load(&path, kind).await?;
        let version = definition.version().to_string();
        if !range.matches(&version) {
            tracing::debug!(name, range = %range, version = %version, "local definition does not satisfy range");
            return Ok(Lookup::Unsatisfied {
                available: vec![version],
            });
        }

        return Ok(Lookup::Found(ResolvedDefinition {
            definition,
            source: Source::Local,
            version,
            path: path.display().to_string(),
        }));
    }

    Ok(Lookup::Missing)
}
