//! `extends` resolution.
//!
//! A definition's base is fetched, flattened recursively, and merged with the
//! child (see [`merge`]). The chain of names currently being flattened is
//! threaded through the recursion; meeting a name already on the chain is an
//! [`Error::InheritanceCycle`]. A missing base is always fatal.

pub mod merge;

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::definition::{Definition, DefinitionKind};
use crate::error::{Error, Result};
use crate::name::ParsedName;

pub use merge::merge_definitions;

/// Source of base definitions for inheritance.
#[async_trait]
pub trait BaseFetcher: Send + Sync {
    /// Fetch the un-flattened definition for a `name[@range]` query.
    ///
    /// Returns `Ok(None)` when no tier has it.
    async fn fetch_base(&self, query: &str, kind: DefinitionKind) -> Result<Option<Definition>>;
}

type FlattenFuture<'a> = Pin<Box<dyn Future<Output = Result<Definition>> + Send + 'a>>;

/// Flattens `extends` chains into a single definition.
pub struct InheritanceResolver<'a> {
    fetcher: &'a dyn BaseFetcher,
}

impl<'a> InheritanceResolver<'a> {
    pub fn new(fetcher: &'a dyn BaseFetcher) -> Self {
        Self { fetcher }
    }

    /// Resolve every `extends` level of `definition`.
    ///
    /// A definition without `extends` is returned unchanged.
    pub async fn resolve(&self, definition: Definition) -> Result<Definition> {
        let mut chain = vec![definition.name().to_string()];
        self.flatten(definition, &mut chain).await
    }

    fn flatten<'b>(&'b self, definition: Definition, chain: &'b mut Vec<String>) -> FlattenFuture<'b> {
        Box::pin(async move {
            let Some(parent_query) = definition.extends().map(str::to_string) else {
                return Ok(definition);
            };
            let parent = ParsedName::parse(&parent_query)?.name;

            if chain.contains(&parent) {
                let mut cycle = chain.clone();
                cycle.push(parent);
                return Err(Error::InheritanceCycle { chain: cycle });
            }

            let base = self
                .fetcher
                .fetch_base(&parent_query, definition.kind())
                .await?
                .ok_or_else(|| Error::InheritanceBaseNotFound {
                    child: definition.name().to_string(),
                    parent: parent.clone(),
                })?;

            tracing::debug!(child = definition.name(), parent = %parent, "merging base definition");

            chain.push(parent);
            let flattened = self.flatten(base, chain).await;
            chain.pop();

            Ok(merge_definitions(flattened?, definition))
        })
    }
}
