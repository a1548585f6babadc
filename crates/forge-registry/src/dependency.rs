//! Transitive dependency resolution.
//!
//! Starting at a root definition, every referenced tool (`tools` on agents,
//! `depends_on` on tools) is resolved and added to a fresh
//! [`DependencyGraph`]. A dependency that fails to resolve is logged and
//! recorded in [`DependencyResolution::unresolved`] so the rest of the tree is
//! still reported; only exceeding the depth limit aborts the walk.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::definition::DefinitionKind;
use crate::error::{Error, Result};
use crate::graph::{Cycle, CycleDetector, DependencyGraph, DependencyNode, node_key};
use crate::name::ParsedName;
use crate::resolver::Resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyOptions {
    pub max_depth: usize,
    pub detect_cycles: bool,
}

impl Default for DependencyOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            detect_cycles: true,
        }
    }
}

/// A dependency reference that could not be resolved during the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDependency {
    /// Graph key of the node that declared it.
    pub required_by: String,
    pub query: String,
    /// Machine-readable error code.
    pub code: String,
    pub message: String,
}

/// Graph and diagnostics produced by one walk.
#[derive(Debug, Clone)]
pub struct DependencyResolution {
    /// Graph key of the root node.
    pub root: String,
    pub graph: DependencyGraph,
    /// Empty when cycle detection was disabled.
    pub cycles: Vec<Cycle>,
    pub unresolved: Vec<UnresolvedDependency>,
}

impl DependencyResolution {
    /// Nodes with every dependency before its dependents, or `None` on a cycle.
    pub fn order(&self) -> Option<Vec<&DependencyNode>> {
        self.graph.topological_sort()
    }

    /// Like [`order`](Self::order) but a cycle is an error.
    pub fn require_order(&self) -> Result<Vec<&DependencyNode>> {
        self.order().ok_or_else(|| {
            let cycle = self
                .cycles
                .first()
                .cloned()
                .or_else(|| CycleDetector::new(&self.graph).detect().into_iter().next());
            Error::CircularDependency {
                cycle: cycle.map(|c| c.nodes).unwrap_or_default(),
            }
        })
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

struct Walk {
    graph: DependencyGraph,
    visited: HashSet<String>,
    unresolved: Vec<UnresolvedDependency>,
}

/// Builds dependency graphs on top of a [`Resolver`].
pub struct DependencyResolver<'a> {
    resolver: &'a Resolver,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(resolver: &'a Resolver) -> Self {
        Self { resolver }
    }

    /// Walk the dependencies of `root` (a `name[@range]` query).
    ///
    /// # Errors
    ///
    /// Fails if the root itself does not resolve, or with
    /// [`Error::DepthExceeded`] when a chain is deeper than `max_depth`.
    pub async fn resolve(
        &self,
        root: &str,
        kind: DefinitionKind,
        options: DependencyOptions,
    ) -> Result<DependencyResolution> {
        let root_name = ParsedName::parse(root)?.name;
        let mut walk = Walk {
            graph: DependencyGraph::new(),
            visited: HashSet::new(),
            unresolved: Vec::new(),
        };

        self.visit(root.to_string(), kind, 0, None, options, &mut walk)
            .await?;

        // edges are added once all nodes are known
        let edges: Vec<(String, String)> = walk
            .graph
            .nodes()
            .flat_map(|node| {
                let from = node.key();
                node.dependencies
                    .iter()
                    .filter_map(|dep| ParsedName::parse(dep).ok())
                    .map(move |dep| (from.clone(), node_key(DefinitionKind::Tool, &dep.name)))
            })
            .collect();
        for (from, to) in edges {
            walk.graph.add_dependency(&from, &to);
        }

        let cycles = if options.detect_cycles {
            CycleDetector::new(&walk.graph).detect()
        } else {
            Vec::new()
        };
        for cycle in &cycles {
            tracing::warn!(cycle = %cycle, "circular dependency");
        }

        Ok(DependencyResolution {
            root: node_key(kind, &root_name),
            graph: walk.graph,
            cycles,
            unresolved: walk.unresolved,
        })
    }

    fn visit<'w>(
        &'w self,
        query: String,
        kind: DefinitionKind,
        depth: usize,
        required_by: Option<String>,
        options: DependencyOptions,
        walk: &'w mut Walk,
    ) -> WalkFuture<'w> {
        Box::pin(async move {
            let name = ParsedName::parse(&query)?.name;
            let key = node_key(kind, &name);
            if walk.visited.contains(&key) {
                return Ok(());
            }
            if depth > options.max_depth {
                return Err(Error::DepthExceeded {
                    node: key,
                    depth,
                    max_depth: options.max_depth,
                });
            }
            walk.visited.insert(key.clone());

            let resolved = match self.resolver.resolve(&query, kind).await {
                Ok(resolved) => resolved,
                Err(e) => match required_by {
                    // the root must resolve
                    None => return Err(e),
                    Some(parent) => {
                        tracing::warn!(dependency = %query, required_by = %parent, error = %e, "skipping unresolved dependency");
                        walk.unresolved.push(UnresolvedDependency {
                            required_by: parent,
                            query,
                            code: e.kind().as_str().to_string(),
                            message: e.to_string(),
                        });
                        return Ok(());
                    }
                },
            };

            let dependencies = resolved.definition.dependencies().to_vec();
            walk.graph.add_node(DependencyNode::new(
                name,
                resolved.version.clone(),
                kind,
                dependencies.clone(),
            ));

            for dependency in dependencies {
                self.visit(
                    dependency,
                    DefinitionKind::Tool,
                    depth + 1,
                    Some(key.clone()),
                    options,
                    walk,
                )
                .await?;
            }
            Ok(())
        })
    }
}
