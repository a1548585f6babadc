//! Dependency graph primitives.
//!
//! Nodes are keyed by `"kind:name"`. The graph stores, for each node, the set
//! of *dependents* (nodes that depend on it); the forward edges are the
//! `dependencies` listed on each node that are themselves present in the
//! graph. Ordered collections keep traversal deterministic.
//!
//! # Example
//!
//! ```
//! use forge_registry::definition::DefinitionKind;
//! use forge_registry::graph::{DependencyGraph, DependencyNode};
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node(DependencyNode::new("researcher", "1.0.0", DefinitionKind::Agent, vec!["web-search".into()]));
//! graph.add_node(DependencyNode::new("web-search", "2.1.0", DefinitionKind::Tool, vec![]));
//! graph.add_dependency("agent:researcher", "tool:web-search");
//!
//! let order = graph.topological_sort().unwrap();
//! assert_eq!(order[0].name, "web-search");
//! assert_eq!(order[1].name, "researcher");
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::definition::DefinitionKind;

/// One visited definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    /// Declared dependency names, as written on the definition.
    pub dependencies: Vec<String>,
}

impl DependencyNode {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        kind: DefinitionKind,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            kind,
            dependencies,
        }
    }

    /// Graph key: `"kind:name"`.
    pub fn key(&self) -> String {
        node_key(self.kind, &self.name)
    }
}

/// Build the graph key for a definition.
pub fn node_key(kind: DefinitionKind, name: &str) -> String {
    format!("{kind}:{name}")
}

/// Directed dependency graph built fresh for one resolution.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DependencyNode>,
    /// dependency key -> keys of nodes that depend on it
    dependents: BTreeMap<String, BTreeSet<String>>,
    /// dependent key -> keys it depends on
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node.
    pub fn add_node(&mut self, node: DependencyNode) {
        let key = node.key();
        self.dependents.entry(key.clone()).or_default();
        self.dependencies.entry(key.clone()).or_default();
        self.nodes.insert(key, node);
    }

    /// Record that `dependent` depends on `dependency` (both graph keys).
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        self.dependents
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
        self.dependencies
            .entry(dependent.to_string())
            .or_default()
            .insert(dependency.to_string());
    }

    pub fn node(&self, key: &str) -> Option<&DependencyNode> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keys that `key` depends on and that are present in the graph.
    pub fn dependencies_of(&self, key: &str) -> Vec<&str> {
        self.dependencies
            .get(key)
            .into_iter()
            .flatten()
            .filter(|dep| self.nodes.contains_key(dep.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Keys of nodes that depend on `key`.
    pub fn dependents_of(&self, key: &str) -> Vec<&str> {
        self.dependents
            .get(key)
            .into_iter()
            .flatten()
            .filter(|dep| self.nodes.contains_key(dep.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Order nodes so every node follows all of its dependencies (Kahn's
    /// algorithm).
    ///
    /// Returns `None` when a cycle prevents a complete ordering.
    pub fn topological_sort(&self) -> Option<Vec<&DependencyNode>> {
        let mut remaining: BTreeMap<&str, usize> = self
            .nodes
            .keys()
            .map(|key| (key.as_str(), self.dependencies_of(key).len()))
            .collect();

        let mut queue: VecDeque<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(key, _)| *key)
            .collect();

        let mut ordered = Vec::with_capacity(self.nodes.len());
        while let Some(key) = queue.pop_front() {
            if let Some(node) = self.nodes.get(key) {
                ordered.push(node);
            }
            for dependent in self.dependents_of(key) {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        (ordered.len() == self.nodes.len()).then_some(ordered)
    }
}

/// A cycle found by [`CycleDetector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    /// Node names along the cycle; the first name is repeated at the end.
    pub nodes: Vec<String>,
    /// Arrow-joined path, e.g. `a -> b -> a`.
    pub description: String,
}

impl Cycle {
    fn new(nodes: Vec<String>) -> Self {
        let description = nodes.join(" -> ");
        Self { nodes, description }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Three-color depth-first cycle detection over a [`DependencyGraph`].
///
/// Every back edge yields one [`Cycle`].
#[derive(Debug)]
pub struct CycleDetector<'g> {
    graph: &'g DependencyGraph,
    colors: BTreeMap<&'g str, Color>,
    stack: Vec<&'g str>,
    cycles: Vec<Cycle>,
}

impl<'g> CycleDetector<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            colors: graph.nodes.keys().map(|k| (k.as_str(), Color::White)).collect(),
            stack: Vec::new(),
            cycles: Vec::new(),
        }
    }

    /// Run detection over every node.
    pub fn detect(mut self) -> Vec<Cycle> {
        let graph = self.graph;
        for key in graph.nodes.keys().map(String::as_str) {
            if self.colors.get(key) == Some(&Color::White) {
                self.visit(key);
            }
        }
        self.cycles
    }

    fn visit(&mut self, key: &'g str) {
        self.colors.insert(key, Color::Gray);
        self.stack.push(key);

        let graph = self.graph;
        for dep in graph.dependencies_of(key) {
            match self.colors.get(dep).copied() {
                Some(Color::White) => self.visit(dep),
                Some(Color::Gray) => self.record_cycle(dep),
                Some(Color::Black) | None => {}
            }
        }

        self.stack.pop();
        self.colors.insert(key, Color::Black);
    }

    fn record_cycle(&mut self, back_to: &str) {
        let Some(start) = self.stack.iter().position(|k| *k == back_to) else {
            return;
        };
        let mut names: Vec<String> = self.stack[start..]
            .iter()
            .map(|key| self.display_name(key))
            .collect();
        names.push(self.display_name(back_to));
        self.cycles.push(Cycle::new(names));
    }

    fn display_name(&self, key: &str) -> String {
        self.graph
            .node(key)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| key.to_string())
    }
}
