//! Field-level merge of a child definition over its base.
//!
//! The child wins on every scalar or whole-object field it sets. A few fields
//! merge instead of replacing:
//!
//! | field                 | rule                              |
//! |-----------------------|-----------------------------------|
//! | `tags`                | union, de-duplicated              |
//! | `tools` (agent)       | union, de-duplicated              |
//! | `depends_on` (tool)   | union, de-duplicated              |
//! | `custom_tools` (agent)| by `name`, child entry replaces   |
//! | `config` (agent)      | shallow, child key wins           |
//! | `parameters` (tool)   | shallow, child key wins           |
//!
//! `extends` is always cleared on the result.

use std::collections::HashSet;
use std::hash::Hash;

use crate::definition::{AgentDefinition, Definition, FieldMap, ToolDefinition};

/// Merge `child` over an already-flattened `base`.
///
/// Definitions of different kinds never merge; the child is returned with
/// `extends` cleared.
pub fn merge_definitions(base: Definition, child: Definition) -> Definition {
    match (base, child) {
        (Definition::Agent(base), Definition::Agent(child)) => {
            Definition::Agent(merge_agents(base, child))
        }
        (Definition::Tool(base), Definition::Tool(child)) => {
            Definition::Tool(merge_tools(base, child))
        }
        (_, mut child) => {
            clear_extends(&mut child);
            child
        }
    }
}

fn clear_extends(definition: &mut Definition) {
    match definition {
        Definition::Agent(a) => a.extends = None,
        Definition::Tool(t) => t.extends = None,
    }
}

fn merge_agents(base: AgentDefinition, child: AgentDefinition) -> AgentDefinition {
    AgentDefinition {
        name: child.name,
        version: child.version,
        description: child.description,
        author: child.author.or(base.author),
        tags: union_dedup(base.tags, child.tags),
        extends: None,
        llm: child.llm.or(base.llm),
        system_prompt: child.system_prompt.or(base.system_prompt),
        tools: union_dedup(base.tools, child.tools),
        custom_tools: merge_by_key(base.custom_tools, child.custom_tools, |t| t.name.clone()),
        config: shallow_merge(base.config, child.config),
        // fork provenance is never inherited
        fork_of: child.fork_of,
        extra: shallow_merge(base.extra, child.extra),
    }
}

fn merge_tools(base: ToolDefinition, child: ToolDefinition) -> ToolDefinition {
    ToolDefinition {
        name: child.name,
        version: child.version,
        description: child.description,
        author: child.author.or(base.author),
        tags: union_dedup(base.tags, child.tags),
        extends: None,
        parameters: shallow_merge(base.parameters, child.parameters),
        implementation: child.implementation.or(base.implementation),
        depends_on: union_dedup(base.depends_on, child.depends_on),
        fork_of: child.fork_of,
        extra: shallow_merge(base.extra, child.extra),
    }
}

/// Overlay top-level keys of `overlay` onto `base`; nested values are replaced whole.
pub fn shallow_merge(mut base: FieldMap, overlay: FieldMap) -> FieldMap {
    for (key, value) in overlay {
        base.insert(key, value);
    }
    base
}

/// Base items then new child items, without duplicates.
pub fn union_dedup<T>(base: Vec<T>, child: Vec<T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    base.into_iter()
        .chain(child)
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Merge two lists keyed by `key`: a child item replaces the base item with
/// the same key in place, other child items are appended.
pub fn merge_by_key<T, K, F>(base: Vec<T>, child: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut merged = base;
    for item in child {
        let item_key = key(&item);
        match merged.iter().position(|existing| key(existing) == item_key) {
            Some(idx) => merged[idx] = item,
            None => merged.push(item),
        }
    }
    merged
}
