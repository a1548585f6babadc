use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::definition::{DefinitionKind, ResolvedDefinition};

/// Default lifetime of an in-memory entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    value: ResolvedDefinition,
    inserted: Instant,
}

/// In-memory TTL cache of resolved definitions, one map per kind.
///
/// Concurrent population of the same key is last-writer-wins.
#[derive(Debug)]
pub struct DefinitionCache {
    ttl: Duration,
    agents: RwLock<HashMap<String, Entry>>,
    tools: RwLock<HashMap<String, Entry>>,
}

impl Default for DefinitionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl DefinitionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            agents: RwLock::new(HashMap::new()),
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn map(&self, kind: DefinitionKind) -> &RwLock<HashMap<String, Entry>> {
        match kind {
            DefinitionKind::Agent => &self.agents,
            DefinitionKind::Tool => &self.tools,
        }
    }

    /// Look up a query. Expired entries are dropped and reported as a miss.
    pub fn get(&self, kind: DefinitionKind, key: &str) -> Option<ResolvedDefinition> {
        {
            let Ok(map) = self.map(kind).read() else {
                tracing::debug!(key, "definition cache lock poisoned, treating as miss");
                return None;
            };
            match map.get(key) {
                None => return None,
                Some(entry) if entry.inserted.elapsed() < self.ttl => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        self.invalidate(kind, key);
        None
    }

    /// Store a resolution result under the query it answered.
    pub fn insert(&self, kind: DefinitionKind, key: &str, value: ResolvedDefinition) {
        match self.map(kind).write() {
            Ok(mut map) => {
                map.insert(
                    key.to_string(),
                    Entry {
                        name: value.name().to_string(),
                        value,
                        inserted: Instant::now(),
                    },
                );
            }
            Err(_) => tracing::debug!(key, "definition cache lock poisoned, skipping insert"),
        }
    }

    /// Drop a single query.
    pub fn invalidate(&self, kind: DefinitionKind, key: &str) {
        if let Ok(mut map) = self.map(kind).write() {
            map.remove(key);
        }
    }

    /// Drop every query that resolved to `name`, whatever range it used.
    pub fn invalidate_name(&self, kind: DefinitionKind, name: &str) {
        if let Ok(mut map) = self.map(kind).write() {
            map.retain(|key, entry| entry.name != name && key != name);
        }
    }

    pub fn invalidate_all(&self) {
        for kind in DefinitionKind::ALL {
            if let Ok(mut map) = self.map(kind).write() {
                map.clear();
            }
        }
    }

    /// Number of entries currently held (fresh or not) for a kind.
    pub fn len(&self, kind: DefinitionKind) -> usize {
        self.map(kind).read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        DefinitionKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }
}
