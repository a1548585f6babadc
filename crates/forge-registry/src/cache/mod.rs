//! Caches consulted before disk and network.
//!
//! - [`DefinitionCache`]: in-memory, process lifetime, keyed by the original
//!   query string.
//! - [`ManifestCache`]: persisted JSON per registry name.
//!
//! Both are optimizations only; a failing cache is a cache miss.

mod manifest;
mod memory;

pub use manifest::{CacheStats, ManifestCache, ManifestCacheEntry};
pub use memory::{DEFAULT_TTL, DefinitionCache};
