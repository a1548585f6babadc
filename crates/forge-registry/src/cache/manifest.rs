use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use forge_fs::DocumentStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted registry manifest with its fetch metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCacheEntry {
    pub url: String,
    pub manifest: Value,
    /// Milliseconds since the Unix epoch.
    pub fetched_at: i64,
    /// Lifetime in seconds.
    pub ttl: u64,
}

impl ManifestCacheEntry {
    pub fn new(url: impl Into<String>, manifest: Value, ttl: Duration) -> Self {
        Self {
            url: url.into(),
            manifest,
            fetched_at: Utc::now().timestamp_millis(),
            ttl: ttl.as_secs(),
        }
    }

    /// Fresh while `now - fetched_at < ttl * 1000`.
    pub fn is_fresh_at(&self, now_millis: i64) -> bool {
        let ttl_millis = i64::try_from(self.ttl.saturating_mul(1000)).unwrap_or(i64::MAX);
        now_millis.saturating_sub(self.fetched_at) < ttl_millis
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now().timestamp_millis())
    }
}

/// Counts reported by [`ManifestCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub expired: usize,
    /// Combined size of the cache files on disk.
    pub bytes: u64,
}

/// On-disk cache of registry manifests, one JSON file per registry name.
///
/// Read and write failures are logged at debug level and behave as a miss.
#[derive(Debug, Clone)]
pub struct ManifestCache {
    dir: PathBuf,
    store: DocumentStore,
}

impl ManifestCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            store: DocumentStore::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, registry: &str) -> PathBuf {
        let file_name: String = registry
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }

    fn read_entry(&self, path: &Path) -> Option<ManifestCacheEntry> {
        match self.store.load_optional::<ManifestCacheEntry>(path) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "unreadable manifest cache entry");
                None
            }
        }
    }

    /// Return the cached manifest for `registry` if it is still fresh.
    pub fn get(&self, registry: &str) -> Option<ManifestCacheEntry> {
        let entry = self.read_entry(&self.entry_path(registry))?;
        if entry.is_fresh() {
            Some(entry)
        } else {
            tracing::debug!(registry, "manifest cache entry expired");
            None
        }
    }

    /// Persist a freshly fetched manifest.
    pub fn set(&self, registry: &str, url: &str, manifest: Value, ttl: Duration) {
        let path = self.entry_path(registry);
        let entry = ManifestCacheEntry::new(url, manifest, ttl);
        if let Err(e) = self.store.save(&path, &entry) {
            tracing::debug!(registry, error = %e, "failed to write manifest cache entry");
        }
    }

    pub fn invalidate(&self, registry: &str) {
        if let Err(e) = forge_fs::io::remove_if_exists(&self.entry_path(registry)) {
            tracing::debug!(registry, error = %e, "failed to remove manifest cache entry");
        }
    }

    pub fn invalidate_all(&self) {
        for path in self.entry_files() {
            if let Err(e) = forge_fs::io::remove_if_exists(&path) {
                tracing::debug!(path = %path.display(), error = %e, "failed to remove manifest cache entry");
            }
        }
    }

    /// Remove expired and unreadable entries, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now().timestamp_millis();
        let mut removed = 0;

        for path in self.entry_files() {
            let stale = self
                .read_entry(&path)
                .is_none_or(|entry| !entry.is_fresh_at(now));
            if stale && matches!(forge_fs::io::remove_if_exists(&path), Ok(true)) {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "pruned manifest cache");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = Utc::now().timestamp_millis();
        let mut stats = CacheStats::default();

        for path in self.entry_files() {
            stats.total += 1;
            stats.bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            match self.read_entry(&path) {
                Some(entry) if entry.is_fresh_at(now) => stats.fresh += 1,
                _ => stats.expired += 1,
            }
        }

        stats
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn freshness_boundary() {
        let entry = ManifestCacheEntry {
            url: "https://r.example/manifest.json".into(),
            manifest: json!({}),
            fetched_at: 1_000,
            ttl: 2,
        };
        assert!(entry.is_fresh_at(2_999));
        assert!(!entry.is_fresh_at(3_000));
    }

    #[test]
    fn set_get_invalidate() {
        let temp = TempDir::new().unwrap();
        let cache = ManifestCache::new(temp.path().join("manifests"));

        assert!(cache.get("fractary").is_none());
        cache.set(
            "fractary",
            "https://r.example/manifest.json",
            json!({"name": "fractary", "plugins": []}),
            Duration::from_secs(3600),
        );

        let entry = cache.get("fractary").unwrap();
        assert_eq!(entry.manifest["name"], "fractary");
        assert_eq!(entry.ttl, 3600);

        cache.invalidate("fractary");
        assert!(cache.get("fractary").is_none());
    }

    #[test]
    fn cleanup_and_stats() {
        let temp = TempDir::new().unwrap();
        let cache = ManifestCache::new(temp.path());

        cache.set("fresh", "u1", json!({}), Duration::from_secs(3600));
        cache.set("stale", "u2", json!({}), Duration::ZERO);
        fs::write(temp.path().join("garbage.json"), "{ not json").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.fresh, 1);
        assert_eq!(stats.expired, 2);
        assert!(stats.bytes > 0);

        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.stats().total, 1);

        cache.invalidate_all();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn unreadable_entry_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let cache = ManifestCache::new(temp.path());
        fs::write(temp.path().join("broken.json"), "nope").unwrap();
        assert!(cache.get("broken").is_none());
    }
}
