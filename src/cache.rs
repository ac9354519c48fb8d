//! Content-addressed render cache.
//!
//! Markdown rendering is a pure function of (source text, extension toggles),
//! so its output can be reused across builds. The Render stage asks an
//! optional [`ContentCache`] before converting a document and stores the
//! result after.
//!
//! A cache is an opaque get/put store. Its absence, a miss, or a corrupt
//! cache file never changes what a build produces, only how fast.
//!
//! ## Cache keys
//!
//! Keys are SHA-256 digests over a namespace, the content, and a fingerprint
//! of every setting that influences the output (see [`cache_key`]). Renaming
//! or moving a file does not invalidate its entry; editing it or flipping a
//! Markdown toggle does.
//!
//! ## Storage
//!
//! [`FileCache`] keeps a versioned JSON manifest at `<dir>/cache.json`
//! (`.galley-cache/` by default). Entries not used during a build are
//! dropped when the manifest is flushed, so the file tracks the current
//! content set. [`MemoryCache`] keeps everything in process, for tests and
//! embedders.
//!
//! ## Bypassing the cache
//!
//! `galley build --no-cache` runs without any cache at all.

use crate::config::MarkdownConfig;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Name of the manifest inside the cache directory.
const MANIFEST_FILENAME: &str = "cache.json";

/// Bump to invalidate every existing cache when the format or key
/// computation changes.
const MANIFEST_VERSION: u32 = 1;

/// Key/value store consulted during Render.
pub trait ContentCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String);

    /// Persist pending writes. No-op for in-memory stores.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn stats(&self) -> CacheStats;
}

/// Hit/miss counters shared by both cache implementations.
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU32,
    misses: AtomicU32,
}

impl Counters {
    fn record<T>(&self, found: Option<T>) -> Option<T> {
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
    counters: Counters,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ContentCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let found = self.entries.read().get(key).cloned();
        self.counters.record(found)
    }

    fn put(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

/// On-disk manifest format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheManifest {
    version: u32,
    entries: BTreeMap<String, String>,
}

impl CacheManifest {
    fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Empty if the file is missing, unreadable, corrupt or from another version.
    fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::empty();
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(manifest) if manifest.version == MANIFEST_VERSION => manifest,
            Ok(_) | Err(_) => {
                tracing::debug!(path = %path.display(), "discarding unusable cache manifest");
                Self::empty()
            }
        }
    }
}

/// Cache persisted as a JSON manifest between builds.
#[derive(Debug)]
pub struct FileCache {
    dir: PathBuf,
    manifest: RwLock<CacheManifest>,
    used: Mutex<HashSet<String>>,
    dirty: AtomicBool,
    counters: Counters,
}

impl FileCache {
    /// Open the cache stored in `dir`. Never fails; an unusable manifest
    /// starts the cache empty.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let manifest = CacheManifest::load(&dir.join(MANIFEST_FILENAME));
        Self {
            dir,
            manifest: RwLock::new(manifest),
            used: Mutex::new(HashSet::new()),
            dirty: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILENAME)
    }

    pub fn len(&self) -> usize {
        self.manifest.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let found = self.manifest.read().entries.get(key).cloned();
        if found.is_some() {
            self.used.lock().insert(key.to_string());
        }
        self.counters.record(found)
    }

    fn put(&self, key: &str, value: String) {
        self.used.lock().insert(key.to_string());
        self.manifest.write().entries.insert(key.to_string(), value);
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Write the manifest, dropping entries this build never touched.
    fn flush(&self) -> io::Result<()> {
        let mut manifest = self.manifest.write();
        let used = self.used.lock();
        let before = manifest.entries.len();
        manifest.entries.retain(|key, _| used.contains(key));
        let pruned = before != manifest.entries.len();

        if !pruned && !self.dirty.load(Ordering::Relaxed) {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string(&*manifest)?;
        std::fs::write(self.dir.join(MANIFEST_FILENAME), json)?;
        self.dirty.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

/// SHA-256 over `namespace` and each part, NUL-separated, as hex.
pub fn cache_key(namespace: &str, parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    for part in parts {
        hasher.update(b"\0");
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

/// Stable fingerprint of the Markdown toggles, for use in [`cache_key`].
pub fn markdown_fingerprint(config: &MarkdownConfig) -> [u8; 6] {
    [
        config.tables,
        config.footnotes,
        config.strikethrough,
        config.tasklists,
        config.smart_punctuation,
        config.heading_attributes,
    ]
    .map(u8::from)
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} rendered ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} rendered", self.misses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // Keys
    // =========================================================================

    #[test]
    fn cache_key_is_stable_hex() {
        let a = cache_key("markdown", &[b"hello".as_slice()]);
        assert_eq!(a, cache_key("markdown", &[b"hello".as_slice()]));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cache_key_separates_parts() {
        assert_ne!(
            cache_key("n", &[b"ab".as_slice(), b"c".as_slice()]),
            cache_key("n", &[b"a".as_slice(), b"bc".as_slice()])
        );
        assert_ne!(
            cache_key("a", &[b"x".as_slice()]),
            cache_key("b", &[b"x".as_slice()])
        );
    }

    #[test]
    fn fingerprint_tracks_toggles() {
        let default = markdown_fingerprint(&MarkdownConfig::default());
        let changed = markdown_fingerprint(&MarkdownConfig {
            smart_punctuation: true,
            ..MarkdownConfig::default()
        });
        assert_ne!(default, changed);
    }

    // =========================================================================
    // MemoryCache
    // =========================================================================

    #[test]
    fn memory_cache_round_trip_and_stats() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k"), None);
        cache.put("k", "v".into());
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
        assert_eq!(cache.len(), 1);
    }

    // =========================================================================
    // FileCache
    // =========================================================================

    #[test]
    fn file_cache_persists_across_opens() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path());
        cache.put("k", "<p>hi</p>".into());
        cache.flush().unwrap();

        let reopened = FileCache::open(tmp.path());
        assert_eq!(reopened.get("k").as_deref(), Some("<p>hi</p>"));
    }

    #[test]
    fn missing_dir_is_created_on_flush() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested/cache");
        let cache = FileCache::open(&dir);
        cache.put("k", "v".into());
        cache.flush().unwrap();
        assert!(dir.join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn corrupt_manifest_starts_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILENAME), "{not json").unwrap();
        assert!(FileCache::open(tmp.path()).is_empty());
    }

    #[test]
    fn version_mismatch_starts_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST_FILENAME),
            r#"{"version":999,"entries":{"k":"v"}}"#,
        )
        .unwrap();
        assert!(FileCache::open(tmp.path()).is_empty());
    }

    #[test]
    fn flush_prunes_untouched_entries() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path());
        cache.put("old", "1".into());
        cache.put("kept", "2".into());
        cache.flush().unwrap();

        let second = FileCache::open(tmp.path());
        assert!(second.get("kept").is_some());
        second.flush().unwrap();

        let third = FileCache::open(tmp.path());
        assert_eq!(third.len(), 1);
        assert!(third.get("old").is_none());
    }

    #[test]
    fn flush_without_changes_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path());
        cache.flush().unwrap();
        assert!(!cache.manifest_path().exists());
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn stats_display() {
        assert_eq!(CacheStats { hits: 0, misses: 3 }.to_string(), "3 rendered");
        assert_eq!(
            CacheStats { hits: 2, misses: 1 }.to_string(),
            "2 cached, 1 rendered (3 total)"
        );
    }
}
