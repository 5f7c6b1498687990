//! On-disk cache of resolved templates
//!
//! Each entry lives in a directory named after the SHA-256 of its URL:
//!
//! ```text
//! <cache dir>/
//! └── 3f0a…c9/
//!     ├── template.yml     raw content
//!     └── metadata.json    {metadata, cachedAt, size, basePath}
//! ```
//!
//! Entries older than the TTL and entries whose content no longer matches the
//! recorded checksum are dropped on read. After every write, if the total
//! content size exceeds the configured maximum, the oldest entries are removed
//! until the cache is back under 80% of the maximum.

mod clock;
mod error;

pub use clock::{Clock, SystemClock};
pub use error::{CacheError, CacheResult};

#[cfg(test)]
pub use clock::MockClock;

use crate::config::CacheSettings;
use crate::resolver::{checksum, ResolvedTemplate, TemplateMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

const CONTENT_FILE: &str = "template.yml";
const METADATA_FILE: &str = "metadata.json";

/// Sidecar record stored next to each entry's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Provenance of the cached content
    pub metadata: TemplateMetadata,
    /// When the entry was written
    pub cached_at: DateTime<Utc>,
    /// Content length in bytes
    pub size: u64,
    /// Base path reported by the resolver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
}

/// Aggregate cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    /// Sum of all entry sizes in bytes
    pub total_size: u64,
    /// Number of readable entries
    pub entry_count: usize,
    /// Write time of the oldest entry
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Write time of the newest entry
    pub newest_entry: Option<DateTime<Utc>>,
    /// `hits / (hits + misses)` since creation or the last clear, `0.0` if no lookups
    pub hit_rate: f64,
}

/// A problem found by [`UrlCache::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheFinding {
    /// Entry directory name
    pub entry: String,
    /// URL of the entry, when its metadata could be read
    pub url: Option<String>,
    /// What is wrong
    pub message: String,
}

impl fmt::Display for CacheFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{url} ({}): {}", self.entry, self.message),
            None => write!(f, "{}: {}", self.entry, self.message),
        }
    }
}

/// Result of a cache consistency scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheValidation {
    /// Missing content, unreadable metadata and checksum mismatches
    pub errors: Vec<CacheFinding>,
    /// Expired entries
    pub warnings: Vec<CacheFinding>,
}

impl CacheValidation {
    /// Whether the scan found no errors
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

struct ScannedEntry {
    dir: PathBuf,
    record: CacheRecord,
}

/// Content-addressed template cache
pub struct UrlCache {
    dir: PathBuf,
    ttl: Duration,
    max_size: u64,
    integrity_check: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for UrlCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlCache")
            .field("dir", &self.dir)
            .field("ttl", &self.ttl)
            .field("max_size", &self.max_size)
            .field("integrity_check", &self.integrity_check)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl UrlCache {
    /// Create a cache from settings; the directory is created lazily on first write
    #[must_use]
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            dir: settings.dir.clone(),
            ttl: settings.ttl(),
            max_size: settings.max_size,
            integrity_check: settings.integrity_check,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// A fresh cache for `settings` sharing this cache's clock
    ///
    /// Hit/miss counters start from zero.
    #[must_use]
    pub fn reconfigured(&self, settings: &CacheSettings) -> Self {
        Self::new(settings).with_clock(Arc::clone(&self.clock))
    }

    /// Cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding the entry for `url`
    #[must_use]
    pub fn entry_dir(&self, url: &str) -> PathBuf {
        self.dir.join(checksum(url.as_bytes()))
    }

    /// Look up a cached template
    ///
    /// Returns `None` when there is no entry, when the entry cannot be read,
    /// when it is older than the TTL, or when integrity checking is enabled and
    /// its content no longer matches the stored checksum. Stale and corrupt
    /// entries are deleted.
    pub async fn get(&self, url: &str) -> Option<ResolvedTemplate> {
        let found = self.lookup(url).await;
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    async fn lookup(&self, url: &str) -> Option<ResolvedTemplate> {
        let dir = self.entry_dir(url);
        let Some(record) = read_record(&dir).await else {
            debug!(url, "cache miss");
            return None;
        };

        if self.is_expired(&record) {
            debug!(url, cached_at = %record.cached_at, "cache entry expired");
            self.discard(&dir).await;
            return None;
        }

        let content = match fs::read_to_string(dir.join(CONTENT_FILE)).await {
            Ok(content) => content,
            Err(e) => {
                warn!(url, error = %e, "cache entry content unreadable");
                return None;
            }
        };

        if self.integrity_check && checksum(content.as_bytes()) != record.metadata.checksum {
            warn!(url, "cache entry failed integrity check, discarding");
            self.discard(&dir).await;
            return None;
        }

        debug!(url, size = record.size, "cache hit");
        Some(ResolvedTemplate {
            content,
            base_path: record.base_path.unwrap_or(dir),
            metadata: record.metadata,
        })
    }

    /// Store a resolved template, then evict old entries if over the size limit
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written. Eviction failures are
    /// logged and do not fail the write.
    pub async fn set(&self, url: &str, resolved: &ResolvedTemplate) -> CacheResult<()> {
        let dir = self.entry_dir(url);
        fs::create_dir_all(&dir).await.map_err(CacheError::io(&dir))?;

        let content_path = dir.join(CONTENT_FILE);
        fs::write(&content_path, &resolved.content)
            .await
            .map_err(CacheError::io(&content_path))?;

        let record = CacheRecord {
            metadata: resolved.metadata.clone(),
            cached_at: self.clock.now(),
            size: resolved.content.len() as u64,
            base_path: Some(resolved.base_path.clone()),
        };
        let metadata_path = dir.join(METADATA_FILE);
        fs::write(&metadata_path, serde_json::to_string_pretty(&record)?)
            .await
            .map_err(CacheError::io(&metadata_path))?;
        debug!(url, size = record.size, "cached template");

        if let Err(e) = self.evict().await {
            warn!(error = %e, "cache eviction failed");
        }
        Ok(())
    }

    /// Remove the entry for `url`, returning whether one existed
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but cannot be removed.
    pub async fn delete(&self, url: &str) -> CacheResult<bool> {
        let dir = self.entry_dir(url);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&dir)(e)),
        }
    }

    /// Remove every entry and reset hit/miss counters
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be read or an entry
    /// cannot be removed.
    pub async fn clear(&self) -> CacheResult<()> {
        for entry in self.entry_dirs().await? {
            fs::remove_dir_all(&entry).await.map_err(CacheError::io(&entry))?;
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!(dir = %self.dir.display(), "cache cleared");
        Ok(())
    }

    /// Aggregate statistics over all readable entries
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory exists but cannot be read.
    pub async fn get_info(&self) -> CacheResult<CacheInfo> {
        let entries = self.scan().await?;
        let hits = self.hits.load(Ordering::Relaxed);
        let lookups = hits + self.misses.load(Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 };

        Ok(CacheInfo {
            total_size: entries.iter().map(|e| e.record.size).sum(),
            entry_count: entries.len(),
            oldest_entry: entries.iter().map(|e| e.record.cached_at).min(),
            newest_entry: entries.iter().map(|e| e.record.cached_at).max(),
            hit_rate,
        })
    }

    /// Check every entry without modifying the cache
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory exists but cannot be read.
    pub async fn validate(&self) -> CacheResult<CacheValidation> {
        let mut report = CacheValidation::default();

        for dir in self.entry_dirs().await? {
            let entry = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let finding = |url: Option<&str>, message: &str| CacheFinding {
                entry: entry.clone(),
                url: url.map(str::to_string),
                message: message.to_string(),
            };

            let Some(record) = read_record(&dir).await else {
                report.errors.push(finding(None, "metadata missing or unreadable"));
                continue;
            };
            let url = Some(record.metadata.url.as_str());

            match fs::read(dir.join(CONTENT_FILE)).await {
                Err(_) => report.errors.push(finding(url, "content file missing")),
                Ok(content) if checksum(&content) != record.metadata.checksum => {
                    report.errors.push(finding(url, "checksum mismatch"));
                }
                Ok(_) => {}
            }

            if self.is_expired(&record) {
                report.warnings.push(finding(url, "entry has expired"));
            }
        }

        Ok(report)
    }

    fn is_expired(&self, record: &CacheRecord) -> bool {
        self.clock
            .now()
            .signed_duration_since(record.cached_at)
            .to_std()
            .is_ok_and(|age| age > self.ttl)
    }

    async fn discard(&self, dir: &Path) {
        if let Err(e) = fs::remove_dir_all(dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %dir.display(), error = %e, "failed to remove cache entry");
            }
        }
    }

    async fn evict(&self) -> CacheResult<()> {
        let mut entries = self.scan().await?;
        let mut total: u64 = entries.iter().map(|e| e.record.size).sum();
        if total <= self.max_size {
            return Ok(());
        }

        let target = self.max_size - self.max_size / 5;
        entries.sort_by_key(|e| e.record.cached_at);

        let mut evicted = 0usize;
        for entry in entries {
            if total <= target {
                break;
            }
            fs::remove_dir_all(&entry.dir)
                .await
                .map_err(CacheError::io(&entry.dir))?;
            total -= entry.record.size;
            evicted += 1;
        }

        info!(evicted, total_size = total, max_size = self.max_size, "evicted cache entries");
        Ok(())
    }

    async fn entry_dirs(&self) -> CacheResult<Vec<PathBuf>> {
        let mut reader = match fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.dir)(e)),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(CacheError::io(&self.dir))? {
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    async fn scan(&self) -> CacheResult<Vec<ScannedEntry>> {
        let mut entries = Vec::new();
        for dir in self.entry_dirs().await? {
            match read_record(&dir).await {
                Some(record) => entries.push(ScannedEntry { dir, record }),
                None => debug!(path = %dir.display(), "skipping unreadable cache entry"),
            }
        }
        Ok(entries)
    }
}

async fn read_record(dir: &Path) -> Option<CacheRecord> {
    let raw = fs::read_to_string(dir.join(METADATA_FILE)).await.ok()?;
    match serde_json::from_str(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cache metadata unreadable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::UrlType;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Harness {
        cache: UrlCache,
        now: Arc<Mutex<DateTime<Utc>>>,
        _dir: TempDir,
    }

    impl Harness {
        fn new(max_size: u64, integrity_check: bool) -> Self {
            let dir = TempDir::new().unwrap();
            let now = Arc::new(Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));

            let shared = Arc::clone(&now);
            let mut clock = MockClock::new();
            clock.expect_now().returning(move || *shared.lock().unwrap());

            let settings = CacheSettings {
                dir: dir.path().join("cache"),
                ttl_ms: 60_000,
                max_size,
                integrity_check,
            };
            Self {
                cache: UrlCache::new(&settings).with_clock(Arc::new(clock)),
                now,
                _dir: dir,
            }
        }

        fn advance(&self, seconds: i64) {
            *self.now.lock().unwrap() += chrono::Duration::seconds(seconds);
        }
    }

    fn template(url: &str, content: &str) -> ResolvedTemplate {
        ResolvedTemplate::new(
            content.to_string(),
            PathBuf::from("/srv/templates"),
            url,
            UrlType::Local,
            None,
            None,
        )
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let h = Harness::new(1024, true);
        let resolved = template("./form", "name: form\n");

        h.cache.set("./form", &resolved).await.unwrap();
        let hit = h.cache.get("./form").await.unwrap();

        assert_eq!(hit, resolved);
        assert!(h.cache.entry_dir("./form").join(CONTENT_FILE).exists());
        assert!(h.cache.get("./other").await.is_none());
        assert!((h.cache.get_info().await.unwrap().hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_metadata_layout() {
        let h = Harness::new(1024, true);
        h.cache.set("github:a/b", &template("github:a/b", "abc")).await.unwrap();

        let dir = h.cache.entry_dir("github:a/b");
        assert_eq!(dir.file_name().unwrap().to_str().unwrap(), checksum(b"github:a/b"));

        let raw = std::fs::read_to_string(dir.join(METADATA_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["size"], 3);
        assert_eq!(json["metadata"]["url"], "github:a/b");
        assert_eq!(json["cachedAt"], "2026-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed() {
        let h = Harness::new(1024, true);
        h.cache.set("./form", &template("./form", "x")).await.unwrap();

        h.advance(60);
        assert!(h.cache.get("./form").await.is_some());

        h.advance(1);
        assert!(h.cache.get("./form").await.is_none());
        assert!(!h.cache.entry_dir("./form").exists());
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_removed() {
        let h = Harness::new(1024, true);
        h.cache.set("./form", &template("./form", "original")).await.unwrap();
        std::fs::write(h.cache.entry_dir("./form").join(CONTENT_FILE), "tampered").unwrap();

        assert!(h.cache.get("./form").await.is_none());
        assert!(!h.cache.entry_dir("./form").exists());
    }

    #[tokio::test]
    async fn test_corruption_is_ignored_without_integrity_check() {
        let h = Harness::new(1024, false);
        h.cache.set("./form", &template("./form", "original")).await.unwrap();
        std::fs::write(h.cache.entry_dir("./form").join(CONTENT_FILE), "tampered").unwrap();

        assert_eq!(h.cache.get("./form").await.unwrap().content, "tampered");
    }

    #[tokio::test]
    async fn test_unreadable_metadata_is_a_miss() {
        let h = Harness::new(1024, true);
        h.cache.set("./form", &template("./form", "x")).await.unwrap();
        std::fs::write(h.cache.entry_dir("./form").join(METADATA_FILE), "{not json").unwrap();

        assert!(h.cache.get("./form").await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_removes_oldest_first() {
        let h = Harness::new(100, true);
        for url in ["one", "two", "three"] {
            h.cache.set(url, &template(url, &"x".repeat(40))).await.unwrap();
            h.advance(1);
        }

        let info = h.cache.get_info().await.unwrap();
        assert!(info.total_size <= 100);
        assert_eq!(info.total_size, 80);
        assert!(h.cache.get("one").await.is_none());
        assert!(h.cache.get("two").await.is_some());
        assert!(h.cache.get("three").await.is_some());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let h = Harness::new(1024, true);
        h.cache.set("a", &template("a", "1")).await.unwrap();
        h.cache.set("b", &template("b", "2")).await.unwrap();
        let _ = h.cache.get("a").await;

        assert!(h.cache.delete("a").await.unwrap());
        assert!(!h.cache.delete("a").await.unwrap());

        h.cache.clear().await.unwrap();
        let info = h.cache.get_info().await.unwrap();
        assert_eq!(info.entry_count, 0);
        assert!(info.hit_rate.abs() < f64::EPSILON);
        assert!(info.oldest_entry.is_none());
    }

    #[tokio::test]
    async fn test_info_on_missing_directory() {
        let h = Harness::new(1024, true);
        let info = h.cache.get_info().await.unwrap();
        assert_eq!(info.entry_count, 0);
        assert_eq!(info.total_size, 0);
    }

    #[tokio::test]
    async fn test_info_reports_oldest_and_newest() {
        let h = Harness::new(1024, true);
        h.cache.set("a", &template("a", "12")).await.unwrap();
        h.advance(10);
        h.cache.set("b", &template("b", "345")).await.unwrap();

        let info = h.cache.get_info().await.unwrap();
        assert_eq!(info.entry_count, 2);
        assert_eq!(info.total_size, 5);
        assert_eq!(info.newest_entry.unwrap() - info.oldest_entry.unwrap(), chrono::Duration::seconds(10));
    }

    #[tokio::test]
    async fn test_validate_reports_without_mutating() {
        let h = Harness::new(1024, true);
        h.cache.set("ok", &template("ok", "fine")).await.unwrap();
        h.cache.set("corrupt", &template("corrupt", "original")).await.unwrap();
        h.cache.set("empty", &template("empty", "gone")).await.unwrap();
        std::fs::write(h.cache.entry_dir("corrupt").join(CONTENT_FILE), "tampered").unwrap();
        std::fs::remove_file(h.cache.entry_dir("empty").join(CONTENT_FILE)).unwrap();

        let report = h.cache.validate().await.unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 2);
        assert!(report.warnings.is_empty());
        assert!(report.errors.iter().any(|f| f.url.as_deref() == Some("corrupt") && f.message == "checksum mismatch"));
        assert!(h.cache.entry_dir("corrupt").exists());

        h.advance(120);
        let report = h.cache.validate().await.unwrap();
        assert_eq!(report.warnings.len(), 3);
        assert!(h.cache.entry_dir("ok").exists());
    }
}
