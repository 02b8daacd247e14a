use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::data::{AnalysisResult, ResultEntry, SCHEMA_VERSION};
use super::fingerprint::Fingerprint;
use crate::error::StoreError;

/// Flush to disk after this many insertions
const FLUSH_EVERY: usize = 10;

const CACHE_FILE_NAME: &str = "ai_analysis_cache.json";

/// Read-only snapshot of the store for the cache info panel
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub entry_count: usize,
    pub backing_path: PathBuf,
    pub backing_present: bool,
}

struct StoreInner {
    entries: HashMap<String, ResultEntry>,
    inserts_since_flush: usize,
    dirty: bool,
}

/// The ResultStore caches analysis results keyed by content fingerprint.
///
/// The in-memory map is the source of truth for the session. It is written
/// to a JSON file every `FLUSH_EVERY` insertions, on `clear`, after an
/// eviction that removed something, and at shutdown. Up to `FLUSH_EVERY - 1`
/// entries can be lost on a crash; re-analysis recovers them.
///
/// Every access goes through one mutex: completions from analysis workers
/// write while the UI path reads, and a flush serializes under the same lock
/// so the file always reflects a consistent snapshot.
pub struct ResultStore {
    backing_path: PathBuf,
    inner: Mutex<StoreInner>,
}

impl ResultStore {
    /// Open the store backed by `backing_path`, loading any previous session.
    ///
    /// A missing or corrupt file yields an empty store; corruption is logged
    /// and recovered by re-analysis, never surfaced.
    pub fn open(backing_path: impl Into<PathBuf>) -> Self {
        let backing_path = backing_path.into();
        let entries = load_entries(&backing_path);

        ResultStore {
            backing_path,
            inner: Mutex::new(StoreInner {
                entries,
                inserts_since_flush: 0,
                dirty: false,
            }),
        }
    }

    /// Default location of the cache file:
    /// - Linux: ~/.cache/photo-lens/ai_analysis_cache.json
    /// - macOS: ~/Library/Caches/photo-lens/ai_analysis_cache.json
    /// - Windows: %LOCALAPPDATA%\photo-lens\ai_analysis_cache.json
    pub fn default_location() -> Option<PathBuf> {
        let mut path = dirs::cache_dir().or_else(dirs::home_dir)?;
        path.push("photo-lens");
        path.push(CACHE_FILE_NAME);
        Some(path)
    }

    /// Get the path to the backing file
    pub fn path(&self) -> &Path {
        &self.backing_path
    }

    /// Look up the stored result for the current content of `path`
    pub fn lookup(&self, path: &Path) -> Option<AnalysisResult> {
        let fingerprint = match Fingerprint::compute(path) {
            Ok(fp) => fp,
            Err(e) => {
                tracing::debug!("No cache key for {}: {}", path.display(), e);
                return None;
            }
        };

        let inner = self.lock();
        let entry = inner.entries.get(fingerprint.as_str())?;
        tracing::info!("Cache hit: {}", entry.source_file_name);
        Some(entry.result.clone())
    }

    /// Insert or overwrite the result for the current content of `path`.
    ///
    /// The whole entry is replaced; fields are never merged. Only the
    /// fingerprint can fail here, a failed periodic flush is logged instead.
    pub fn put(&self, path: &Path, result: AnalysisResult) -> Result<(), StoreError> {
        let fingerprint = Fingerprint::compute(path).map_err(StoreError::Fingerprint)?;
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let entry = ResultEntry {
            fingerprint: fingerprint.to_string(),
            source_path: path.to_string_lossy().to_string(),
            source_file_name: file_name,
            result,
            created_at: Utc::now().to_rfc3339(),
            schema_version: SCHEMA_VERSION.to_string(),
        };

        let mut inner = self.lock();
        tracing::info!("Cached result for {}", entry.source_file_name);
        inner.entries.insert(fingerprint.to_string(), entry);
        inner.inserts_since_flush += 1;
        inner.dirty = true;

        if inner.inserts_since_flush >= FLUSH_EVERY {
            if let Err(e) = self.write_locked(&mut inner) {
                tracing::warn!("Periodic cache flush failed: {}", e);
            }
        }

        Ok(())
    }

    /// Drop every entry in memory and delete the backing file
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.inserts_since_flush = 0;
        inner.dirty = false;

        match fs::remove_file(&self.backing_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.backing_path.clone(),
                    source,
                })
            }
        }

        tracing::info!("🧹 Analysis cache cleared");
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.lock();
        StoreStats {
            entry_count: inner.entries.len(),
            backing_path: self.backing_path.clone(),
            backing_present: self.backing_path.exists(),
        }
    }

    /// Remove entries created more than `days` days ago.
    ///
    /// Entries with an unparsable timestamp count as expired. Flushes
    /// immediately when anything was removed. Returns the number removed.
    pub fn evict_older_than(&self, days: u32) -> usize {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days));
        let mut inner = self.lock();

        let before = inner.entries.len();
        inner.entries.retain(|_, entry| {
            DateTime::parse_from_rfc3339(&entry.created_at)
                .map(|created| created.with_timezone(&Utc) >= cutoff)
                .unwrap_or(false)
        });
        let removed = before - inner.entries.len();

        if removed > 0 {
            tracing::info!("Evicted {} cache entries older than {} days", removed, days);
            inner.dirty = true;
            if let Err(e) = self.write_locked(&mut inner) {
                tracing::warn!("Cache flush after eviction failed: {}", e);
            }
        }

        removed
    }

    /// Write pending changes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.dirty {
            return Ok(());
        }
        self.write_locked(&mut inner)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A poisoned lock only means a panic elsewhere mid-insert; the map
        // itself is still a valid HashMap.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serialize and atomically replace the backing file. Caller holds the lock.
    fn write_locked(&self, inner: &mut StoreInner) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&inner.entries)?;

        if let Some(parent) = self.backing_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp_path = self.backing_path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)
            .and_then(|()| fs::rename(&tmp_path, &self.backing_path))
            .map_err(|source| StoreError::Io {
                path: self.backing_path.clone(),
                source,
            })?;

        inner.inserts_since_flush = 0;
        inner.dirty = false;
        tracing::info!("💾 Cache saved: {} entries", inner.entries.len());
        Ok(())
    }
}

impl Drop for ResultStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!("Final cache flush failed: {}", e);
        }
    }
}

// Implement Debug without dumping every entry
impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("backing_path", &self.backing_path)
            .finish()
    }
}

fn load_entries(path: &Path) -> HashMap<String, ResultEntry> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No cache file yet at {}; starting empty", path.display());
            return HashMap::new();
        }
        Err(e) => {
            tracing::warn!("Cannot read cache file {}: {}; starting empty", path.display(), e);
            return HashMap::new();
        }
    };

    match serde_json::from_slice::<HashMap<String, ResultEntry>>(&bytes) {
        Ok(entries) => {
            tracing::info!("📁 Cache loaded: {} entries from {}", entries.len(), path.display());
            entries
        }
        Err(e) => {
            tracing::warn!("Cache file {} is corrupt ({}); starting empty", path.display(), e);
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{CameraSettings, LocationGuess};
    use tempfile::{tempdir, TempDir};

    fn image(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    fn sunset() -> AnalysisResult {
        AnalysisResult {
            hashtags: vec!["sunset".into(), "beach".into()],
            location: Some(LocationGuess {
                primary_location: Some("Busan Haeundae".into()),
                alternative_locations: vec![],
            }),
            ..AnalysisResult::default()
        }
    }

    #[test]
    fn test_put_then_lookup() {
        let dir = tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("cache.json"));
        let photo = image(&dir, "x.jpg");

        assert_eq!(store.lookup(&photo), None);
        store.put(&photo, sunset()).unwrap();
        assert_eq!(store.lookup(&photo), Some(sunset()));
    }

    #[test]
    fn test_put_overwrites_without_merging() {
        let dir = tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("cache.json"));
        let photo = image(&dir, "x.jpg");

        store.put(&photo, sunset()).unwrap();
        let second = AnalysisResult {
            camera_settings: Some(CameraSettings {
                iso: Some("100".into()),
                ..CameraSettings::default()
            }),
            ..AnalysisResult::default()
        };
        store.put(&photo, second.clone()).unwrap();

        assert_eq!(store.lookup(&photo), Some(second));
        assert_eq!(store.stats().entry_count, 1);
    }

    #[test]
    fn test_put_unreadable_path_fails() {
        let dir = tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("cache.json"));
        let result = store.put(&dir.path().join("missing.jpg"), sunset());
        assert!(matches!(result, Err(StoreError::Fingerprint(_))));
        assert_eq!(store.stats().entry_count, 0);
    }

    #[test]
    fn test_flushes_every_tenth_insert() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let store = ResultStore::open(&cache);

        for i in 0..9 {
            store.put(&image(&dir, &format!("{i}.jpg")), sunset()).unwrap();
        }
        assert!(!cache.exists());

        store.put(&image(&dir, "9.jpg"), sunset()).unwrap();
        assert!(cache.exists());
        assert!(store.stats().backing_present);
    }

    #[test]
    fn test_reload_round_trips_exactly() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let photo = image(&dir, "x.jpg");

        {
            let store = ResultStore::open(&cache);
            store.put(&photo, sunset()).unwrap();
            store.flush().unwrap();
        }

        let written: HashMap<String, ResultEntry> =
            serde_json::from_slice(&fs::read(&cache).unwrap()).unwrap();
        let reopened = ResultStore::open(&cache);
        assert_eq!(reopened.lookup(&photo), Some(sunset()));

        reopened.flush().unwrap();
        let rewritten: HashMap<String, ResultEntry> =
            serde_json::from_slice(&fs::read(&cache).unwrap()).unwrap();
        assert_eq!(written, rewritten);
    }

    #[test]
    fn test_drop_flushes_pending_entries() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let photo = image(&dir, "x.jpg");

        drop({
            let store = ResultStore::open(&cache);
            store.put(&photo, sunset()).unwrap();
            store
        });

        assert_eq!(ResultStore::open(&cache).lookup(&photo), Some(sunset()));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        fs::write(&cache, b"{ not json at all").unwrap();

        let store = ResultStore::open(&cache);
        assert_eq!(store.stats().entry_count, 0);

        // Still usable after recovering
        let photo = image(&dir, "x.jpg");
        store.put(&photo, sunset()).unwrap();
        assert_eq!(store.lookup(&photo), Some(sunset()));
    }

    #[test]
    fn test_clear_removes_memory_and_file() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let store = ResultStore::open(&cache);
        let photo = image(&dir, "x.jpg");

        store.put(&photo, sunset()).unwrap();
        store.flush().unwrap();
        assert!(cache.exists());

        store.clear().unwrap();
        assert_eq!(store.lookup(&photo), None);
        let stats = store.stats();
        assert_eq!(stats.entry_count, 0);
        assert!(!stats.backing_present);
        assert_eq!(stats.backing_path, cache);
    }

    #[test]
    fn test_evict_older_than() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let store = ResultStore::open(&cache);
        let old = image(&dir, "old.jpg");
        let recent = image(&dir, "recent.jpg");
        let garbled = image(&dir, "garbled.jpg");

        store.put(&old, sunset()).unwrap();
        store.put(&recent, sunset()).unwrap();
        store.put(&garbled, sunset()).unwrap();

        {
            let mut inner = store.lock();
            let backdate = |path: &Path, created_at: String, inner: &mut StoreInner| {
                let key = Fingerprint::compute(path).unwrap().to_string();
                inner.entries.get_mut(&key).unwrap().created_at = created_at;
            };
            backdate(&old, (Utc::now() - ChronoDuration::days(40)).to_rfc3339(), &mut *inner);
            backdate(&recent, (Utc::now() - ChronoDuration::days(5)).to_rfc3339(), &mut *inner);
            backdate(&garbled, "yesterday-ish".to_string(), &mut *inner);
        }

        assert_eq!(store.evict_older_than(30), 2);
        assert_eq!(store.lookup(&old), None);
        assert_eq!(store.lookup(&garbled), None);
        assert_eq!(store.lookup(&recent), Some(sunset()));
        // Eviction flushes right away
        assert!(cache.exists());
    }

    #[test]
    fn test_evict_nothing_does_not_write() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let store = ResultStore::open(&cache);
        store.put(&image(&dir, "x.jpg"), sunset()).unwrap();

        assert_eq!(store.evict_older_than(30), 0);
        assert!(!cache.exists());
    }
}
