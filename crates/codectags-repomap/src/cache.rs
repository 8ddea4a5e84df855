use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use codectags_core::CtagsError;
use serde::{Deserialize, Serialize};

use crate::tags::TagRecord;

/// Cache key: a file and the modification time its tags were computed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Repository-relative file path.
    pub path: PathBuf,
    /// Modification time observed before tagging.
    pub mtime: SystemTime,
}

/// Storage for tagger output, shared by all collection tasks of one run.
pub trait TagCache: Send + Sync {
    /// Tags stored for exactly this `(path, mtime)`, if any.
    fn lookup(&self, key: &CacheKey) -> Option<Vec<TagRecord>>;

    /// Remember `tags` for `key`, replacing any entry for the same path.
    fn store(&self, key: CacheKey, tags: Vec<TagRecord>);

    /// Drop entries whose path fails `keep`, e.g. files that were deleted or
    /// renamed since they were tagged.
    fn retain(&self, _keep: &dyn Fn(&Path) -> bool) {}

    /// Persist pending writes. In-memory caches have nothing to do.
    ///
    /// # Errors
    ///
    /// Returns [`CtagsError`] if the backing store cannot be written.
    fn flush(&self) -> Result<(), CtagsError> {
        Ok(())
    }
}

/// Cache that never hits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl TagCache for NoCache {
    fn lookup(&self, _key: &CacheKey) -> Option<Vec<TagRecord>> {
        None
    }

    fn store(&self, _key: CacheKey, _tags: Vec<TagRecord>) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedTags {
    mtime: SystemTime,
    tags: Vec<TagRecord>,
}

type Entries = BTreeMap<PathBuf, CachedTags>;

fn lookup_in(entries: &Entries, key: &CacheKey) -> Option<Vec<TagRecord>> {
    entries
        .get(&key.path)
        .filter(|cached| cached.mtime == key.mtime)
        .map(|cached| cached.tags.clone())
}

/// Process-local cache.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use std::time::SystemTime;
/// use codectags_repomap::cache::{CacheKey, MemoryTagCache, TagCache};
///
/// let cache = MemoryTagCache::default();
/// let key = CacheKey { path: PathBuf::from("a.py"), mtime: SystemTime::UNIX_EPOCH };
/// assert!(cache.lookup(&key).is_none());
/// cache.store(key.clone(), vec![]);
/// assert_eq!(cache.lookup(&key), Some(vec![]));
/// ```
#[derive(Debug, Default)]
pub struct MemoryTagCache {
    entries: Mutex<Entries>,
}

impl TagCache for MemoryTagCache {
    fn lookup(&self, key: &CacheKey) -> Option<Vec<TagRecord>> {
        let entries = self.entries.lock().ok()?;
        lookup_in(&entries, key)
    }

    fn store(&self, key: CacheKey, tags: Vec<TagRecord>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.path, CachedTags { mtime: key.mtime, tags });
        }
    }

    fn retain(&self, keep: &dyn Fn(&Path) -> bool) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|path, _| keep(path));
        }
    }
}

#[derive(Debug, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Entries,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    entries: &'a Entries,
}

const CACHE_FILE_VERSION: u32 = 1;

/// Cache persisted as a JSON file, loaded on open and written on [`flush`].
///
/// A missing, unreadable, or outdated file starts an empty cache.
///
/// [`flush`]: TagCache::flush
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    state: Mutex<JsonState>,
}

#[derive(Debug, Default)]
struct JsonState {
    entries: Entries,
    dirty: bool,
}

impl JsonFileCache {
    /// Open the cache stored at `path`.
    pub fn open(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(file) if file.version == CACHE_FILE_VERSION => file.entries,
                Ok(file) => {
                    tracing::debug!(version = file.version, "discarding outdated tag cache");
                    Entries::new()
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "ignoring corrupt tag cache");
                    Entries::new()
                }
            },
            Err(_) => Entries::new(),
        };

        Self {
            path: path.to_path_buf(),
            state: Mutex::new(JsonState {
                entries,
                dirty: false,
            }),
        }
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Whether the cache holds no files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TagCache for JsonFileCache {
    fn lookup(&self, key: &CacheKey) -> Option<Vec<TagRecord>> {
        let state = self.state.lock().ok()?;
        lookup_in(&state.entries, key)
    }

    fn store(&self, key: CacheKey, tags: Vec<TagRecord>) {
        if let Ok(mut state) = self.state.lock() {
            state
                .entries
                .insert(key.path, CachedTags { mtime: key.mtime, tags });
            state.dirty = true;
        }
    }

    fn retain(&self, keep: &dyn Fn(&Path) -> bool) {
        if let Ok(mut state) = self.state.lock() {
            let before = state.entries.len();
            state.entries.retain(|path, _| keep(path));
            let removed = before - state.entries.len();
            if removed > 0 {
                tracing::debug!(removed, "pruned stale tag cache entries");
                state.dirty = true;
            }
        }
    }

    fn flush(&self) -> Result<(), CtagsError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CtagsError::Config("tag cache lock poisoned".into()))?;
        if !state.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string(&CacheFileRef {
            version: CACHE_FILE_VERSION,
            entries: &state.entries,
        })?;
        std::fs::write(&self.path, content)?;
        state.dirty = false;
        Ok(())
    }
}
