//! TTL-scoped state on top of a plain key-value store.
//!
//! The coordinator keeps three pieces of advisory state between calls: the
//! debounce flag, the pending invalidation batch and its status snapshot. Each
//! of them is a [`ScopedCache`], which stores an explicit `{value, expires_at}`
//! envelope under one key of a [`KeyValueStore`]. Expired entries read as absent
//! and are removed lazily.
//!
//! Two stores are provided: [`MemoryStore`] for a single process and tests, and
//! [`FileStore`] which keeps one JSON document per key in a directory so that
//! state survives restarts and is shared by every process using that directory.
//! Neither store offers mutual exclusion across processes.

use std::fmt;
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};

/// Longest lifetime a state entry can be given, in seconds.
///
/// Longer TTLs are clamped so that expiry timestamps stay representable.
pub const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// A string-to-string store that persists coordinator state.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Read the raw value stored under `key`.
    fn get(&self, key: &str) -> CoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: String) -> CoreResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> CoreResult<()>;
}

/// In-memory [`KeyValueStore`] backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: DashMap<String, String>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.inner.get(key).map(|v| v.clone()))
    }

    fn put(&self, key: &str, value: String) -> CoreResult<()> {
        self.inner.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.inner.remove(key);
        Ok(())
    }
}

/// File-backed [`KeyValueStore`]: one `<key>.json` file per key.
///
/// Each write goes to its own uniquely named temporary file in the same
/// directory, which is then renamed over the target. Readers never observe a
/// half-written document and concurrent writers never share a temporary file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CoreError::StoreIo {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CoreError::StoreIo {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn put(&self, key: &str, value: String) -> CoreResult<()> {
        let io_error = |source| CoreError::StoreIo {
            key: key.to_owned(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_error)?;
        tmp.write_all(value.as_bytes()).map_err(io_error)?;
        tmp.persist(self.path_for(key))
            .map_err(|e| io_error(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CoreError::StoreIo {
                key: key.to_owned(),
                source,
            }),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// A single typed value with an expiry, stored under one key.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use chrono::TimeDelta;
/// use edgepurge_core::{MemoryStore, ScopedCache, SystemClock};
///
/// let flag: ScopedCache<bool> =
///     ScopedCache::new(Arc::new(MemoryStore::new()), "debounce", Arc::new(SystemClock));
/// flag.set(&true, TimeDelta::seconds(60)).unwrap();
/// assert_eq!(flag.get().unwrap(), Some(true));
/// flag.delete().unwrap();
/// assert_eq!(flag.get().unwrap(), None);
/// ```
pub struct ScopedCache<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    clock: Arc<dyn Clock>,
    _value: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for ScopedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCache")
            .field("key", &self.key)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<T: Serialize + DeserializeOwned> ScopedCache<T> {
    /// Create a cache entry named `key` in `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            key: key.into(),
            clock,
            _value: PhantomData,
        }
    }

    /// Read the value if present and not expired.
    pub fn get(&self) -> CoreResult<Option<T>> {
        Ok(self.get_with_expiry()?.map(|(value, _)| value))
    }

    /// Read the value together with its expiry time.
    ///
    /// Expired or undecodable entries are deleted and reported as absent.
    pub fn get_with_expiry(&self) -> CoreResult<Option<(T, DateTime<Utc>)>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };

        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding undecodable state entry");
                self.store.remove(&self.key)?;
                return Ok(None);
            }
        };

        if envelope.expires_at <= self.clock.now() {
            debug!(key = %self.key, expires_at = %envelope.expires_at, "state entry expired");
            self.store.remove(&self.key)?;
            return Ok(None);
        }

        Ok(Some((envelope.value, envelope.expires_at)))
    }

    /// Take the value out if it is stored but already expired.
    ///
    /// Lets a caller notice state that lapsed unused, which [`Self::get`]
    /// silently discards.
    pub fn take_expired(&self) -> CoreResult<Option<T>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(envelope) if envelope.expires_at <= self.clock.now() => {
                self.store.remove(&self.key)?;
                Ok(Some(envelope.value))
            }
            _ => Ok(None),
        }
    }

    /// Store `value`, valid for `ttl` from now.
    ///
    /// `ttl` is clamped to [`MAX_TTL_SECS`].
    pub fn set(&self, value: &T, ttl: TimeDelta) -> CoreResult<()> {
        let ttl = ttl.min(TimeDelta::seconds(MAX_TTL_SECS));
        let envelope = Envelope {
            value,
            expires_at: self
                .clock
                .now()
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let raw = serde_json::to_string(&envelope).map_err(|source| CoreError::StoreCodec {
            key: self.key.clone(),
            source,
        })?;
        self.store.put(&self.key, raw)
    }

    /// Remove the value.
    pub fn delete(&self) -> CoreResult<()> {
        self.store.remove(&self.key)
    }
}
