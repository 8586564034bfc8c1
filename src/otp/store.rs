//! Persisted clock-offset storage.
//!
//! The signed millisecond offset lives under a single key in a
//! pluggable key-value backend. `ClockOffsetStore` layers a read-through
//! in-memory cache on top: one lock guards both the cache and the
//! backend so the two are never observed in an inconsistent
//! combination. An absent offset stays an explicit `None` end to end;
//! there is no magic sentinel value.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::otp::types::{TotpError, TotpErrorKind};

/// Storage key for the clock offset.
pub const OFFSET_KEY: &str = "timeOffset";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Backend contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Persistence collaborator for the offset value.
pub trait OffsetBackend: Send {
    /// Read the persisted offset, `None` when never written.
    fn read(&self) -> Result<Option<i64>, TotpError>;
    /// Persist the offset, overwriting any previous value.
    fn write(&mut self, offset_millis: i64) -> Result<(), TotpError>;
}

/// Volatile backend; useful for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryOffsetBackend {
    value: Option<i64>,
}

impl MemoryOffsetBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OffsetBackend for MemoryOffsetBackend {
    fn read(&self) -> Result<Option<i64>, TotpError> {
        Ok(self.value)
    }

    fn write(&mut self, offset_millis: i64) -> Result<(), TotpError> {
        self.value = Some(offset_millis);
        Ok(())
    }
}

/// JSON-file backend holding `{"timeOffset": <millis>}`.
///
/// A missing file or missing key reads as "never synchronized".
#[derive(Debug)]
pub struct FileOffsetBackend {
    path: PathBuf,
}

impl FileOffsetBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OffsetBackend for FileOffsetBackend {
    fn read(&self) -> Result<Option<i64>, TotpError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TotpError::new(TotpErrorKind::Storage, "Cannot read offset file")
                    .with_detail(e.to_string()))
            }
        };
        let map: HashMap<String, i64> = serde_json::from_str(&raw).map_err(|e| {
            TotpError::new(TotpErrorKind::Storage, "Malformed offset file")
                .with_detail(e.to_string())
        })?;
        Ok(map.get(OFFSET_KEY).copied())
    }

    fn write(&mut self, offset_millis: i64) -> Result<(), TotpError> {
        let mut map = HashMap::new();
        map.insert(OFFSET_KEY.to_string(), offset_millis);
        let json = serde_json::to_string(&map).map_err(|e| {
            TotpError::new(TotpErrorKind::Storage, "Cannot serialise offset")
                .with_detail(e.to_string())
        })?;
        std::fs::write(&self.path, json).map_err(|e| {
            TotpError::new(TotpErrorKind::Storage, "Cannot write offset file")
                .with_detail(e.to_string())
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Read-through cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct StoreInner {
    backend: Box<dyn OffsetBackend>,
    /// `None` until the first `get` or `set`; afterwards the loaded
    /// value (which may itself be `None`).
    cache: Option<Option<i64>>,
}

/// Thread-safe clock-offset store with a write-through cache.
///
/// After the first `get`, repeat reads are served from memory until the
/// next `set` in the same process lifetime.
pub struct ClockOffsetStore {
    inner: Mutex<StoreInner>,
}

impl ClockOffsetStore {
    pub fn new(backend: Box<dyn OffsetBackend>) -> Self {
        Self {
            inner: Mutex::new(StoreInner { backend, cache: None }),
        }
    }

    /// Current offset in milliseconds, `None` when never synchronized.
    pub fn get(&self) -> Result<Option<i64>, TotpError> {
        let mut inner = self.lock();
        if let Some(cached) = inner.cache {
            return Ok(cached);
        }
        let value = inner.backend.read()?;
        inner.cache = Some(value);
        Ok(value)
    }

    /// Persist a new offset and refresh the cache.
    pub fn set(&self, offset_millis: i64) -> Result<(), TotpError> {
        let mut inner = self.lock();
        inner.backend.write(offset_millis)?;
        inner.cache = Some(Some(offset_millis));
        Ok(())
    }

    /// Whether a synchronization has ever been recorded.
    pub fn has_offset(&self) -> Result<bool, TotpError> {
        Ok(self.get()?.is_some())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Backend that counts reads, to observe cache behaviour.
    struct CountingBackend {
        value: Option<i64>,
        reads: Arc<AtomicUsize>,
    }

    impl OffsetBackend for CountingBackend {
        fn read(&self) -> Result<Option<i64>, TotpError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.value)
        }

        fn write(&mut self, offset_millis: i64) -> Result<(), TotpError> {
            self.value = Some(offset_millis);
            Ok(())
        }
    }

    // ── Cache semantics ──────────────────────────────────────────

    #[test]
    fn get_reads_backend_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let store = ClockOffsetStore::new(Box::new(CountingBackend {
            value: Some(1234),
            reads: Arc::clone(&reads),
        }));
        assert_eq!(store.get().unwrap(), Some(1234));
        assert_eq!(store.get().unwrap(), Some(1234));
        assert_eq!(store.get().unwrap(), Some(1234));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn absent_value_is_cached_too() {
        let reads = Arc::new(AtomicUsize::new(0));
        let store = ClockOffsetStore::new(Box::new(CountingBackend {
            value: None,
            reads: Arc::clone(&reads),
        }));
        assert_eq!(store.get().unwrap(), None);
        assert_eq!(store.get().unwrap(), None);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(!store.has_offset().unwrap());
    }

    #[test]
    fn set_writes_through_and_updates_cache() {
        let reads = Arc::new(AtomicUsize::new(0));
        let store = ClockOffsetStore::new(Box::new(CountingBackend {
            value: None,
            reads: Arc::clone(&reads),
        }));
        store.set(-987).unwrap();
        assert_eq!(store.get().unwrap(), Some(-987));
        assert!(store.has_offset().unwrap());
        // The set primed the cache; no backend read was needed.
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn negative_offset_distinct_from_unset() {
        let store = ClockOffsetStore::new(Box::new(MemoryOffsetBackend::new()));
        assert_eq!(store.get().unwrap(), None);
        store.set(-1).unwrap();
        assert_eq!(store.get().unwrap(), Some(-1));
    }

    // ── File backend ─────────────────────────────────────────────

    #[test]
    fn file_backend_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileOffsetBackend::new(dir.path().join("offset.json"));
        assert_eq!(backend.read().unwrap(), None);
    }

    #[test]
    fn file_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.json");
        let mut backend = FileOffsetBackend::new(&path);
        backend.write(-42_000).unwrap();
        assert_eq!(backend.read().unwrap(), Some(-42_000));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(OFFSET_KEY));
    }

    #[test]
    fn file_backend_malformed_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.json");
        std::fs::write(&path, "not json").unwrap();
        let backend = FileOffsetBackend::new(&path);
        let err = backend.read().unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::Storage);
    }

    #[test]
    fn store_over_file_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.json");
        let store = ClockOffsetStore::new(Box::new(FileOffsetBackend::new(&path)));
        store.set(55_500).unwrap();

        // Fresh store over the same file sees the persisted value.
        let store2 = ClockOffsetStore::new(Box::new(FileOffsetBackend::new(&path)));
        assert_eq!(store2.get().unwrap(), Some(55_500));
    }
}
