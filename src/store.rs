//! Versioned key-value store contract and the in-memory backend
use super::error::StoreError;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// Opaque token naming the state of a key at read time.
///
/// Versions only ever increase for a key, so a value that is rewritten back to
/// an earlier state still carries a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    pub const INITIAL: Version = Version(1);

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
    pub fn get(self) -> u64 {
        self.0
    }
    pub fn next(self) -> Result<Self, StoreError> {
        self.0.checked_add(1).map(Self).ok_or_else(|| {
            StoreError::Corrupt(format!("version counter {} cannot advance", self.0))
        })
    }
    /// Version a write should carry given the version it expects to replace.
    pub fn after(expected: Option<Version>) -> Result<Self, StoreError> {
        expected.map_or(Ok(Version::INITIAL), Version::next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(Version),
    /// The key changed since `expected` was observed; nothing was written.
    Conflict,
}

pub trait VersionedStore: Send + Sync {
    /// Current value and version for `key`, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError>;

    /// Writes `value` only if the key is still at `expected`. `None` means the
    /// key must not exist yet.
    fn put_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<Version>,
    ) -> Result<WriteOutcome, StoreError>;
}

impl<S: VersionedStore + ?Sized> VersionedStore for &S {
    fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        (**self).get(key)
    }
    fn put_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<Version>,
    ) -> Result<WriteOutcome, StoreError> {
        (**self).put_conditional(key, value, expected)
    }
}

impl<S: VersionedStore + ?Sized> VersionedStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        (**self).get(key)
    }
    fn put_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<Version>,
    ) -> Result<WriteOutcome, StoreError> {
        (**self).put_conditional(key, value, expected)
    }
}

impl<S: VersionedStore + ?Sized> VersionedStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        (**self).get(key)
    }
    fn put_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<Version>,
    ) -> Result<WriteOutcome, StoreError> {
        (**self).put_conditional(key, value, expected)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Versioned>>,
}

impl MemoryStore {
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

impl VersionedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<Version>,
    ) -> Result<WriteOutcome, StoreError> {
        let mut entries = self.entries.write();

        let observed = entries.get(key).map(|entry| entry.version);
        if observed != expected {
            tracing::debug!(key, ?expected, ?observed, "memory store version mismatch");
            return Ok(WriteOutcome::Conflict);
        }

        let version = Version::after(expected)?;
        entries.insert(key.to_owned(), Versioned { value, version });

        Ok(WriteOutcome::Written(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_absent_key() {
        let store = MemoryStore::new();

        let first = store.put_conditional("k", b"a".to_vec(), None).unwrap();
        let second = store.put_conditional("k", b"b".to_vec(), None).unwrap();

        assert_eq!(first, WriteOutcome::Written(Version::INITIAL));
        assert_eq!(second, WriteOutcome::Conflict);
        assert_eq!(store.get("k").unwrap().unwrap().value, b"a".to_vec());
    }

    #[test]
    fn stale_version_conflicts() {
        let store = MemoryStore::new();
        store.put_conditional("k", b"a".to_vec(), None).unwrap();
        let seen = store.get("k").unwrap().unwrap().version;

        store.put_conditional("k", b"b".to_vec(), Some(seen)).unwrap();
        let stale = store.put_conditional("k", b"c".to_vec(), Some(seen)).unwrap();

        assert_eq!(stale, WriteOutcome::Conflict);
        let current = store.get("k").unwrap().unwrap();
        assert_eq!(current.value, b"b".to_vec());
        assert_eq!(current.version, seen.next().unwrap());
    }

    #[test]
    fn exhausted_version_counter_is_an_error() {
        let last = Version::from_raw(u64::MAX);

        assert!(matches!(last.next(), Err(StoreError::Corrupt(_))));
        assert_eq!(Version::after(None).unwrap(), Version::INITIAL);
    }
}
