//! sled backed [`VersionedStore`]
use super::error::StoreError;
use super::store::{Version, Versioned, VersionedStore, WriteOutcome};
use minicbor::bytes::ByteVec;
use sled::Db;
use std::sync::Arc;

// What actually lands in sled: the caller's bytes plus the version counter.
#[derive(Debug, minicbor::Encode, minicbor::Decode)]
struct Envelope {
    #[n(0)]
    version: u64,
    #[n(1)]
    payload: ByteVec,
}

impl Envelope {
    fn decode(raw: &[u8]) -> Result<Self, StoreError> {
        Ok(minicbor::decode(raw)?)
    }
    fn encode(version: Version, payload: Vec<u8>) -> Result<Vec<u8>, StoreError> {
        let envelope = Envelope {
            version: version.get(),
            payload: ByteVec::from(payload),
        };
        Ok(minicbor::to_vec(&envelope)?)
    }
}

pub struct SledStore {
    instance: Arc<sled::Db>,
}

impl SledStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self::new(Arc::new(db)))
    }

    pub fn db(&self) -> &Db {
        &self.instance
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.instance.flush()?;
        Ok(())
    }
}

impl VersionedStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        let Some(raw) = self.instance.get(key.as_bytes())? else {
            return Ok(None);
        };
        let envelope = Envelope::decode(&raw)?;

        Ok(Some(Versioned {
            value: envelope.payload.to_vec(),
            version: Version::from_raw(envelope.version),
        }))
    }

    fn put_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<Version>,
    ) -> Result<WriteOutcome, StoreError> {
        let current = self.instance.get(key.as_bytes())?;
        let observed = match current.as_deref() {
            Some(raw) => Some(Version::from_raw(Envelope::decode(raw)?.version)),
            None => None,
        };

        if observed != expected {
            tracing::debug!(key, ?expected, ?observed, "sled store version mismatch");
            return Ok(WriteOutcome::Conflict);
        }

        let version = Version::after(expected)?;
        let encoded = Envelope::encode(version, value)?;

        // swapping against the exact bytes read means any writer that slipped
        // in after our read makes this fail rather than be overwritten
        match self
            .instance
            .compare_and_swap(key.as_bytes(), current.as_deref(), Some(encoded))?
        {
            Ok(()) => Ok(WriteOutcome::Written(version)),
            Err(_) => {
                tracing::debug!(key, "sled compare_and_swap lost a race");
                Ok(WriteOutcome::Conflict)
            }
        }
    }
}
