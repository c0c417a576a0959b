//! TOML configuration for the executor and its backing store
use super::sled_store::SledStore;
use super::store::{MemoryStore, VersionedStore};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Read-validate-write attempts per operation before reporting contention.
    pub max_attempts: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("executor.max_attempts must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: Backend,
    /// Database directory, only read by the sled backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            path: PathBuf::from("loan-ledger.db"),
        }
    }
}

impl StoreConfig {
    pub fn open(&self) -> anyhow::Result<Arc<dyn VersionedStore>> {
        match self.backend {
            Backend::Memory => Ok(Arc::new(MemoryStore::new())),
            Backend::Sled => {
                let store = SledStore::open(&self.path).with_context(|| {
                    format!("failed to open sled store at {}", self.path.display())
                })?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub executor: ExecutorConfig,
    pub store: StoreConfig,
}

impl LedgerConfig {
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: LedgerConfig = toml::from_str(contents).context("invalid ledger config")?;
        config.executor.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&contents)
    }
}
