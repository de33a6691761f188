//! Named pool configurations and scoped pool handles.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use indigo_core::PoolSection;

use crate::error::LedgerError;
use crate::genesis::load_genesis;
use crate::http::HttpLedgerService;
use crate::memory::InMemoryLedger;
use crate::service::LedgerService;
use crate::transaction::{LedgerReply, LedgerTransaction, ReadQuery, ReadReply};

/// How to reach one ledger pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    pub genesis_txn: PathBuf,
    /// Remote node URL. Without one the pool runs an in-process ledger
    /// seeded from the genesis file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl PoolConfig {
    pub fn new(genesis_txn: impl Into<PathBuf>) -> Self {
        Self {
            genesis_txn: genesis_txn.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl From<&PoolSection> for PoolConfig {
    fn from(section: &PoolSection) -> Self {
        Self {
            genesis_txn: section.genesis_txn.clone(),
            endpoint: section.endpoint.clone(),
        }
    }
}

/// Pool configurations known to this process, by name.
pub struct PoolRegistry {
    configs: DashMap<String, PoolConfig>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
        }
    }

    /// Register a configuration. Fails with `ConfigurationConflict` if the
    /// name is taken.
    pub fn create_config(&self, name: &str, config: PoolConfig) -> Result<(), LedgerError> {
        match self.configs.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(LedgerError::ConfigurationConflict(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                tracing::info!(pool = name, genesis = %config.genesis_txn.display(), "pool config created");
                slot.insert(config);
                Ok(())
            }
        }
    }

    pub fn delete_config(&self, name: &str) -> Result<(), LedgerError> {
        self.configs
            .remove(name)
            .map(|_| tracing::info!(pool = name, "pool config deleted"))
            .ok_or_else(|| LedgerError::PoolNotConfigured(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<PoolConfig, LedgerError> {
        self.configs
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::PoolNotConfigured(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// An open pool. Closing is dropping the last handle.
pub struct Pool {
    name: String,
    service: Arc<dyn LedgerService>,
}

impl Pool {
    /// Open a configured pool: HTTP when the config names an endpoint,
    /// otherwise an in-process ledger seeded from the genesis file.
    pub async fn open(registry: &PoolRegistry, name: &str) -> Result<Self, LedgerError> {
        let config = registry.get(name)?;
        let service: Arc<dyn LedgerService> = match &config.endpoint {
            Some(endpoint) => Arc::new(HttpLedgerService::new(endpoint.clone())?),
            None => {
                let genesis = load_genesis(&config.genesis_txn).await?;
                Arc::new(InMemoryLedger::from_genesis(&genesis))
            }
        };
        tracing::info!(pool = name, service = service.service_id(), "pool opened");
        Ok(Self {
            name: name.to_string(),
            service,
        })
    }

    /// Open a configured pool over an existing service, e.g. a ledger shared
    /// between several clients in one process.
    pub fn open_with(
        registry: &PoolRegistry,
        name: &str,
        service: Arc<dyn LedgerService>,
    ) -> Result<Self, LedgerError> {
        registry.get(name)?;
        tracing::info!(pool = name, service = service.service_id(), "pool opened");
        Ok(Self {
            name: name.to_string(),
            service,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &Arc<dyn LedgerService> {
        &self.service
    }

    pub async fn submit(&self, txn: &LedgerTransaction) -> Result<LedgerReply, LedgerError> {
        self.service.submit(txn).await
    }

    pub async fn read(&self, query: &ReadQuery) -> Result<ReadReply, LedgerError> {
        self.service.read(query).await
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        tracing::info!(pool = %self.name, "pool closed");
    }
}
