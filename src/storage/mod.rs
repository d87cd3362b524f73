//! Storage implementations.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};

use crate::interfaces::LedgerStore;

pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use memory::MemoryLedgerStore;

#[cfg(feature = "mongodb")]
pub use mongodb::MongoLedgerStore;

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend name: "memory" or "mongodb".
    pub backend: String,
    /// Connection URI for external backends.
    pub uri: String,
    /// Database name for external backends.
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            uri: "mongodb://localhost:27017".to_string(),
            database: "karat".to_string(),
        }
    }
}

/// Initialize a ledger store based on configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn LedgerStore>, Box<dyn std::error::Error>> {
    info!("Storage: {}", config.backend);

    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryLedgerStore::new())),
        #[cfg(feature = "mongodb")]
        "mongodb" => {
            let client = ::mongodb::Client::with_uri_str(&config.uri).await?;
            let store = MongoLedgerStore::new(&client, &config.database).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongodb"))]
        "mongodb" => {
            error!("MongoDB storage requested but 'mongodb' feature is not enabled");
            Err("MongoDB feature not enabled".into())
        }
        other => {
            error!("Unknown storage backend: {}", other);
            Err(format!("Unknown storage backend: {}", other).into())
        }
    }
}
