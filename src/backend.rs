use std::sync::Arc;

use flashreport_core::{StorageBackend, StorageError};
use flashreport_local::{LocalStorage, SqliteBlobStore};
use flashreport_postgres::{PostgresOptions, PostgresStorage};

use crate::config::{BackendKind, StorageConfig};

/// Opens the variant selected in the configuration.
pub fn open_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    match config.backend {
        BackendKind::Local => {
            tracing::info!(path = %config.local.path, "Opening local storage");
            let blob = SqliteBlobStore::new(&config.local.path)?;
            Ok(Arc::new(LocalStorage::open(Arc::new(blob))?))
        }
        BackendKind::Remote => {
            tracing::info!("Connecting to remote storage");
            let options = PostgresOptions {
                connect_timeout: config.remote.connect_timeout(),
                statement_timeout: config.remote.statement_timeout(),
            };
            Ok(Arc::new(PostgresStorage::new(&config.remote.url, &options)?))
        }
    }
}
