#![deny(clippy::all)]

use async_trait::async_trait;
use shared::config::StorageConfig;
use shared::{ExpirationWindow, Result};
use std::sync::Arc;
use std::time::Duration;

// Ports are the pluggable extension points for storage and key minting

/// Port for a document storage backend.
///
/// Implementations must be safe for concurrent calls from many tasks and must
/// never panic on the `set`/`get` path.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Backend tag used in logs and errors
    fn name(&self) -> &'static str;

    /// Upsert `value` under `key`. `skip_expiration` pins the document.
    async fn set(&self, key: &str, value: &str, skip_expiration: bool) -> Result<()>;

    /// Latest value for `key`, or `Error::NotFound`. A non-skip read extends
    /// the lifetime of documents that carry an expiry.
    async fn get(&self, key: &str, skip_expiration: bool) -> Result<String>;

    /// Release the backend client. Called once on shutdown.
    async fn close(&self) -> Result<()>;
}

/// Port for minting document keys
pub trait KeyGenerator: Send + Sync + 'static {
    fn generate(&self, length: usize) -> Result<String>;
}

/// Port for creating a storage backend from configuration
#[async_trait]
pub trait StorageFactory: Send + Sync + 'static {
    async fn create_from_config(
        &self,
        config: &StorageConfig,
        expiration: ExpirationWindow,
        operation_timeout: Duration,
    ) -> Result<Arc<dyn DocumentStore>>;
}
