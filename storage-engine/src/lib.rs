//! Storage adapters and the factory that picks one from configuration.

use async_trait::async_trait;
use shared::config::{StorageConfig, StorageKind};
use shared::{Error, ExpirationWindow, Result};
use stash::ports::{DocumentStore, StorageFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod file_store;
pub mod memcached_store;
pub mod moka_cache;
pub mod mongo_store;
pub mod postgres_store;
pub mod redis_store;
pub mod s3_store;

pub use file_store::FileStore;
pub use memcached_store::MemcachedStore;
pub use moka_cache::MokaCache;
pub use mongo_store::MongoStore;
pub use postgres_store::PostgresStore;
pub use redis_store::RedisStore;
pub use s3_store::S3Store;

/// The closed set of backends.
pub enum Backend {
    File(FileStore),
    Redis(RedisStore),
    Memcached(MemcachedStore),
    Mongodb(MongoStore),
    Postgres(PostgresStore),
    S3(S3Store),
    Memory(MokaCache),
}

/// A connected backend with a deadline on every call.
pub struct StorageBackend {
    backend: Backend,
    operation_timeout: Duration,
}

impl StorageBackend {
    pub fn new(backend: Backend, operation_timeout: Duration) -> Self {
        Self {
            backend,
            operation_timeout,
        }
    }

    /// Builds and checks the backend named by `config.kind`. A backend that
    /// cannot be reached within the timeout is reported as unavailable.
    pub async fn connect(
        config: &StorageConfig,
        expiration: ExpirationWindow,
        operation_timeout: Duration,
    ) -> Result<Self> {
        let name = config.kind.as_str();
        let backend = match config.kind {
            StorageKind::File => Backend::File(FileStore::new(&config.file_path)?),
            StorageKind::Memory => Backend::Memory(MokaCache::new("documents", None, expiration)),
            StorageKind::Redis => Backend::Redis(
                within(name, operation_timeout, RedisStore::connect(config, expiration)).await?,
            ),
            StorageKind::Memcached => Backend::Memcached(
                within(
                    name,
                    operation_timeout,
                    MemcachedStore::connect(config, expiration, operation_timeout),
                )
                .await?,
            ),
            StorageKind::Mongodb => Backend::Mongodb(
                within(
                    name,
                    operation_timeout,
                    MongoStore::connect(config, expiration, operation_timeout),
                )
                .await?,
            ),
            StorageKind::Postgres => Backend::Postgres(
                within(
                    name,
                    operation_timeout,
                    PostgresStore::connect(config, expiration, operation_timeout),
                )
                .await?,
            ),
            StorageKind::S3 => {
                Backend::S3(within(name, operation_timeout, S3Store::connect(config)).await?)
            }
        };

        info!(backend = name, "Storage backend ready");
        Ok(Self::new(backend, operation_timeout))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn inner(&self) -> &dyn DocumentStore {
        match &self.backend {
            Backend::File(store) => store,
            Backend::Redis(store) => store,
            Backend::Memcached(store) => store,
            Backend::Mongodb(store) => store,
            Backend::Postgres(store) => store,
            Backend::S3(store) => store,
            Backend::Memory(store) => store,
        }
    }
}

/// Runs a connect step under the deadline; running out means unavailable.
async fn within<T>(
    backend: &'static str,
    after: Duration,
    connect: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(after, connect).await {
        Ok(result) => result,
        Err(_) => Err(Error::unavailable(
            backend,
            format!("no response within {after:?}"),
        )),
    }
}

/// Bounds a single store call. Callers decide whether a timeout is worth logging.
async fn bounded<T>(
    backend: &'static str,
    after: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout { backend, after }),
    }
}

#[async_trait]
impl DocumentStore for StorageBackend {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    async fn set(&self, key: &str, value: &str, skip_expiration: bool) -> Result<()> {
        bounded(
            self.name(),
            self.operation_timeout,
            self.inner().set(key, value, skip_expiration),
        )
        .await
    }

    async fn get(&self, key: &str, skip_expiration: bool) -> Result<String> {
        bounded(
            self.name(),
            self.operation_timeout,
            self.inner().get(key, skip_expiration),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        bounded(self.name(), self.operation_timeout, self.inner().close()).await
    }
}

/// Factory handed to the binary; connects whichever backend is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnifiedStorageFactory;

#[async_trait]
impl StorageFactory for UnifiedStorageFactory {
    async fn create_from_config(
        &self,
        config: &StorageConfig,
        expiration: ExpirationWindow,
        operation_timeout: Duration,
    ) -> Result<Arc<dyn DocumentStore>> {
        let backend = StorageBackend::connect(config, expiration, operation_timeout).await?;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
pub(crate) mod test_env {
    use shared::config::{StorageConfig, StorageKind};

    /// Connection settings for a live backend from `STASH_TEST_<KIND>_*`,
    /// or `None` when the host variable is unset.
    pub fn storage_config(kind: StorageKind) -> Option<StorageConfig> {
        let prefix = format!("STASH_TEST_{}_", kind.as_str().to_uppercase());
        let var = |name: &str| std::env::var(format!("{prefix}{name}")).unwrap_or_default();

        let host = var("HOST");
        if host.is_empty() {
            eprintln!("{prefix}HOST not set, skipping");
            return None;
        }

        Some(StorageConfig {
            kind,
            host,
            port: var("PORT").parse().unwrap_or(0),
            username: var("USERNAME"),
            password: var("PASSWORD"),
            database: var("DATABASE"),
            bucket: var("BUCKET"),
            aws_region: var("AWS_REGION"),
            file_path: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A store that never answers
    struct Stalled;

    #[async_trait]
    impl DocumentStore for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn set(&self, _key: &str, _value: &str, _skip: bool) -> Result<()> {
            std::future::pending().await
        }

        async fn get(&self, _key: &str, _skip: bool) -> Result<String> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_bounded_call_times_out() {
        let after = Duration::from_millis(50);
        let err = bounded("stalled", after, Stalled.get("key", false))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Timeout {
                backend: "stalled",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_connect_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            kind: StorageKind::File,
            file_path: dir.path().join("docs").to_string_lossy().into_owned(),
            ..Default::default()
        };

        let store = UnifiedStorageFactory
            .create_from_config(&config, ExpirationWindow::none(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.name(), "file");

        store.set("key", "value", false).await.unwrap();
        assert_eq!(store.get("key", false).await.unwrap(), "value");
        assert!(store.get("other", false).await.unwrap_err().is_not_found());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let config = StorageConfig {
            kind: StorageKind::Memory,
            ..Default::default()
        };

        let store = StorageBackend::connect(
            &config,
            ExpirationWindow::from_secs(60),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert!(matches!(store.backend(), Backend::Memory(_)));

        store.set("key", "value", true).await.unwrap();
        assert_eq!(store.get("key", false).await.unwrap(), "value");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Nothing listens on port 1
        let config = StorageConfig {
            kind: StorageKind::Redis,
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };

        let result =
            StorageBackend::connect(&config, ExpirationWindow::none(), Duration::from_secs(2))
                .await;
        assert!(matches!(
            result,
            Err(Error::Unavailable {
                backend: "redis",
                ..
            })
        ));
    }
}
