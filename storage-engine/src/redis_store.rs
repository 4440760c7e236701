use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use shared::config::StorageConfig;
use shared::expiration::millis;
use shared::{Error, ExpirationWindow, Result};
use stash::ports::DocumentStore;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

const NAME: &str = "redis";

/// Largest `PX` that still leaves Redis room to add its own clock.
const MAX_PX_MILLIS: u64 = i64::MAX as u64 / 2;

/// Redis backend. Expiry is native (`PX`) and reads slide it with `PEXPIRE`.
///
/// `close` drops the connection manager; later calls fail as unavailable.
pub struct RedisStore {
    conn: RwLock<Option<ConnectionManager>>,
    expiration: ExpirationWindow,
}

impl RedisStore {
    pub async fn connect(config: &StorageConfig, expiration: ExpirationWindow) -> Result<Self> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(
                config.host_or_default().to_string(),
                config.port_or_default(),
            ),
            redis: RedisConnectionInfo {
                username: non_empty(&config.username),
                password: non_empty(&config.password),
                ..Default::default()
            },
        };

        let client = redis::Client::open(info).map_err(|e| Error::unavailable(NAME, e))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::unavailable(NAME, e))?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| Error::unavailable(NAME, e))?;

        info!(
            host = config.host_or_default(),
            port = config.port_or_default(),
            "Connected to Redis"
        );

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            expiration,
        })
    }

    /// A handle on the shared connection, unless the store was closed.
    async fn connection(&self) -> Result<ConnectionManager> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::unavailable(NAME, "connection closed"))
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Redis rejects a zero `PX`, so sub-millisecond windows round up.
fn px(ttl: Duration) -> i64 {
    millis(ttl).min(MAX_PX_MILLIS) as i64
}

#[async_trait]
impl DocumentStore for RedisStore {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str, skip_expiration: bool) -> Result<()> {
        let mut conn = self.connection().await?;

        match self.expiration.for_write(skip_expiration) {
            Some(ttl) => conn.pset_ex::<_, _, ()>(key, value, px(ttl) as u64).await,
            None => conn.set::<_, _, ()>(key, value).await,
        }
        .map_err(|e| Error::backend(NAME, e))
    }

    async fn get(&self, key: &str, skip_expiration: bool) -> Result<String> {
        let mut conn = self.connection().await?;

        // PTTL is -1 for a key without expiry, which must stay that way
        let (value, pttl): (Option<String>, i64) = redis::pipe()
            .atomic()
            .get(key)
            .pttl(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::backend(NAME, e))?;

        let value = value.ok_or(Error::NotFound)?;

        if let Some(window) = self.expiration.window() {
            if !skip_expiration && pttl >= 0 {
                conn.pexpire::<_, ()>(key, px(window))
                    .await
                    .map_err(|e| Error::backend(NAME, e))?;
            }
        }

        Ok(value)
    }

    async fn close(&self) -> Result<()> {
        self.conn.write().await.take();
        Ok(())
    }
}
