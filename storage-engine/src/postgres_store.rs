use async_trait::async_trait;
use shared::config::StorageConfig;
use shared::expiration::epoch_secs;
use shared::{Error, ExpirationWindow, Result};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use stash::ports::DocumentStore;
use std::time::{Duration, SystemTime};
use tracing::info;

const NAME: &str = "postgres";
const MAX_CONNECTIONS: u32 = 10;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS entries (
    id SERIAL PRIMARY KEY,
    key VARCHAR(255) NOT NULL UNIQUE,
    value TEXT,
    expiration BIGINT
)";

const UPSERT: &str = "INSERT INTO entries (key, value, expiration) VALUES ($1, $2, $3)
    ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expiration = EXCLUDED.expiration";

const SELECT: &str = "SELECT id, value, expiration FROM entries WHERE key = $1";
const DELETE: &str = "DELETE FROM entries WHERE id = $1";
const REFRESH: &str = "UPDATE entries SET expiration = $1 WHERE id = $2";

/// PostgreSQL backend over the `entries` table.
///
/// `expiration` holds the deadline in Unix seconds, `0` meaning never.
/// Nothing sweeps the table; an expired row is deleted by the read that
/// finds it.
pub struct PostgresStore {
    pool: PgPool,
    expiration: ExpirationWindow,
}

impl PostgresStore {
    pub async fn connect(
        config: &StorageConfig,
        expiration: ExpirationWindow,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let mut options = PgConnectOptions::new()
            .host(config.host_or_default())
            .port(config.port_or_default());
        if !config.username.is_empty() {
            options = options.username(&config.username);
        }
        if !config.password.is_empty() {
            options = options.password(&config.password);
        }
        if !config.database.is_empty() {
            options = options.database(&config.database);
        }

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| Error::unavailable(NAME, e))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| Error::unavailable(NAME, e))?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| Error::unavailable(NAME, e))?;

        info!(
            host = config.host_or_default(),
            port = config.port_or_default(),
            "Connected to PostgreSQL"
        );

        Ok(Self { pool, expiration })
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str, skip_expiration: bool) -> Result<()> {
        let deadline = self
            .expiration
            .deadline_epoch_secs(SystemTime::now(), skip_expiration);

        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(deadline)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::backend(NAME, e))?;

        Ok(())
    }

    async fn get(&self, key: &str, skip_expiration: bool) -> Result<String> {
        let (id, value, deadline) =
            sqlx::query_as::<_, (i32, Option<String>, Option<i64>)>(SELECT)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::backend(NAME, e))?
                .ok_or(Error::NotFound)?;
        let deadline = deadline.unwrap_or(0);

        let now = SystemTime::now();
        if deadline != 0 {
            if epoch_secs(now) >= deadline {
                sqlx::query(DELETE)
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| Error::backend(NAME, e))?;
                return Err(Error::NotFound);
            }

            if !skip_expiration && self.expiration.is_enabled() {
                sqlx::query(REFRESH)
                    .bind(self.expiration.deadline_epoch_secs(now, false))
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| Error::backend(NAME, e))?;
            }
        }

        Ok(value.unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
