use async_trait::async_trait;
use memcache::{FromMemcacheValue, MemcacheError, ToMemcacheValue};
use shared::config::StorageConfig;
use shared::{Error, ExpirationWindow, Result};
use stash::ports::DocumentStore;
use std::io::Write;
use std::time::{Duration, SystemTime};
use tracing::info;

const NAME: &str = "memcached";

/// Item flag marking a write made without expiry.
const PINNED_FLAG: u32 = 1;

/// Value plus the pin marker, carried in the item flags.
struct Item {
    value: Vec<u8>,
    pinned: bool,
}

impl<W: Write> ToMemcacheValue<W> for Item {
    fn get_flags(&self) -> u32 {
        if self.pinned { PINNED_FLAG } else { 0 }
    }

    fn get_length(&self) -> usize {
        self.value.len()
    }

    fn write_to(&self, stream: &mut W) -> std::io::Result<()> {
        stream.write_all(&self.value)
    }
}

impl FromMemcacheValue for Item {
    fn from_memcache_value(
        value: Vec<u8>,
        flags: u32,
    ) -> std::result::Result<Self, MemcacheError> {
        Ok(Item {
            value,
            pinned: flags & PINNED_FLAG != 0,
        })
    }
}

/// Memcached backend. The client is blocking, so every call runs on the
/// blocking pool.
#[derive(Clone)]
pub struct MemcachedStore {
    client: memcache::Client,
    expiration: ExpirationWindow,
}

impl MemcachedStore {
    pub async fn connect(
        config: &StorageConfig,
        expiration: ExpirationWindow,
        io_timeout: Duration,
    ) -> Result<Self> {
        let url = format!(
            "memcache://{}:{}",
            config.host_or_default(),
            config.port_or_default()
        );

        let client = tokio::task::spawn_blocking(move || {
            let client = memcache::Client::connect(url)?;
            client.set_read_timeout(Some(io_timeout))?;
            client.set_write_timeout(Some(io_timeout))?;
            client.version()?;
            Ok::<_, MemcacheError>(client)
        })
        .await
        .map_err(|e| Error::Internal(format!("memcached connect task failed: {e}")))?
        .map_err(|e| Error::unavailable(NAME, e))?;

        info!(
            host = config.host_or_default(),
            port = config.port_or_default(),
            "Connected to Memcached"
        );

        Ok(Self { client, expiration })
    }

    async fn blocking<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce(&memcache::Client) -> std::result::Result<T, MemcacheError> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || call(&client))
            .await
            .map_err(|e| Error::Internal(format!("memcached task failed: {e}")))?
            .map_err(|e| Error::backend(NAME, e))
    }
}

#[async_trait]
impl DocumentStore for MemcachedStore {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str, skip_expiration: bool) -> Result<()> {
        let key = key.to_string();
        let item = Item {
            value: value.as_bytes().to_vec(),
            pinned: skip_expiration,
        };
        let exptime = self
            .expiration
            .memcached_exptime(SystemTime::now(), skip_expiration);

        self.blocking(move |client| client.set(&key, item, exptime))
            .await
    }

    async fn get(&self, key: &str, skip_expiration: bool) -> Result<String> {
        let owned = key.to_string();
        let item: Item = self
            .blocking(move |client| client.get::<Item>(&owned))
            .await?
            .ok_or(Error::NotFound)?;

        if !skip_expiration && !item.pinned && self.expiration.is_enabled() {
            let key = key.to_string();
            let exptime = self.expiration.memcached_exptime(SystemTime::now(), false);
            // A miss here means the item expired in between; the value is still returned
            self.blocking(move |client| client.touch(&key, exptime))
                .await?;
        }

        String::from_utf8(item.value).map_err(|e| Error::backend(NAME, e))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
