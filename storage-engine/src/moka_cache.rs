use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use shared::{Error, ExpirationWindow, Result};
use stash::ports::DocumentStore;
use std::fmt::Debug;
use std::time::{Duration, Instant};

const NAME: &str = "memory";

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    pinned: bool,
}

/// Per-entry lifetime: pinned entries never expire, the rest get the full
/// window again on every insert.
struct DocumentExpiry {
    window: Option<Duration>,
}

impl DocumentExpiry {
    fn lifetime(&self, entry: &Entry) -> Option<Duration> {
        if entry.pinned { None } else { self.window }
    }
}

impl Expiry<String, Entry> for DocumentExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.lifetime(value)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.lifetime(value)
    }
}

/// In-process backend on a Moka cache, useful for development and tests.
/// Contents do not survive a restart.
pub struct MokaCache {
    cache: Cache<String, Entry>,
    expiration: ExpirationWindow,
}

impl MokaCache {
    pub fn new(name: &str, max_entries: Option<u64>, expiration: ExpirationWindow) -> Self {
        let mut builder = Cache::builder().name(name).expire_after(DocumentExpiry {
            window: expiration.window(),
        });

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
            expiration,
        }
    }
}

#[async_trait]
impl DocumentStore for MokaCache {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str, skip_expiration: bool) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            pinned: skip_expiration,
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn get(&self, key: &str, skip_expiration: bool) -> Result<String> {
        // Either doesn't exist or expired
        let entry = self.cache.get(key).await.ok_or(Error::NotFound)?;

        if !skip_expiration && !entry.pinned && self.expiration.is_enabled() {
            // Re-inserting restarts the window
            self.cache.insert(key.to_string(), entry.clone()).await;
        }

        Ok(entry.value)
    }

    async fn close(&self) -> Result<()> {
        self.cache.invalidate_all();
        Ok(())
    }
}

impl Debug for MokaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCache")
            .field("entry_count", &self.cache.entry_count())
            .field("expiration", &self.expiration)
            .finish()
    }
}
