use async_trait::async_trait;
use mongodb::bson::{self, doc};
use mongodb::options::{ClientOptions, Credential, IndexOptions, ServerAddress};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use shared::config::StorageConfig;
use shared::{Error, ExpirationWindow, Result};
use stash::ports::DocumentStore;
use std::time::{Duration, SystemTime};
use tracing::info;

const NAME: &str = "mongodb";
const DEFAULT_DATABASE: &str = "stash";
const COLLECTION: &str = "entries";

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiration: Option<bson::DateTime>,
}

/// MongoDB backend. Documents carry their deadline in `expiration`; a TTL
/// index sweeps them eventually and reads drop anything already past due.
pub struct MongoStore {
    client: Client,
    collection: Collection<Entry>,
    expiration: ExpirationWindow,
}

impl MongoStore {
    pub async fn connect(
        config: &StorageConfig,
        expiration: ExpirationWindow,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::Tcp {
            host: config.host_or_default().to_string(),
            port: Some(config.port_or_default()),
        }];
        options.app_name = Some("stash".to_string());
        options.connect_timeout = Some(connect_timeout);
        options.server_selection_timeout = Some(connect_timeout);

        if !config.username.is_empty() {
            let mut credential = Credential::default();
            credential.username = Some(config.username.clone());
            credential.password = Some(config.password.clone());
            options.credential = Some(credential);
        }

        let client = Client::with_options(options).map_err(|e| Error::unavailable(NAME, e))?;

        let database_name = if config.database.is_empty() {
            DEFAULT_DATABASE
        } else {
            &config.database
        };
        let database = client.database(database_name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::unavailable(NAME, e))?;

        let collection = database.collection::<Entry>(COLLECTION);

        let ttl_index = IndexModel::builder()
            .keys(doc! { "expiration": 1 })
            .options(IndexOptions::builder().expire_after(Duration::ZERO).build())
            .build();
        let key_index = IndexModel::builder()
            .keys(doc! { "key": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection
            .create_indexes([ttl_index, key_index])
            .await
            .map_err(|e| Error::unavailable(NAME, e))?;

        info!(
            host = config.host_or_default(),
            database = database_name,
            "Connected to MongoDB"
        );

        Ok(Self {
            client,
            collection,
            expiration,
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str, skip_expiration: bool) -> Result<()> {
        let entry = Entry {
            key: key.to_string(),
            value: value.to_string(),
            expiration: self
                .expiration
                .deadline_from(SystemTime::now(), skip_expiration)
                .map(bson::DateTime::from_system_time),
        };

        self.collection
            .replace_one(doc! { "key": key }, &entry)
            .upsert(true)
            .await
            .map_err(|e| Error::backend(NAME, e))?;

        Ok(())
    }

    async fn get(&self, key: &str, skip_expiration: bool) -> Result<String> {
        let entry = self
            .collection
            .find_one(doc! { "key": key })
            .await
            .map_err(|e| Error::backend(NAME, e))?
            .ok_or(Error::NotFound)?;

        // Pinned entries have no deadline and keep it that way
        let Some(deadline) = entry.expiration else {
            return Ok(entry.value);
        };

        let now = SystemTime::now();
        if ExpirationWindow::is_expired(deadline.to_system_time(), now) {
            // The TTL monitor runs about once a minute, so stale entries linger
            self.collection
                .delete_one(doc! { "key": key })
                .await
                .map_err(|e| Error::backend(NAME, e))?;
            return Err(Error::NotFound);
        }

        if let Some(refreshed) = self.expiration.deadline_from(now, skip_expiration) {
            self.collection
                .update_one(
                    doc! { "key": key },
                    doc! { "$set": { "expiration": bson::DateTime::from_system_time(refreshed) } },
                )
                .await
                .map_err(|e| Error::backend(NAME, e))?;
        }

        Ok(entry.value)
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env;
    use shared::config::StorageKind;

    async fn store(window: Duration) -> Option<MongoStore> {
        let config = test_env::storage_config(StorageKind::Mongodb)?;
        Some(
            MongoStore::connect(
                &config,
                ExpirationWindow::new(window),
                Duration::from_secs(5),
            )
            .await
            .unwrap(),
        )
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB server (STASH_TEST_MONGODB_HOST)"]
    async fn test_mongo_set_and_get() {
        let Some(store) = store(Duration::from_secs(60)).await else {
            return;
        };

        store.set("stash-test-key", "value", false).await.unwrap();
        assert_eq!(store.get("stash-test-key", false).await.unwrap(), "value");

        // Upsert keeps a single document per key
        store.set("stash-test-key", "updated", false).await.unwrap();
        assert_eq!(store.get("stash-test-key", true).await.unwrap(), "updated");
        let count = store
            .collection
            .count_documents(doc! { "key": "stash-test-key" })
            .await
            .unwrap();
        assert_eq!(count, 1);

        let err = store.get("stash-test-missing", false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB server (STASH_TEST_MONGODB_HOST)"]
    async fn test_mongo_lazy_expiration() {
        let Some(store) = store(Duration::from_secs(2)).await else {
            return;
        };

        store.set("stash-test-temp", "value", false).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let err = store.get("stash-test-temp", false).await.unwrap_err();
        assert!(err.is_not_found());

        // The expired entry was removed on read
        let remaining = store
            .collection
            .find_one(doc! { "key": "stash-test-temp" })
            .await
            .unwrap();
        assert!(remaining.is_none());
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB server (STASH_TEST_MONGODB_HOST)"]
    async fn test_mongo_pinned_stays_pinned() {
        let Some(store) = store(Duration::from_secs(2)).await else {
            return;
        };

        store.set("stash-test-pinned", "forever", true).await.unwrap();
        store.get("stash-test-pinned", false).await.unwrap();

        let entry = store
            .collection
            .find_one(doc! { "key": "stash-test-pinned" })
            .await
            .unwrap()
            .unwrap();
        assert!(entry.expiration.is_none());
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB server (STASH_TEST_MONGODB_HOST)"]
    async fn test_mongo_read_refreshes_expiration() {
        let window = Duration::from_secs(60);
        let Some(store) = store(window).await else {
            return;
        };

        let deadline = |store: &MongoStore| {
            let collection = store.collection.clone();
            async move {
                collection
                    .find_one(doc! { "key": "stash-test-slide" })
                    .await
                    .unwrap()
                    .and_then(|entry| entry.expiration)
                    .unwrap()
            }
        };

        store.set("stash-test-slide", "value", false).await.unwrap();
        let shortened =
            bson::DateTime::from_system_time(SystemTime::now() + Duration::from_secs(10));
        store
            .collection
            .update_one(
                doc! { "key": "stash-test-slide" },
                doc! { "$set": { "expiration": shortened } },
            )
            .await
            .unwrap();

        // Skip reads leave the deadline alone
        store.get("stash-test-slide", true).await.unwrap();
        assert_eq!(deadline(&store).await, shortened);

        let before = SystemTime::now();
        store.get("stash-test-slide", false).await.unwrap();
        let refreshed = deadline(&store).await.to_system_time();
        assert!(refreshed > before + window - Duration::from_secs(1));
    }
}
