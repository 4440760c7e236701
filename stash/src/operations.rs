use crate::domain::Document;
use crate::ports::{DocumentStore, KeyGenerator};
use shared::config::DocumentConfig;
use shared::{Error, Result};
use std::sync::Arc;

/// Application service that orchestrates document operations.
/// This is the main entry point the transport layers call into.
#[derive(Clone)]
pub struct DocumentOperationsService {
    store: Arc<dyn DocumentStore>,
    key_generator: Arc<dyn KeyGenerator>,
    key_length: usize,
    max_length: usize,
}

impl DocumentOperationsService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        key_generator: Arc<dyn KeyGenerator>,
        key_length: usize,
        max_length: usize,
    ) -> Self {
        Self {
            store,
            key_generator,
            key_length,
            max_length,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Rejects content over the configured size limit (`0` means unlimited)
    pub fn check_length(&self, content: &str) -> Result<()> {
        if self.max_length > 0 && content.len() > self.max_length {
            return Err(Error::TooLarge {
                length: content.len(),
                max: self.max_length,
            });
        }
        Ok(())
    }

    /// Store new content under a freshly minted key.
    ///
    /// Key collisions are not checked; a colliding key overwrites.
    pub async fn create(&self, content: String) -> Result<Document> {
        self.check_length(&content)?;

        let key = self.key_generator.generate(self.key_length)?;
        self.store.set(&key, &content, false).await?;

        tracing::debug!(
            key = %key,
            bytes = content.len(),
            backend = self.store.name(),
            "Stored document"
        );

        Ok(Document::new(key, content))
    }

    /// Fetch a document and slide its expiry forward.
    /// An empty document counts as missing.
    pub async fn fetch(&self, key: &str) -> Result<Document> {
        let data = self.store.get(key, false).await?;
        if data.is_empty() {
            return Err(Error::NotFound);
        }
        Ok(Document::new(key, data))
    }

    /// Store a document that never expires
    pub async fn publish_static(&self, key: &str, content: &str) -> Result<()> {
        self.check_length(content)?;
        self.store.set(key, content, true).await
    }

    /// Read each configured file and publish it under its key.
    pub async fn load_static_documents(&self, documents: &[DocumentConfig]) -> Result<usize> {
        for doc in documents {
            let content = tokio::fs::read_to_string(&doc.path).await.map_err(|e| {
                Error::Internal(format!("failed to read document {}: {}", doc.path, e))
            })?;

            self.publish_static(&doc.key, &content).await?;

            tracing::info!(key = %doc.key, path = %doc.path, "Loaded static document");
        }

        Ok(documents.len())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await
    }
}

impl std::fmt::Debug for DocumentOperationsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentOperationsService")
            .field("store", &self.store.name())
            .field("key_length", &self.key_length)
            .field("max_length", &self.max_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::RandomKeyGenerator;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Write;
    use tokio::sync::Mutex;

    /// Records writes along with their skip flag
    #[derive(Default)]
    struct RecordingStore {
        docs: Mutex<HashMap<String, (String, bool)>>,
        closed: Mutex<bool>,
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn set(&self, key: &str, value: &str, skip_expiration: bool) -> Result<()> {
            self.docs
                .lock()
                .await
                .insert(key.to_string(), (value.to_string(), skip_expiration));
            Ok(())
        }

        async fn get(&self, key: &str, _skip_expiration: bool) -> Result<String> {
            self.docs
                .lock()
                .await
                .get(key)
                .map(|(value, _)| value.clone())
                .ok_or(Error::NotFound)
        }

        async fn close(&self) -> Result<()> {
            *self.closed.lock().await = true;
            Ok(())
        }
    }

    fn service(store: Arc<RecordingStore>, max_length: usize) -> DocumentOperationsService {
        let generator = Arc::new(RandomKeyGenerator::new("abc").unwrap());
        DocumentOperationsService::new(store, generator, 8, max_length)
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let store = Arc::new(RecordingStore::default());
        let ops = service(store.clone(), 100);

        let doc = ops.create("hello".to_string()).await.unwrap();
        assert_eq!(doc.key.len(), 8);

        let fetched = ops.fetch(&doc.key).await.unwrap();
        assert_eq!(fetched.data, "hello");

        // Created documents use the standard expiry
        let docs = store.docs.lock().await;
        assert_eq!(docs.get(&doc.key), Some(&("hello".to_string(), false)));
    }

    #[tokio::test]
    async fn test_create_rejects_oversized_content() {
        let ops = service(Arc::new(RecordingStore::default()), 4);

        let err = ops.create("too long".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::TooLarge { length: 8, max: 4 }));
    }

    #[tokio::test]
    async fn test_zero_max_length_is_unlimited() {
        let ops = service(Arc::new(RecordingStore::default()), 0);
        assert!(ops.create("x".repeat(10_000)).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_missing_and_empty() {
        let store = Arc::new(RecordingStore::default());
        let ops = service(store.clone(), 0);

        assert!(ops.fetch("missing").await.unwrap_err().is_not_found());

        store.set("blank", "", false).await.unwrap();
        assert!(ops.fetch("blank").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_load_static_documents_pins_them() {
        let store = Arc::new(RecordingStore::default());
        let ops = service(store.clone(), 0);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# About").unwrap();

        let docs = vec![DocumentConfig {
            key: "about".to_string(),
            path: file.path().to_string_lossy().into_owned(),
        }];
        assert_eq!(ops.load_static_documents(&docs).await.unwrap(), 1);

        let stored = store.docs.lock().await;
        assert_eq!(stored.get("about"), Some(&("# About".to_string(), true)));
    }

    #[tokio::test]
    async fn test_load_static_documents_missing_file() {
        let ops = service(Arc::new(RecordingStore::default()), 0);
        let docs = vec![DocumentConfig {
            key: "about".to_string(),
            path: "/nonexistent/about.md".to_string(),
        }];

        let err = ops.load_static_documents(&docs).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_store() {
        let store = Arc::new(RecordingStore::default());
        let ops = service(store.clone(), 0);

        ops.shutdown().await.unwrap();
        assert!(*store.closed.lock().await);
    }
}
