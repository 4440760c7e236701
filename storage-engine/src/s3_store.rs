use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use shared::config::StorageConfig;
use shared::{Error, Result};
use stash::ports::DocumentStore;
use tracing::info;

const NAME: &str = "s3";
const DEFAULT_BUCKET: &str = "stash";
const DEFAULT_REGION: &str = "us-east-1";
const MAX_ATTEMPTS: u32 = 3;

/// S3-compatible object storage (AWS, MinIO). Objects are stored under the
/// document key and never expire.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Connects with static credentials and path-style addressing, then
    /// makes sure the bucket exists.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let endpoint = format!(
            "http://{}:{}",
            config.host_or_default(),
            config.port_or_default()
        );
        let region = if config.aws_region.is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            config.aws_region.clone()
        };
        let bucket = if config.bucket.is_empty() {
            DEFAULT_BUCKET.to_string()
        } else {
            config.bucket.clone()
        };

        let credentials = Credentials::new(
            config.username.clone(),
            config.password.clone(),
            None,
            None,
            "stash-config",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .endpoint_url(&endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
            .build();
        let client = Client::from_conf(s3_config);

        client
            .list_buckets()
            .send()
            .await
            .map_err(|e| Error::unavailable(NAME, DisplayErrorContext(e)))?;

        match client.create_bucket().bucket(&bucket).send().await {
            Ok(_) => info!(bucket = %bucket, "Created S3 bucket"),
            Err(e) => {
                let exists = e.as_service_error().is_some_and(|service| {
                    service.is_bucket_already_owned_by_you() || service.is_bucket_already_exists()
                });
                if !exists {
                    return Err(Error::unavailable(NAME, DisplayErrorContext(e)));
                }
            }
        }

        info!(endpoint = %endpoint, bucket = %bucket, "Connected to S3");

        Ok(Self { client, bucket })
    }
}

#[async_trait]
impl DocumentStore for S3Store {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str, _skip_expiration: bool) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/plain; charset=utf-8")
            .body(ByteStream::from(value.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|e| Error::backend(NAME, DisplayErrorContext(e).to_string()))?;

        Ok(())
    }

    async fn get(&self, key: &str, _skip_expiration: bool) -> Result<String> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => {
                return Err(Error::NotFound);
            }
            Err(e) => return Err(Error::backend(NAME, DisplayErrorContext(e).to_string())),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Error::backend(NAME, e))?
            .into_bytes();

        String::from_utf8(bytes.to_vec()).map_err(|e| Error::backend(NAME, e))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env;
    use shared::config::StorageKind;

    #[tokio::test]
    #[ignore = "requires an S3-compatible server (STASH_TEST_S3_HOST)"]
    async fn test_s3_set_and_get() {
        let Some(config) = test_env::storage_config(StorageKind::S3) else {
            return;
        };
        let store = S3Store::connect(&config).await.unwrap();

        store.set("stash-test-key", "value", false).await.unwrap();
        assert_eq!(store.get("stash-test-key", false).await.unwrap(), "value");

        store.set("stash-test-key", "updated", true).await.unwrap();
        assert_eq!(store.get("stash-test-key", true).await.unwrap(), "updated");

        let err = store.get("stash-test-missing", false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires an S3-compatible server (STASH_TEST_S3_HOST)"]
    async fn test_s3_existing_bucket_is_reused() {
        let Some(config) = test_env::storage_config(StorageKind::S3) else {
            return;
        };

        S3Store::connect(&config).await.unwrap();
        // Second connect hits the already-owned bucket path
        let store = S3Store::connect(&config).await.unwrap();
        store.set("stash-test-again", "value", false).await.unwrap();
    }
}
