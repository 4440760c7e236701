use async_trait::async_trait;
use shared::{Error, Result};
use stash::ports::DocumentStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const NAME: &str = "file";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One flat file per document, named by the hex MD5 digest of the key and
/// holding the raw value. Documents never expire.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens `root`, creating it (owner-only on Unix) if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&root).map_err(|e| {
            Error::unavailable(NAME, format!("cannot create {}: {}", root.display(), e))
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(digest(key))
    }
}

fn digest(key: &str) -> String {
    format!("{:x}", md5::compute(key.as_bytes()))
}

#[async_trait]
impl DocumentStore for FileStore {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str, _skip_expiration: bool) -> Result<()> {
        let dst = self.path_for(key);
        // Readers must never see a half-written file
        let tmp = self.root.join(format!(
            ".{}.{}.{}.tmp",
            digest(key),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = tokio::fs::write(&tmp, value.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::backend(NAME, e));
        }

        if let Err(e) = tokio::fs::rename(&tmp, &dst).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::backend(NAME, e));
        }

        Ok(())
    }

    async fn get(&self, key: &str, _skip_expiration: bool) -> Result<String> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(value),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Error::backend(NAME, e)),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
