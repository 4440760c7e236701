use shared::config::StorageKind;

/// A stored text blob and the key it lives under
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub key: String,
    pub data: String,
}

impl Document {
    pub fn new(key: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// How a backend enforces the expiration window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryMechanism {
    /// Documents live until overwritten
    Unsupported,
    /// The backend drops items on its own once their TTL runs out
    NativeTtl,
    /// A deadline is stored next to the value and checked on every read
    StoredDeadline,
}

impl ExpiryMechanism {
    pub fn for_kind(kind: StorageKind) -> Self {
        match kind {
            StorageKind::File | StorageKind::S3 => ExpiryMechanism::Unsupported,
            StorageKind::Redis | StorageKind::Memcached | StorageKind::Memory => {
                ExpiryMechanism::NativeTtl
            }
            StorageKind::Mongodb | StorageKind::Postgres => ExpiryMechanism::StoredDeadline,
        }
    }

    pub fn supports_expiry(&self) -> bool {
        !matches!(self, ExpiryMechanism::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_mechanism_per_backend() {
        assert_eq!(
            ExpiryMechanism::for_kind(StorageKind::File),
            ExpiryMechanism::Unsupported
        );
        assert_eq!(
            ExpiryMechanism::for_kind(StorageKind::S3),
            ExpiryMechanism::Unsupported
        );
        assert_eq!(
            ExpiryMechanism::for_kind(StorageKind::Redis),
            ExpiryMechanism::NativeTtl
        );
        assert_eq!(
            ExpiryMechanism::for_kind(StorageKind::Postgres),
            ExpiryMechanism::StoredDeadline
        );
        assert!(!ExpiryMechanism::for_kind(StorageKind::File).supports_expiry());
        assert!(ExpiryMechanism::for_kind(StorageKind::Mongodb).supports_expiry());
    }
}
