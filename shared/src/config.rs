//! Process configuration.
//!
//! Values are resolved in three layers: built-in defaults, an optional TOML
//! file, then `STASH_*` environment variables.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 7777
//! key_generator = "phonetic"
//! expiration_secs = 86400
//!
//! [storage]
//! type = "redis"
//! host = "localhost"
//!
//! [[documents]]
//! key = "about"
//! path = "about.md"
//! ```

use crate::{Error, ExpirationWindow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const ENV_PREFIX: &str = "STASH_";
const DOCUMENTS_ENV_PREFIX: &str = "STASH_DOCUMENTS_";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    File,
    Redis,
    Memcached,
    Mongodb,
    Postgres,
    S3,
    Memory,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::Redis => "redis",
            StorageKind::Memcached => "memcached",
            StorageKind::Mongodb => "mongodb",
            StorageKind::Postgres => "postgres",
            StorageKind::S3 => "s3",
            StorageKind::Memory => "memory",
        }
    }

    /// Port used when the configuration leaves it unset.
    pub fn default_port(&self) -> u16 {
        match self {
            StorageKind::Redis => 6379,
            StorageKind::Memcached => 11211,
            StorageKind::Mongodb => 27017,
            StorageKind::Postgres => 5432,
            StorageKind::S3 => 9000,
            StorageKind::File | StorageKind::Memory => 0,
        }
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "redis" => Ok(StorageKind::Redis),
            "memcached" => Ok(StorageKind::Memcached),
            "mongodb" => Ok(StorageKind::Mongodb),
            "postgres" => Ok(StorageKind::Postgres),
            "s3" => Ok(StorageKind::S3),
            "memory" => Ok(StorageKind::Memory),
            other => Err(Error::Config(format!("unknown storage type '{other}'"))),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyGeneratorKind {
    Random,
    Phonetic,
}

impl FromStr for KeyGeneratorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(KeyGeneratorKind::Random),
            "phonetic" => Ok(KeyGeneratorKind::Phonetic),
            other => Err(Error::Config(format!("unknown key generator '{other}'"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Connection settings for the selected backend. Fields a backend has no use
/// for are ignored.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub bucket: String,
    pub aws_region: String,
    pub file_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::File,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            bucket: String::new(),
            aws_region: String::new(),
            file_path: Config::DEFAULT_FILE_PATH.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn host_or_default(&self) -> &str {
        if self.host.is_empty() {
            "localhost"
        } else {
            &self.host
        }
    }

    pub fn port_or_default(&self) -> u16 {
        if self.port == 0 {
            self.kind.default_port()
        } else {
            self.port
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// A document loaded from disk at startup and stored without expiry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DocumentConfig {
    pub key: String,
    pub path: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub key_length: usize,
    /// Alphabet for the random generator; empty selects `a`-`z`.
    pub key_space: String,
    pub key_generator: KeyGeneratorKind,
    /// Maximum document size in bytes, `0` disables the limit.
    pub max_length: usize,
    /// Document lifetime, `0` disables expiry. Filesystem and S3 ignore it.
    pub expiration_secs: u64,
    pub operation_timeout_ms: u64,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub documents: Vec<DocumentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            key_length: Self::DEFAULT_KEY_LENGTH,
            key_space: String::new(),
            key_generator: KeyGeneratorKind::Phonetic,
            max_length: Self::DEFAULT_MAX_LENGTH,
            expiration_secs: 0,
            operation_timeout_ms: Self::DEFAULT_OPERATION_TIMEOUT_MS,
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            documents: Vec::new(),
        }
    }
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 7777;
    const DEFAULT_KEY_LENGTH: usize = 10;
    const DEFAULT_MAX_LENGTH: usize = 4_000_000;
    const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5_000;
    const DEFAULT_FILE_PATH: &str = "data";
    const DEFAULT_CONFIG_FILE: &str = "config.toml";

    /// Loads the file named by `STASH_CONFIG` (default `config.toml`) and
    /// applies environment overrides from the running process.
    pub fn load() -> Result<Self> {
        let path = std::env::var("STASH_CONFIG")
            .unwrap_or_else(|_| Self::DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env(std::env::vars())?;
        config.normalize();
        Ok(config)
    }

    /// Reads a TOML file. A missing file yields the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Applies `STASH_*` overrides. Takes the variables explicitly so callers
    /// decide where they come from.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if value.is_empty() {
                continue;
            }

            if let Some(key) = name.strip_prefix(DOCUMENTS_ENV_PREFIX) {
                if !key.is_empty() {
                    self.documents.push(DocumentConfig {
                        key: key.to_string(),
                        path: value,
                    });
                }
                continue;
            }

            let Some(setting) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match setting {
                "HOST" => self.host = value,
                "PORT" => self.port = parse_env(&name, &value)?,
                "KEY_LENGTH" => self.key_length = parse_env(&name, &value)?,
                "KEY_SPACE" => self.key_space = value,
                "KEY_GENERATOR" => self.key_generator = value.parse()?,
                "MAX_LENGTH" => self.max_length = parse_env(&name, &value)?,
                "EXPIRATION_SECS" => self.expiration_secs = parse_env(&name, &value)?,
                "OPERATION_TIMEOUT_MS" => self.operation_timeout_ms = parse_env(&name, &value)?,
                "STORAGE_TYPE" => self.storage.kind = value.parse()?,
                "STORAGE_HOST" => self.storage.host = value,
                "STORAGE_PORT" => self.storage.port = parse_env(&name, &value)?,
                "STORAGE_USERNAME" => self.storage.username = value,
                "STORAGE_PASSWORD" => self.storage.password = value,
                "STORAGE_DATABASE" => self.storage.database = value,
                "STORAGE_BUCKET" => self.storage.bucket = value,
                "STORAGE_AWS_REGION" => self.storage.aws_region = value,
                "STORAGE_FILE_PATH" => self.storage.file_path = value,
                "LOGGING_LEVEL" => self.logging.level = value,
                "LOGGING_FORMAT" => self.logging.format = value.parse()?,
                _ => {}
            }
        }

        Ok(())
    }

    /// Replaces zero or empty values with their defaults.
    pub fn normalize(&mut self) {
        if self.host.is_empty() {
            self.host = Self::DEFAULT_HOST.to_string();
        }
        if self.port == 0 {
            self.port = Self::DEFAULT_PORT;
        }
        if self.key_length == 0 {
            self.key_length = Self::DEFAULT_KEY_LENGTH;
        }
        if self.operation_timeout_ms == 0 {
            self.operation_timeout_ms = Self::DEFAULT_OPERATION_TIMEOUT_MS;
        }
        if self.storage.file_path.is_empty() {
            self.storage.file_path = Self::DEFAULT_FILE_PATH.to_string();
        }
        if self.logging.level.is_empty() {
            self.logging.level = "info".to_string();
        }
    }

    pub fn expiration(&self) -> ExpirationWindow {
        ExpirationWindow::from_secs(self.expiration_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("failed to parse {name}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_file("does-not-exist.toml").unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7777);
        assert_eq!(config.key_length, 10);
        assert_eq!(config.key_generator, KeyGeneratorKind::Phonetic);
        assert_eq!(config.max_length, 4_000_000);
        assert_eq!(config.storage.kind, StorageKind::File);
        assert_eq!(config.storage.file_path, "data");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.documents.is_empty());
        assert!(!config.expiration().is_enabled());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(vars(&[
                ("STASH_HOST", "127.0.0.1"),
                ("STASH_PORT", "8080"),
                ("STASH_KEY_LENGTH", "15"),
                ("STASH_MAX_LENGTH", "5000000"),
                ("STASH_STORAGE_TYPE", "redis"),
                ("STASH_STORAGE_HOST", "localhost"),
                ("STASH_STORAGE_PORT", "6380"),
                ("STASH_LOGGING_LEVEL", "debug"),
                ("STASH_EXPIRATION_SECS", "3600"),
                ("UNRELATED", "ignored"),
            ]))
            .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.key_length, 15);
        assert_eq!(config.max_length, 5_000_000);
        assert_eq!(config.storage.kind, StorageKind::Redis);
        assert_eq!(config.storage.host, "localhost");
        assert_eq!(config.storage.port, 6380);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.expiration().window(),
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_env_documents() {
        let mut config = Config::default();
        config
            .apply_env(vars(&[
                ("STASH_DOCUMENTS_about", "about.md"),
                ("STASH_DOCUMENTS_", "ignored.md"),
            ]))
            .unwrap();

        assert_eq!(
            config.documents,
            vec![DocumentConfig {
                key: "about".to_string(),
                path: "about.md".to_string(),
            }]
        );
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(vars(&[("STASH_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = config
            .apply_env(vars(&[("STASH_STORAGE_TYPE", "cassandra")]))
            .unwrap_err();
        assert!(err.to_string().contains("cassandra"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
host = "192.168.1.1"
port = 9090
key_length = 20
key_generator = "random"
key_space = "abc"

[storage]
type = "mongodb"
host = "mongo.example.com"

[logging]
level = "warn"
format = "json"

[[documents]]
key = "about"
path = "about.md"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.host, "192.168.1.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.key_length, 20);
        assert_eq!(config.key_generator, KeyGeneratorKind::Random);
        assert_eq!(config.key_space, "abc");
        assert_eq!(config.storage.kind, StorageKind::Mongodb);
        assert_eq!(config.storage.host_or_default(), "mongo.example.com");
        assert_eq!(config.storage.port_or_default(), 27017);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.documents.len(), 1);
        // Unset fields keep their defaults
        assert_eq!(config.max_length, 4_000_000);
    }

    #[test]
    fn test_unknown_storage_type_in_file() {
        let err = Config::from_toml_str("[storage]\ntype = \"cassandra\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_normalize_restores_zero_values() {
        let mut config = Config::from_toml_str("port = 0\nkey_length = 0\n").unwrap();
        config.normalize();
        assert_eq!(config.port, 7777);
        assert_eq!(config.key_length, 10);
    }
}
