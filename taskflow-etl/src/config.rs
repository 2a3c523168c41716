//! ETL configuration loaded from YAML.

use crate::errors::ConfigError;
use crate::model::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where fetched tables are cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheConfig {
    /// Process-local cache, lost on exit.
    Memory,
    /// One JSON file per fingerprint under `path`.
    Directory {
        /// Cache directory.
        path: PathBuf,
    },
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::Directory {
            path: PathBuf::from("data/.cache"),
        }
    }
}

/// Where written datasets are uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadConfig {
    /// A local directory standing in for the bucket.
    Directory {
        /// Bucket directory.
        root: PathBuf,
    },
    /// An HTTP object store accepting `PUT {endpoint}/{bucket}/{object}`.
    Http {
        /// Store base URL.
        endpoint: String,
        /// Bucket name.
        bucket: String,
        /// Environment variable holding the bearer token.
        #[serde(default)]
        token_env: Option<String>,
        /// Request timeout.
        #[serde(default = "default_upload_timeout")]
        timeout_seconds: u64,
    },
}

fn default_upload_timeout() -> u64 {
    300
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::Directory {
            root: PathBuf::from("bucket/ny-taxi-gcs"),
        }
    }
}

/// ETL configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Base URL of the published datasets; `file://` URLs read local files.
    pub base_url: String,
    /// Root of the local output tree.
    pub data_dir: PathBuf,
    /// Fetch cache backend.
    pub cache: CacheConfig,
    /// Attempt budget of the fetch task.
    pub fetch_attempts: u32,
    /// Delay between fetch attempts.
    pub fetch_retry_delay_ms: u64,
    /// HTTP timeout of one fetch attempt.
    pub fetch_timeout_seconds: u64,
    /// How long a fetched table stays cached.
    pub cache_ttl_seconds: u64,
    /// Upload target.
    pub upload: UploadConfig,
    /// Months processed at the same time.
    pub concurrency: usize,
    /// Deadline of one month's pipeline run.
    pub iteration_timeout_seconds: Option<u64>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from("data"),
            cache: CacheConfig::default(),
            fetch_attempts: 3,
            fetch_retry_delay_ms: 0,
            fetch_timeout_seconds: 120,
            cache_ttl_seconds: 86_400,
            upload: UploadConfig::default(),
            concurrency: 1,
            iteration_timeout_seconds: None,
        }
    }
}

impl EtlConfig {
    /// Reads and validates the YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parses and validates YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".to_string()));
        }
        if self.fetch_attempts == 0 {
            return Err(ConfigError::Invalid("fetch_attempts must be at least 1".to_string()));
        }
        if self.cache_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("cache_ttl_seconds must be positive".to_string()));
        }
        if self.iteration_timeout_seconds == Some(0) {
            return Err(ConfigError::Invalid(
                "iteration_timeout_seconds must be positive".to_string(),
            ));
        }
        if let UploadConfig::Http {
            endpoint, bucket, ..
        } = &self.upload
        {
            if endpoint.trim().is_empty() || bucket.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "http upload needs an endpoint and a bucket".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Returns true if datasets are downloaded over HTTP.
    pub fn fetches_over_http(&self) -> bool {
        self.base_url.starts_with("http://") || self.base_url.starts_with("https://")
    }

    /// Fetch request timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Per-month deadline, if any.
    pub fn iteration_timeout(&self) -> Option<Duration> {
        self.iteration_timeout_seconds.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = EtlConfig::from_yaml("{}").unwrap();
        assert_eq!(config, EtlConfig::default());
        assert_eq!(config.fetch_attempts, 3);
        assert_eq!(config.cache_ttl_seconds, 86_400);
        assert!(config.fetches_over_http());
    }

    #[test]
    fn test_parse_full() {
        let yaml = r"
base_url: file:///srv/nyc-tlc
data_dir: out
cache:
  kind: memory
fetch_attempts: 5
fetch_retry_delay_ms: 250
cache_ttl_seconds: 3600
upload:
  kind: http
  endpoint: http://localhost:9000
  bucket: ny-taxi
  token_env: STORE_TOKEN
concurrency: 2
iteration_timeout_seconds: 600
";
        let config = EtlConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.cache, CacheConfig::Memory);
        assert_eq!(config.fetch_attempts, 5);
        assert_eq!(
            config.upload,
            UploadConfig::Http {
                endpoint: "http://localhost:9000".to_string(),
                bucket: "ny-taxi".to_string(),
                token_env: Some("STORE_TOKEN".to_string()),
                timeout_seconds: 300,
            }
        );
        assert_eq!(config.iteration_timeout(), Some(Duration::from_secs(600)));
        assert!(!config.fetches_over_http());
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            EtlConfig::from_yaml("fetch_attempts: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EtlConfig::from_yaml("cache_ttl_seconds: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EtlConfig::from_yaml("upload: {kind: http, endpoint: '', bucket: b}"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EtlConfig::from_yaml("cache: {kind: redis}"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EtlConfig::load(dir.path().join("etl.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
