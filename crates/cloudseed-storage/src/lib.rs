pub mod local_backend;
pub mod registry;
pub mod retry;
pub mod s3_backend;

use std::path::Path;

use serde::{Deserialize, Serialize};

use cloudseed_types::error::{Result, SeedError};

pub use registry::{BucketRegistry, IdRegistry};

/// Remote object store addressed by `(bucket, key)`.
///
/// `put` and `put_file` overwrite unconditionally; any "don't clobber"
/// policy belongs to the caller.
pub trait ObjectStore: Send + Sync {
    /// Side-effect-free existence probe. Transport failures are errors,
    /// never `Ok(false)`.
    fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()>;

    /// Upload the current contents of a local file.
    fn put_file(&self, source: &Path, bucket: &str, key: &str) -> Result<()> {
        let data = std::fs::read(source).map_err(|e| SeedError::local("read", source, e))?;
        self.put(bucket, key, &data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Everything needed to construct an [`ObjectStore`].
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// `file://<dir>` or an absolute path selects the local-directory store;
    /// anything else is an S3-compatible endpoint URL. `None` means AWS S3
    /// in `region`.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub retry: RetryConfig,
}

impl StorageConfig {
    /// The endpoint actually used for S3 requests.
    pub fn s3_endpoint(&self) -> String {
        match &self.endpoint {
            Some(ep) => ep.clone(),
            None => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }

    fn local_root(&self) -> Option<&str> {
        let ep = self.endpoint.as_deref()?;
        if let Some(path) = ep.strip_prefix("file://") {
            Some(path)
        } else if ep.starts_with('/') {
            Some(ep)
        } else {
            None
        }
    }
}

/// Build an object store from configuration.
pub fn store_from_config(cfg: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    if let Some(root) = cfg.local_root() {
        tracing::debug!("using local object store at {root}");
        return Ok(Box::new(local_backend::LocalStore::new(root)?));
    }

    let credentials = match (&cfg.access_key_id, &cfg.secret_access_key) {
        (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
        (None, None) => None,
        _ => {
            return Err(SeedError::Config(
                "both access key id and secret access key must be set".into(),
            ));
        }
    };
    let endpoint = cfg.s3_endpoint();
    tracing::debug!("using S3 endpoint {endpoint} in region {}", cfg.region);
    Ok(Box::new(s3_backend::S3Store::new(
        &endpoint,
        &cfg.region,
        credentials,
        cfg.retry.clone(),
    )?))
}

/// Join a path prefix and an object name into a `/`-separated key.
pub fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
