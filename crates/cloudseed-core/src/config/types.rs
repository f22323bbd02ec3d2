use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use cloudseed_storage::{RetryConfig, StorageConfig};
use cloudseed_types::error::{Result, SeedError};

use crate::migration::{BucketLocation, MigrationTarget};

/// Legacy placeholder used by older tooling for "not configured".
pub const UNSET_SENTINEL: &str = "N/A";

fn default_db_path() -> String {
    "/tmp/tsdb".to_string()
}

fn default_region() -> String {
    "us-west-2".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Local database directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Prior cloud location, if the database ever had one.
    pub src_bucket: Option<String>,
    pub src_path: Option<String>,
    /// Where the manifest is published.
    pub dest_bucket: Option<String>,
    pub dest_path: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// S3-compatible endpoint override, or `file://<dir>` for a local store.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Bucket holding dbid registrations (default: `dest_bucket`).
    pub registry_bucket: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            src_bucket: None,
            src_path: None,
            dest_bucket: None,
            dest_path: None,
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            registry_bucket: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Values given on the command line; `Some` wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub src_bucket: Option<String>,
    pub src_path: Option<String>,
    pub dest_bucket: Option<String>,
    pub dest_path: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub registry_bucket: Option<String>,
}

fn normalize(value: &mut Option<String>) {
    if value
        .as_deref()
        .is_some_and(|v| v.trim().is_empty() || v.trim() == UNSET_SENTINEL)
    {
        *value = None;
    }
}

impl MigrationConfig {
    pub fn apply_overrides(&mut self, o: ConfigOverrides) {
        fn set(field: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *field = value;
            }
        }
        if let Some(db_path) = o.db_path {
            self.db_path = db_path;
        }
        if let Some(region) = o.region {
            self.region = region;
        }
        set(&mut self.src_bucket, o.src_bucket);
        set(&mut self.src_path, o.src_path);
        set(&mut self.dest_bucket, o.dest_bucket);
        set(&mut self.dest_path, o.dest_path);
        set(&mut self.endpoint, o.endpoint);
        set(&mut self.access_key_id, o.access_key_id);
        set(&mut self.secret_access_key, o.secret_access_key);
        set(&mut self.registry_bucket, o.registry_bucket);
    }

    /// Treat empty and `N/A` values as absent.
    pub fn normalize(&mut self) {
        for field in [
            &mut self.src_bucket,
            &mut self.src_path,
            &mut self.dest_bucket,
            &mut self.dest_path,
            &mut self.endpoint,
            &mut self.access_key_id,
            &mut self.secret_access_key,
            &mut self.registry_bucket,
        ] {
            normalize(field);
        }
    }

    /// Fill credentials from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
    /// when neither half was configured explicitly.
    pub fn apply_env_credentials(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.access_key_id.is_some() || self.secret_access_key.is_some() {
            return;
        }
        self.access_key_id = lookup("AWS_ACCESS_KEY_ID");
        self.secret_access_key = lookup("AWS_SECRET_ACCESS_KEY");
        normalize(&mut self.access_key_id);
        normalize(&mut self.secret_access_key);
    }

    pub fn registry_bucket(&self) -> Option<String> {
        self.registry_bucket.clone().or_else(|| self.dest_bucket.clone())
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            retry: self.retry.clone(),
        }
    }

    /// The orchestrator's view of this configuration. The database directory
    /// must already exist.
    pub fn target(&self) -> Result<MigrationTarget> {
        let db_path = PathBuf::from(&self.db_path);
        match std::fs::metadata(&db_path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(SeedError::Config(format!(
                    "database path '{}' is not a directory",
                    db_path.display()
                )));
            }
            Err(e) => {
                return Err(SeedError::Config(format!(
                    "database path '{}' is not accessible: {e}",
                    db_path.display()
                )));
            }
        }

        let location = |bucket: &Option<String>, path: &Option<String>| {
            bucket.as_ref().map(|bucket| BucketLocation {
                bucket: bucket.clone(),
                path: path.clone().unwrap_or_default(),
            })
        };

        Ok(MigrationTarget {
            db_path,
            source: location(&self.src_bucket, &self.src_path),
            destination: location(&self.dest_bucket, &self.dest_path),
        })
    }
}
