use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ObjectStore;
use cloudseed_types::dbid::Dbid;
use cloudseed_types::error::{Result, SeedError};

const DBID_REGISTRY_PREFIX: &str = ".dbid/";

/// External mapping from a database id to the cloud path holding its data.
pub trait IdRegistry: Send + Sync {
    fn register_dbid(&self, dbid: &Dbid, dest_data_path: &str) -> Result<()>;
}

/// Registry entry stored as JSON at `.dbid/<dbid>`.
#[derive(Debug, Serialize, Deserialize)]
struct DbidRecord {
    dbid: String,
    dirname: String,
    hostname: String,
    registered_at: String,
}

/// Registry kept as objects in a bucket of the destination object store.
pub struct BucketRegistry {
    store: Arc<dyn ObjectStore>,
    bucket: Option<String>,
}

impl BucketRegistry {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: Option<String>) -> Self {
        Self { store, bucket }
    }

    pub fn registry_key(dbid: &Dbid) -> String {
        format!("{DBID_REGISTRY_PREFIX}{dbid}")
    }

    fn bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| SeedError::Config("id registry bucket is not configured".into()))
    }

    /// Look up the data path registered for `dbid`.
    pub fn resolve_dbid(&self, dbid: &Dbid) -> Result<Option<String>> {
        let bucket = self.bucket()?;
        let key = Self::registry_key(dbid);
        let Some(data) = self
            .store
            .get(bucket, &key)
            .map_err(|e| SeedError::Registry(format!("lookup {dbid}: {e}")))?
        else {
            return Ok(None);
        };
        let record: DbidRecord = serde_json::from_slice(&data)
            .map_err(|e| SeedError::Registry(format!("malformed entry {key}: {e}")))?;
        Ok(Some(record.dirname))
    }
}

impl IdRegistry for BucketRegistry {
    fn register_dbid(&self, dbid: &Dbid, dest_data_path: &str) -> Result<()> {
        let bucket = self.bucket()?;
        let record = DbidRecord {
            dbid: dbid.to_string(),
            dirname: dest_data_path.to_string(),
            hostname: hostname(),
            registered_at: Utc::now().to_rfc3339(),
        };
        let data = serde_json::to_vec(&record)
            .map_err(|e| SeedError::Registry(format!("serialize entry: {e}")))?;
        let key = Self::registry_key(dbid);
        self.store
            .put(bucket, &key, &data)
            .map_err(|e| SeedError::Registry(format!("register {dbid}: {e}")))?;
        tracing::debug!("registered dbid {dbid} -> {dest_data_path} at {bucket}/{key}");
        Ok(())
    }
}

/// Return the system hostname, or `"unknown"` if it cannot be determined.
fn hostname() -> String {
    #[cfg(unix)]
    {
        nix::unistd::gethostname()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".into())
    }

    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown".into())
    }
}
