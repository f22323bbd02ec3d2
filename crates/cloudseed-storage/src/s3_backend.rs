use std::io::Read;
use std::time::Duration;

use rusty_s3::actions::S3Action;
use rusty_s3::{Bucket, Credentials, UrlStyle};

use crate::{ObjectStore, RetryConfig};
use cloudseed_types::error::{Result, SeedError};

/// Duration for presigned URL validity.
const PRESIGN_DURATION: Duration = Duration::from_secs(3600);

/// S3-compatible object store. Buckets are resolved per call, so one store
/// serves every bucket reachable through the same endpoint and credentials.
pub struct S3Store {
    endpoint: String,
    region: String,
    credentials: Option<Credentials>,
    agent: ureq::Agent,
    retry: RetryConfig,
}

impl S3Store {
    pub fn new(
        endpoint: &str,
        region: &str,
        credentials: Option<(&str, &str)>,
        retry: RetryConfig,
    ) -> Result<Self> {
        let store = Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            region: region.to_string(),
            credentials: credentials.map(|(id, secret)| Credentials::new(id, secret)),
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(30))
                .timeout_read(Duration::from_secs(300))
                .timeout_write(Duration::from_secs(300))
                .build(),
            retry,
        };
        // Fail on a malformed endpoint now rather than on the first request.
        store.bucket("probe")?;
        Ok(store)
    }

    fn bucket(&self, name: &str) -> Result<Bucket> {
        let base_url = self.endpoint.parse().map_err(|e| {
            SeedError::Config(format!("invalid S3 endpoint URL '{}': {e}", self.endpoint))
        })?;
        Bucket::new(base_url, UrlStyle::Path, name.to_string(), self.region.clone())
            .map_err(|e| SeedError::Config(format!("invalid S3 bucket '{name}': {e}")))
    }

    #[allow(clippy::result_large_err)]
    fn retry_call<T>(
        &self,
        op_name: &str,
        f: impl Fn() -> std::result::Result<T, ureq::Error>,
    ) -> std::result::Result<T, ureq::Error> {
        crate::retry::retry_http(&self.retry, op_name, "S3", f)
    }
}

impl ObjectStore for S3Store {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let b = self.bucket(bucket)?;
        let url = b
            .head_object(self.credentials.as_ref(), key)
            .sign(PRESIGN_DURATION);

        match self.retry_call(&format!("HEAD {bucket}/{key}"), || {
            self.agent.head(url.as_str()).call()
        }) {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(e) => Err(SeedError::Remote(format!("S3 HEAD {bucket}/{key}: {e}"))),
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let b = self.bucket(bucket)?;
        let url = b
            .get_object(self.credentials.as_ref(), key)
            .sign(PRESIGN_DURATION);

        match self.retry_call(&format!("GET {bucket}/{key}"), || {
            self.agent.get(url.as_str()).call()
        }) {
            Ok(resp) => {
                let mut buf = Vec::new();
                resp.into_reader().read_to_end(&mut buf).map_err(|e| {
                    SeedError::Remote(format!("S3 GET {bucket}/{key}: body read: {e}"))
                })?;
                Ok(Some(buf))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(SeedError::Remote(format!("S3 GET {bucket}/{key}: {e}"))),
        }
    }

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        let b = self.bucket(bucket)?;
        let url = b
            .put_object(self.credentials.as_ref(), key)
            .sign(PRESIGN_DURATION);

        self.retry_call(&format!("PUT {bucket}/{key}"), || {
            self.agent.put(url.as_str()).send_bytes(data)
        })
        .map_err(|e| SeedError::Remote(format!("S3 PUT {bucket}/{key}: {e}")))?;
        tracing::debug!("S3 PUT {bucket}/{key}: {} bytes", data.len());
        Ok(())
    }
}
