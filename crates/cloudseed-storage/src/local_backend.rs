use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::ObjectStore;
use cloudseed_types::error::{Result, SeedError};

/// Object store over a local directory: `<root>/<bucket>/<key>`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: &str) -> Result<Self> {
        let root_path = PathBuf::from(root);
        // Canonicalize if the path already exists for clearer errors and
        // correct behavior with symlinked roots.
        let root = if root_path.exists() {
            fs::canonicalize(&root_path).map_err(|e| SeedError::local("resolve", &root_path, e))?
        } else {
            root_path
        };
        Ok(Self { root })
    }

    fn validate_bucket(bucket: &str) -> Result<()> {
        if bucket.is_empty()
            || bucket == "."
            || bucket == ".."
            || bucket.contains('/')
            || bucket.contains('\\')
        {
            return Err(SeedError::Config(format!("unsafe bucket name: '{bucket}'")));
        }
        Ok(())
    }

    /// Reject object keys that could escape the bucket directory.
    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(SeedError::InvalidFormat("unsafe object key: empty".into()));
        }
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(SeedError::InvalidFormat(format!(
                "unsafe object key: absolute path '{key}'"
            )));
        }
        if key.contains('\\') {
            return Err(SeedError::InvalidFormat(format!(
                "unsafe object key: contains backslash '{key}'"
            )));
        }
        if Path::new(key)
            .components()
            .any(|c| c == Component::ParentDir)
        {
            return Err(SeedError::InvalidFormat(format!(
                "unsafe object key: parent traversal '{key}'"
            )));
        }
        Ok(())
    }

    fn resolve(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        Self::validate_bucket(bucket)?;
        Self::validate_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    /// Write to a temp file in the same directory, then rename into place so
    /// readers never see a partial object.
    fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ObjectStore for LocalStore {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = self.resolve(bucket, key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SeedError::Remote(format!("stat {}: {e}", path.display()))),
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(bucket, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SeedError::Remote(format!("read {}: {e}", path.display()))),
        }
    }

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(bucket, key)?;
        let result = match Self::atomic_write(&path, data) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => path
                .parent()
                .map(fs::create_dir_all)
                .transpose()
                .and_then(|_| Self::atomic_write(&path, data)),
            other => other,
        };
        result.map_err(|e| SeedError::Remote(format!("write {}: {e}", path.display())))
    }
}
