use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use cloudseed_storage::{IdRegistry, ObjectStore};
use cloudseed_types::dbid::Dbid;
use cloudseed_types::error::{Result, SeedError};

use crate::artifact::{ArtifactStore, FsArtifactStore, ReadFn, WriteFn};
use crate::migration::{BucketLocation, Collaborators, IdSource, Migration, MigrationTarget};

/// Ordered record of side-effecting calls across all doubles.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }
}

/// In-memory object store keyed by `(bucket, key)`. Buckets must be created
/// up front; operations on an unknown bucket fail like a real service would.
pub struct MemoryObjectStore {
    buckets: Mutex<HashSet<String>>,
    data: Mutex<HashMap<(String, String), Vec<u8>>>,
    fail_exists: Mutex<bool>,
    fail_put: Mutex<bool>,
    log: CallLog,
}

impl MemoryObjectStore {
    pub fn new(log: CallLog, buckets: &[&str]) -> Self {
        Self {
            buckets: Mutex::new(buckets.iter().map(|b| b.to_string()).collect()),
            data: Mutex::new(HashMap::new()),
            fail_exists: Mutex::new(false),
            fail_put: Mutex::new(false),
            log,
        }
    }

    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        self.data
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.data
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn fail_exists(&self) {
        *self.fail_exists.lock().unwrap() = true;
    }

    pub fn fail_put(&self) {
        *self.fail_put.lock().unwrap() = true;
    }

    fn check_bucket(&self, bucket: &str) -> Result<()> {
        if self.buckets.lock().unwrap().contains(bucket) {
            Ok(())
        } else {
            Err(SeedError::Remote(format!("no such bucket: {bucket}")))
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        self.log.push(format!("exists {bucket}/{key}"));
        if *self.fail_exists.lock().unwrap() {
            return Err(SeedError::Remote("injected HEAD failure".into()));
        }
        self.check_bucket(bucket)?;
        Ok(self.object(bucket, key).is_some())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_bucket(bucket)?;
        Ok(self.object(bucket, key))
    }

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        self.log.push(format!("put {bucket}/{key}"));
        if *self.fail_put.lock().unwrap() {
            return Err(SeedError::Remote("injected PUT failure".into()));
        }
        self.check_bucket(bucket)?;
        self.insert(bucket, key, data);
        Ok(())
    }
}

/// Records registrations; optionally fails them.
pub struct MemoryRegistry {
    entries: Mutex<Vec<(Dbid, String)>>,
    fail: bool,
    log: CallLog,
}

impl MemoryRegistry {
    pub fn new(log: CallLog) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail: false,
            log,
        }
    }

    pub fn failing(log: CallLog) -> Self {
        Self {
            fail: true,
            ..Self::new(log)
        }
    }

    pub fn entries(&self) -> Vec<(Dbid, String)> {
        self.entries.lock().unwrap().clone()
    }
}

impl IdRegistry for MemoryRegistry {
    fn register_dbid(&self, dbid: &Dbid, dest_data_path: &str) -> Result<()> {
        self.log.push(format!("register {dbid}"));
        if self.fail {
            return Err(SeedError::Registry("registry unavailable".into()));
        }
        self.entries
            .lock()
            .unwrap()
            .push((dbid.clone(), dest_data_path.to_string()));
        Ok(())
    }
}

/// Always hands out the same raw id.
pub struct FixedIdSource(pub String);

impl IdSource for FixedIdSource {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

/// Real filesystem underneath, with call logging, optional corruption of the
/// cloud manifest on write, and optional rename failure.
pub struct RecordingArtifacts {
    inner: FsArtifactStore,
    log: CallLog,
    corrupt_writes: bool,
    fail_rename: bool,
}

impl RecordingArtifacts {
    pub fn new(log: CallLog) -> Self {
        Self {
            inner: FsArtifactStore,
            log,
            corrupt_writes: false,
            fail_rename: false,
        }
    }

    pub fn corrupting(log: CallLog) -> Self {
        Self {
            corrupt_writes: true,
            ..Self::new(log)
        }
    }

    pub fn failing_rename(log: CallLog) -> Self {
        Self {
            fail_rename: true,
            ..Self::new(log)
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ArtifactStore for RecordingArtifacts {
    fn create_and_write(&self, path: &Path, writer: &mut WriteFn<'_>) -> Result<()> {
        self.log.push(format!("create {}", file_name(path)));
        if self.corrupt_writes {
            // Flip every byte after the block header of the first record.
            let mut buf = Vec::new();
            writer(&mut buf).map_err(SeedError::Io)?;
            for b in buf.iter_mut().skip(7) {
                *b ^= 0xff;
            }
            return self
                .inner
                .create_and_write(path, &mut |w: &mut dyn Write| w.write_all(&buf));
        }
        self.inner.create_and_write(path, writer)
    }

    fn open_and_read(&self, path: &Path, reader: &mut ReadFn<'_>) -> Result<()> {
        self.log.push(format!("read {}", file_name(path)));
        self.inner.open_and_read(path, reader)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.log.push(format!("read {}", file_name(path)));
        self.inner.read_to_string(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.log
            .push(format!("rename {} {}", file_name(from), file_name(to)));
        if self.fail_rename {
            return Err(SeedError::local(
                "rename",
                from,
                std::io::Error::other("injected rename failure"),
            ));
        }
        self.inner.rename(from, to)
    }
}

/// A migration against in-memory remote doubles and a temp database dir.
pub struct Harness {
    pub db_dir: tempfile::TempDir,
    pub log: CallLog,
    pub objects: Arc<MemoryObjectStore>,
    pub registry: Arc<MemoryRegistry>,
}

pub const DEST_BUCKET: &str = "dest-bucket";
pub const DEST_PATH: &str = "db/new";
pub const TEST_DBID: &str = "4b1e6f5c-2f3d-4c6b-9a0e-0d7f3c9b2a11";

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            db_dir: tempfile::tempdir().unwrap(),
            objects: Arc::new(MemoryObjectStore::new(log.clone(), &[DEST_BUCKET])),
            registry: Arc::new(MemoryRegistry::new(log.clone())),
            log,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir.path().to_path_buf()
    }

    pub fn target(&self) -> MigrationTarget {
        MigrationTarget {
            db_path: self.db_path(),
            source: None,
            destination: Some(BucketLocation {
                bucket: DEST_BUCKET.into(),
                path: DEST_PATH.into(),
            }),
        }
    }

    pub fn migration(&self) -> Migration {
        self.migration_with(
            self.target(),
            Arc::new(RecordingArtifacts::new(self.log.clone())),
            &format!("{TEST_DBID}\n"),
        )
    }

    pub fn migration_with(
        &self,
        target: MigrationTarget,
        artifacts: Arc<dyn ArtifactStore>,
        raw_id: &str,
    ) -> Migration {
        let registry: Arc<dyn IdRegistry> = self.registry.clone();
        Migration::new(
            target,
            Collaborators {
                artifacts,
                objects: self.objects.clone(),
                registry,
                ids: Arc::new(FixedIdSource(raw_id.to_string())),
            },
        )
    }
}
