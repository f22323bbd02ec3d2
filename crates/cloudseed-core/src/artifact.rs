//! Local filesystem capabilities the bootstrap needs, behind a trait so the
//! orchestrator can be driven against test doubles.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use cloudseed_types::error::{Result, SeedError};

pub type WriteFn<'a> = dyn FnMut(&mut dyn Write) -> std::io::Result<()> + 'a;
pub type ReadFn<'a> = dyn FnMut(&mut dyn Read) -> Result<()> + 'a;

pub trait ArtifactStore: Send + Sync {
    /// Create `path` exclusively, stream bytes into it through `writer`, and
    /// make them durable before returning. An occupied path fails with
    /// [`SeedError::AlreadyExists`] and is left untouched.
    fn create_and_write(&self, path: &Path, writer: &mut WriteFn<'_>) -> Result<()>;

    /// Open an existing file for sequential reading.
    fn open_and_read(&self, path: &Path, reader: &mut ReadFn<'_>) -> Result<()>;

    /// Whole file as text. Trimming is left to the caller.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace `to` with `from` in one step; `from` is gone afterwards.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// [`ArtifactStore`] over `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifactStore;

impl ArtifactStore for FsArtifactStore {
    fn create_and_write(&self, path: &Path, writer: &mut WriteFn<'_>) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| SeedError::local("create", path, e))?;
        let mut out = BufWriter::new(file);
        writer(&mut out).map_err(|e| SeedError::local("write", path, e))?;
        let file = out
            .into_inner()
            .map_err(|e| SeedError::local("flush", path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| SeedError::local("sync", path, e))?;
        Ok(())
    }

    fn open_and_read(&self, path: &Path, reader: &mut ReadFn<'_>) -> Result<()> {
        let file = File::open(path).map_err(|e| SeedError::local("open", path, e))?;
        // Unattributed read failures from the callback get this file's path.
        reader(&mut BufReader::new(file)).map_err(|e| match e {
            SeedError::Io(source) => SeedError::local("read", path, source),
            other => other,
        })
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| SeedError::local("read", path, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| SeedError::local("rename", from, e))?;
        match to.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                sync_dir(dir).map_err(|e| SeedError::local("sync", dir, e))
            }
            _ => Ok(()),
        }
    }
}

/// Persist a directory entry so a rename inside it survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::CloudManifest;

    #[test]
    fn create_and_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CLOUDMANIFEST");
        FsArtifactStore
            .create_and_write(&path, &mut |w| w.write_all(b"bytes"))
            .unwrap();

        let mut got = Vec::new();
        FsArtifactStore
            .open_and_read(&path, &mut |r| {
                r.read_to_end(&mut got)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(got, b"bytes");
    }

    #[test]
    fn create_refuses_occupied_path_and_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CLOUDMANIFEST");
        fs::write(&path, b"existing").unwrap();

        let mut called = false;
        let err = FsArtifactStore
            .create_and_write(&path, &mut |w| {
                called = true;
                w.write_all(b"new")
            })
            .unwrap_err();
        assert!(matches!(err, SeedError::AlreadyExists(_)));
        assert!(!called);
        assert_eq!(fs::read(&path).unwrap(), b"existing");
    }

    #[test]
    fn writer_error_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IDENTITY.tmp");
        let err = FsArtifactStore
            .create_and_write(&path, &mut |_| {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            })
            .unwrap_err();
        assert!(matches!(err, SeedError::LocalIo { op: "write", .. }), "{err}");
    }

    #[test]
    fn read_failure_inside_reader_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CLOUDMANIFEST");
        fs::write(&path, b"bytes").unwrap();

        let err = FsArtifactStore
            .open_and_read(&path, &mut |_| Err(std::io::Error::other("bad sector").into()))
            .unwrap_err();
        match err {
            SeedError::LocalIo { op, path: p, .. } => {
                assert_eq!(op, "read");
                assert_eq!(p, path);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reader_format_errors_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CLOUDMANIFEST");
        fs::write(&path, b"bytes").unwrap();

        let err = FsArtifactStore
            .open_and_read(&path, &mut |r| CloudManifest::read_from(r).map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, SeedError::InvalidFormat(_)), "{err}");
    }

    #[test]
    fn open_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsArtifactStore
            .open_and_read(&dir.path().join("absent"), &mut |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, SeedError::NotFound(_)));
    }

    #[test]
    fn rename_promotes_and_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("IDENTITY.tmp");
        let fin = dir.path().join("IDENTITY");
        fs::write(&fin, b"old-id").unwrap();
        fs::write(&tmp, b"new-id").unwrap();

        FsArtifactStore.rename(&tmp, &fin).unwrap();
        assert!(!tmp.exists());
        assert_eq!(FsArtifactStore.read_to_string(&fin).unwrap(), "new-id");
    }

    #[test]
    fn rename_missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsArtifactStore
            .rename(&dir.path().join("nope"), &dir.path().join("IDENTITY"))
            .unwrap_err();
        assert!(matches!(err, SeedError::NotFound(_)));
    }
}
