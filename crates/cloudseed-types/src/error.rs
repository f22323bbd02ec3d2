use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SeedError>;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("'{0}' already exists")]
    AlreadyExists(PathBuf),

    #[error("'{0}' not found")]
    NotFound(PathBuf),

    #[error("cannot {op} '{path}': {source}")]
    LocalIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("object '{key}' already exists in bucket '{bucket}'")]
    RemoteConflict { bucket: String, key: String },

    #[error("remote store error: {0}")]
    Remote(String),

    #[error("id registry error: {0}")]
    Registry(String),

    #[error("step out of order: {0}")]
    StepOrder(String),
}

impl SeedError {
    /// Classify an I/O error against the path it happened on, keeping
    /// `AlreadyExists` and `NotFound` as distinct variants.
    pub fn local(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::AlreadyExists => SeedError::AlreadyExists(path),
            std::io::ErrorKind::NotFound => SeedError::NotFound(path),
            _ => SeedError::LocalIo { op, path, source },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SeedError::RemoteConflict { .. })
    }
}
