//! Well-known file names inside a database directory and the bucket.

use std::path::{Path, PathBuf};

pub const CLOUD_MANIFEST_FILE: &str = "CLOUDMANIFEST";
pub const IDENTITY_FILE: &str = "IDENTITY";
pub const IDENTITY_TMP_FILE: &str = "IDENTITY.tmp";

pub fn cloud_manifest_file(db_path: &Path) -> PathBuf {
    db_path.join(CLOUD_MANIFEST_FILE)
}

pub fn identity_file(db_path: &Path) -> PathBuf {
    db_path.join(IDENTITY_FILE)
}

pub fn identity_tmp_file(db_path: &Path) -> PathBuf {
    db_path.join(IDENTITY_TMP_FILE)
}

/// Object key of the cloud manifest under a destination path prefix.
pub fn cloud_manifest_key(object_prefix: &str) -> String {
    cloudseed_storage::object_key(object_prefix, CLOUD_MANIFEST_FILE)
}
