//! Migration bootstrap: create and verify a local cloud manifest, publish it
//! to the destination bucket, then mint a new database identity and register
//! it.
//!
//! Steps run strictly in order. The first failure stops the run and leaves
//! the state machine in [`MigrationState::Failed`]; nothing already done is
//! rolled back (an uploaded manifest stays uploaded if registration fails).
//!
//! The remote existence probe and the following upload are two separate
//! calls. Another writer targeting the same key between them is not
//! detected.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use cloudseed_storage::{IdRegistry, ObjectStore};
use cloudseed_types::dbid::Dbid;
use cloudseed_types::error::{Result, SeedError};

use crate::artifact::ArtifactStore;
use crate::manifest::CloudManifest;
use crate::paths;

/// A bucket plus the path prefix inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocation {
    pub bucket: String,
    pub path: String,
}

impl fmt::Display for BucketLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.path.trim_matches('/'))
    }
}

/// Where the database is and where it is going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTarget {
    pub db_path: PathBuf,
    /// Prior cloud location; `None` for a database that never had one.
    pub source: Option<BucketLocation>,
    /// Required by the upload and registration steps.
    pub destination: Option<BucketLocation>,
}

impl MigrationTarget {
    pub fn manifest_path(&self) -> PathBuf {
        paths::cloud_manifest_file(&self.db_path)
    }

    pub fn identity_path(&self) -> PathBuf {
        paths::identity_file(&self.db_path)
    }

    pub fn identity_tmp_path(&self) -> PathBuf {
        paths::identity_tmp_file(&self.db_path)
    }

    fn destination(&self) -> Result<&BucketLocation> {
        self.destination
            .as_ref()
            .ok_or_else(|| SeedError::Config("destination bucket is not configured".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationStep {
    CreateManifest,
    VerifyManifest,
    UploadManifest,
    WriteIdentity,
    RegisterIdentity,
}

impl MigrationStep {
    pub const ALL: [MigrationStep; 5] = [
        MigrationStep::CreateManifest,
        MigrationStep::VerifyManifest,
        MigrationStep::UploadManifest,
        MigrationStep::WriteIdentity,
        MigrationStep::RegisterIdentity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MigrationStep::CreateManifest => "create-manifest",
            MigrationStep::VerifyManifest => "verify-manifest",
            MigrationStep::UploadManifest => "upload-manifest",
            MigrationStep::WriteIdentity => "write-identity",
            MigrationStep::RegisterIdentity => "register-identity",
        }
    }

    /// Process exit code reported when this step fails.
    pub fn exit_code(self) -> i32 {
        match self {
            MigrationStep::CreateManifest => 2,
            MigrationStep::VerifyManifest => 3,
            MigrationStep::UploadManifest => 4,
            MigrationStep::WriteIdentity => 5,
            MigrationStep::RegisterIdentity => 6,
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MigrationStep::CreateManifest => "creating the cloud manifest",
            MigrationStep::VerifyManifest => "verifying the cloud manifest",
            MigrationStep::UploadManifest => "uploading the cloud manifest",
            MigrationStep::WriteIdentity => "writing the database identity",
            MigrationStep::RegisterIdentity => "registering the database identity",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Init,
    ManifestCreated,
    ManifestVerified,
    ManifestUploaded,
    IdentityWritten(Dbid),
    IdentityRegistered(Dbid),
    Failed { step: MigrationStep, message: String },
}

impl MigrationState {
    /// Whether `step` is the transition out of this state.
    fn ready_for(&self, step: MigrationStep) -> bool {
        matches!(
            (self, step),
            (MigrationState::Init, MigrationStep::CreateManifest)
                | (MigrationState::ManifestCreated, MigrationStep::VerifyManifest)
                | (MigrationState::ManifestVerified, MigrationStep::UploadManifest)
                | (MigrationState::ManifestUploaded, MigrationStep::WriteIdentity)
                | (MigrationState::IdentityWritten(_), MigrationStep::RegisterIdentity)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationState::IdentityRegistered(_) | MigrationState::Failed { .. }
        )
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Init => f.write_str("init"),
            MigrationState::ManifestCreated => f.write_str("manifest-created"),
            MigrationState::ManifestVerified => f.write_str("manifest-verified"),
            MigrationState::ManifestUploaded => f.write_str("manifest-uploaded"),
            MigrationState::IdentityWritten(id) => write!(f, "identity-written({id})"),
            MigrationState::IdentityRegistered(id) => write!(f, "identity-registered({id})"),
            MigrationState::Failed { step, .. } => write!(f, "failed({})", step.name()),
        }
    }
}

/// A step failure: which step, and why.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct MigrationError {
    pub step: MigrationStep,
    #[source]
    pub source: SeedError,
}

impl MigrationError {
    /// The destination already holds a manifest. Expected when the database
    /// was migrated before; not a malfunction.
    pub fn is_aborted(&self) -> bool {
        self.source.is_conflict()
    }

    pub fn exit_code(&self) -> i32 {
        self.step.exit_code()
    }
}

/// Source of fresh database ids. The raw value may carry framing such as a
/// trailing newline; the canonical id is whatever reads back from disk.
pub trait IdSource: Send + Sync {
    fn generate(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn generate(&self) -> String {
        Dbid::generate().to_string()
    }
}

/// The capabilities a migration runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub artifacts: Arc<dyn ArtifactStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub registry: Arc<dyn IdRegistry>,
    pub ids: Arc<dyn IdSource>,
}

/// Outcome of a completed migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub local_manifest: PathBuf,
    pub remote_bucket: String,
    pub remote_key: String,
    pub dbid: Dbid,
    pub dest_data_path: String,
}

pub struct Migration {
    target: MigrationTarget,
    env: Collaborators,
    state: MigrationState,
    remote_key: Option<String>,
}

impl Migration {
    pub fn new(target: MigrationTarget, env: Collaborators) -> Self {
        Self {
            target,
            env,
            state: MigrationState::Init,
            remote_key: None,
        }
    }

    pub fn target(&self) -> &MigrationTarget {
        &self.target
    }

    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    /// Run every remaining step in order, stopping at the first failure.
    pub fn run(&mut self) -> std::result::Result<MigrationReport, MigrationError> {
        match &self.target.source {
            Some(src) => info!("migrating {} (source {src})", self.target.db_path.display()),
            None => info!(
                "migrating {} (no prior cloud location)",
                self.target.db_path.display()
            ),
        }

        self.create_manifest()?;
        self.verify_manifest()?;
        self.upload_manifest()?;
        self.write_identity()?;
        self.register_identity()?;
        self.report()
            .ok_or_else(|| self.order_error(MigrationStep::RegisterIdentity))
    }

    /// Init → ManifestCreated. An existing local manifest is never replaced.
    pub fn create_manifest(&mut self) -> std::result::Result<(), MigrationError> {
        let step = MigrationStep::CreateManifest;
        self.check_ready(step)?;
        let path = self.target.manifest_path();
        let manifest = CloudManifest::build_empty();
        let result = self
            .env
            .artifacts
            .create_and_write(&path, &mut |w| manifest.write_to(w));
        self.settle(step, result)?;
        info!("created cloud manifest {}", path.display());
        self.state = MigrationState::ManifestCreated;
        Ok(())
    }

    /// ManifestCreated → ManifestVerified. Decoding the file back without
    /// error is the verification.
    pub fn verify_manifest(&mut self) -> std::result::Result<(), MigrationError> {
        let step = MigrationStep::VerifyManifest;
        self.check_ready(step)?;
        let path = self.target.manifest_path();
        let result = self.env.artifacts.open_and_read(&path, &mut |r| {
            CloudManifest::read_from(r).map(|m| debug!("read back manifest: {m:?}"))
        });
        self.settle(step, result)?;
        info!("verified cloud manifest {}", path.display());
        self.state = MigrationState::ManifestVerified;
        Ok(())
    }

    /// ManifestVerified → ManifestUploaded. Refuses to overwrite a manifest
    /// already present at the destination.
    pub fn upload_manifest(&mut self) -> std::result::Result<(), MigrationError> {
        let step = MigrationStep::UploadManifest;
        self.check_ready(step)?;
        let result = self.publish_manifest();
        let key = self.settle(step, result)?;
        self.remote_key = Some(key);
        self.state = MigrationState::ManifestUploaded;
        Ok(())
    }

    fn publish_manifest(&self) -> Result<String> {
        let dest = self.target.destination()?;
        let key = paths::cloud_manifest_key(&dest.path);
        if self.env.objects.exists(&dest.bucket, &key)? {
            return Err(SeedError::RemoteConflict {
                bucket: dest.bucket.clone(),
                key,
            });
        }
        self.env
            .objects
            .put_file(&self.target.manifest_path(), &dest.bucket, &key)?;
        info!("uploaded cloud manifest to {}/{key}", dest.bucket);
        Ok(key)
    }

    /// ManifestUploaded → IdentityWritten. Returns the id as read back from
    /// the promoted IDENTITY file.
    pub fn write_identity(&mut self) -> std::result::Result<Dbid, MigrationError> {
        let step = MigrationStep::WriteIdentity;
        self.check_ready(step)?;
        let result = self.promote_identity();
        let dbid = self.settle(step, result)?;
        info!("written new dbid {dbid}");
        self.state = MigrationState::IdentityWritten(dbid.clone());
        Ok(dbid)
    }

    fn promote_identity(&self) -> Result<Dbid> {
        let raw = self.env.ids.generate();
        let tmp = self.target.identity_tmp_path();
        let path = self.target.identity_path();
        self.env
            .artifacts
            .create_and_write(&tmp, &mut |w| w.write_all(raw.as_bytes()))?;
        self.env.artifacts.rename(&tmp, &path)?;
        debug!("promoted {} to {}", tmp.display(), path.display());
        let text = self.env.artifacts.read_to_string(&path)?;
        Dbid::from_persisted(&text)
    }

    /// IdentityWritten → IdentityRegistered.
    pub fn register_identity(&mut self) -> std::result::Result<(), MigrationError> {
        let step = MigrationStep::RegisterIdentity;
        self.check_ready(step)?;
        let MigrationState::IdentityWritten(dbid) = self.state.clone() else {
            return Err(self.order_error(step));
        };
        let result = self.target.destination().and_then(|dest| {
            info!("registering dbid {dbid} for {}", dest.path);
            self.env.registry.register_dbid(&dbid, &dest.path)
        });
        self.settle(step, result)?;
        self.state = MigrationState::IdentityRegistered(dbid);
        Ok(())
    }

    fn report(&self) -> Option<MigrationReport> {
        let MigrationState::IdentityRegistered(dbid) = &self.state else {
            return None;
        };
        let dest = self.target.destination.as_ref()?;
        Some(MigrationReport {
            local_manifest: self.target.manifest_path(),
            remote_bucket: dest.bucket.clone(),
            remote_key: self.remote_key.clone()?,
            dbid: dbid.clone(),
            dest_data_path: dest.path.clone(),
        })
    }

    fn order_error(&self, step: MigrationStep) -> MigrationError {
        MigrationError {
            step,
            source: SeedError::StepOrder(format!(
                "{} cannot run in state {}",
                step.name(),
                self.state
            )),
        }
    }

    fn check_ready(&self, step: MigrationStep) -> std::result::Result<(), MigrationError> {
        if self.state.ready_for(step) {
            Ok(())
        } else {
            Err(self.order_error(step))
        }
    }

    /// Record a step failure in the state machine.
    fn settle<T>(
        &mut self,
        step: MigrationStep,
        result: Result<T>,
    ) -> std::result::Result<T, MigrationError> {
        result.map_err(|source| {
            self.state = MigrationState::Failed {
                step,
                message: source.to_string(),
            };
            MigrationError { step, source }
        })
    }
}
