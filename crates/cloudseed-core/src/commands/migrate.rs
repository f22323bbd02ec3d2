use std::sync::Arc;

use cloudseed_storage::{BucketRegistry, ObjectStore};
use cloudseed_types::error::Result;
use tracing::debug;

use crate::artifact::FsArtifactStore;
use crate::config::MigrationConfig;
use crate::migration::{Collaborators, Migration, RandomIdSource};

/// Wire a [`Migration`] to the local filesystem and the configured object
/// store. Nothing is written until the migration is run.
pub fn prepare(config: &MigrationConfig) -> Result<Migration> {
    let target = config.target()?;
    let objects: Arc<dyn ObjectStore> = Arc::from(cloudseed_storage::store_from_config(
        &config.storage_config(),
    )?);
    debug!(
        "registry bucket: {}",
        config.registry_bucket().as_deref().unwrap_or("<none>")
    );
    let registry = BucketRegistry::new(Arc::clone(&objects), config.registry_bucket());

    Ok(Migration::new(
        target,
        Collaborators {
            artifacts: Arc::new(FsArtifactStore),
            objects,
            registry: Arc::new(registry),
            ids: Arc::new(RandomIdSource),
        },
    ))
}
