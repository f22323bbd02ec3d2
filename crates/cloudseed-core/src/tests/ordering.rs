use cloudseed_types::error::SeedError;

use crate::migration::{MigrationState, MigrationStep};
use crate::testutil::Harness;

#[test]
fn side_effects_happen_in_step_order() {
    let h = Harness::new();
    h.migration().run().unwrap();

    let order = [
        "create CLOUDMANIFEST",
        "read CLOUDMANIFEST",
        "exists ",
        "put ",
        "create IDENTITY.tmp",
        "rename IDENTITY.tmp IDENTITY",
        "read IDENTITY",
        "register ",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|p| {
            h.log
                .position(p)
                .unwrap_or_else(|| panic!("missing call {p:?} in {:?}", h.log.entries()))
        })
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "out of order: {:?}",
        h.log.entries()
    );
}

#[test]
fn steps_can_be_driven_one_at_a_time() {
    let h = Harness::new();
    let mut migration = h.migration();

    migration.create_manifest().unwrap();
    assert_eq!(migration.state(), &MigrationState::ManifestCreated);
    migration.verify_manifest().unwrap();
    assert_eq!(migration.state(), &MigrationState::ManifestVerified);
    migration.upload_manifest().unwrap();
    assert_eq!(migration.state(), &MigrationState::ManifestUploaded);
    let dbid = migration.write_identity().unwrap();
    assert_eq!(migration.state(), &MigrationState::IdentityWritten(dbid.clone()));
    migration.register_identity().unwrap();
    assert_eq!(migration.state(), &MigrationState::IdentityRegistered(dbid));
    assert!(migration.state().is_terminal());
}

#[test]
fn skipping_ahead_is_rejected_without_side_effects() {
    let h = Harness::new();
    let mut migration = h.migration();

    let err = migration.upload_manifest().unwrap_err();
    assert_eq!(err.step, MigrationStep::UploadManifest);
    assert!(matches!(err.source, SeedError::StepOrder(_)), "{err}");
    // An ordering mistake does not poison the state machine.
    assert_eq!(migration.state(), &MigrationState::Init);
    assert!(h.log.entries().is_empty());

    assert!(migration.register_identity().is_err());
    assert!(migration.write_identity().is_err());
    assert!(migration.verify_manifest().is_err());
    assert!(h.log.entries().is_empty());
}

#[test]
fn repeating_a_step_is_rejected() {
    let h = Harness::new();
    let mut migration = h.migration();
    migration.create_manifest().unwrap();

    let err = migration.create_manifest().unwrap_err();
    assert!(matches!(err.source, SeedError::StepOrder(_)), "{err}");
    assert_eq!(migration.state(), &MigrationState::ManifestCreated);
}

#[test]
fn failed_migration_accepts_no_further_steps() {
    let h = Harness::new();
    std::fs::write(h.db_path().join("CLOUDMANIFEST"), b"x").unwrap();
    let mut migration = h.migration();
    assert!(migration.create_manifest().is_err());
    assert!(migration.state().is_terminal());

    let err = migration.verify_manifest().unwrap_err();
    assert!(matches!(err.source, SeedError::StepOrder(_)), "{err}");
}

#[test]
fn exit_codes_are_distinct_and_nonzero() {
    let codes: Vec<i32> = MigrationStep::ALL.iter().map(|s| s.exit_code()).collect();
    assert_eq!(codes, vec![2, 3, 4, 5, 6]);
}
