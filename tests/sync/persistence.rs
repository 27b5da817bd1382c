//! On-disk session and configuration

use crate::common::*;
use hearthshare::{CONFIG_FILE_NAME, SESSION_FILE_NAME};
use tempfile::TempDir;

fn open(family: &Family, dir: &TempDir, identity: &str) -> SyncOrchestrator {
    SyncOrchestrator::open(dir.path(), family.cloud.account(identity), family.codes.clone())
        .expect("Failed to open engine")
}

#[test]
fn open_writes_default_config() {
    let family = Family::new();
    let dir = TempDir::new().unwrap();
    let engine = open(&family, &dir, "u1");

    assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    assert_eq!(engine.config(), &SyncConfig::default());
}

#[test]
fn invalid_config_fails_to_open() {
    let family = Family::new();
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "primary_role = \"B\"\nco_owner_role = \"B\"\n",
    )
    .unwrap();
    let result = SyncOrchestrator::open(dir.path(), family.cloud.account("u1"), family.codes.clone());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn session_survives_reopen() {
    let family = Family::new();
    let dir = TempDir::new().unwrap();
    let contributor = {
        let engine = open(&family, &dir, "u1");
        engine.set_session(pat_session()).unwrap();
        engine
            .add_record(RecordPayload::grandchild("Ada"), &[])
            .await
            .unwrap();
        engine.current_contributor().unwrap()
    };

    let reopened = open(&family, &dir, "u1");
    let session = reopened.session();
    assert_eq!(session.active_contributor_id, Some(contributor.id));
    assert_eq!(session.current_role, Some(Role::A));
    assert!(session.is_primary_device);
    assert_eq!(session.display_name.as_deref(), Some("Pat"));
}

#[tokio::test]
async fn fresh_install_resets_everything() {
    let family = Family::new();
    let dir = TempDir::new().unwrap();
    let engine = open(&family, &dir, "u1");
    engine.set_session(pat_session()).unwrap();
    let (g1, _) = grandchild_with_memory(&engine).await;
    engine.create_share(g1.id).await.unwrap();

    engine.fresh_install().unwrap();

    assert!(engine.store().is_empty());
    assert!(engine.shares().fetch_existing_share(&g1.id).is_none());
    assert_eq!(engine.session(), SessionState::default());

    let raw = std::fs::read_to_string(dir.path().join(SESSION_FILE_NAME)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    for key in [
        "activeContributorID",
        "currentContributorRole",
        "primaryContributorRole",
        "remoteIdentityKey",
    ] {
        assert_eq!(json[key], "", "{} should be empty", key);
    }
    assert_eq!(json["isCoGrandparentDevice"], false);
    assert_eq!(json["isPrimaryDevice"], false);
}

#[tokio::test]
async fn ensure_current_restores_shared_data_after_fresh_install() {
    let family = Family::new();
    let dir = TempDir::new().unwrap();
    let engine = open(&family, &dir, "u1");
    engine.set_session(pat_session()).unwrap();
    let (g1, m1) = grandchild_with_memory(&engine).await;
    engine.create_share(g1.id).await.unwrap();

    engine.fresh_install().unwrap();
    let summary = engine.ensure_current().await.unwrap();

    assert_eq!(summary.inserted, 3);
    assert_eq!(engine.store().partition_of(&g1.id), Some(Partition::Shared));
    assert_eq!(engine.store().partition_of(&m1.id), Some(Partition::Shared));
    assert_eq!(
        engine.session().remote_identity_key.map(|k| k.as_str().to_string()),
        Some("u1".to_string())
    );
    assert_co_resident(&engine);
}
