//! Devices that hold shared data but never saw the share being made

use crate::common::*;
use hearthshare::RemoteError;
use tempfile::TempDir;

fn open(family: &Family, dir: &TempDir, identity: &str) -> SyncOrchestrator {
    SyncOrchestrator::open(dir.path(), family.cloud.account(identity), family.codes.clone())
        .expect("Failed to open engine")
}

#[tokio::test]
async fn second_device_of_owner_extends_existing_share() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    let handle = pat.create_share(g1.id).await.unwrap();

    let tablet = family.pat();
    let summary = tablet.ensure_current().await.unwrap();
    assert_eq!(summary.shares_restored, 1);
    let restored = tablet.shares().fetch_existing_share(&g1.id).unwrap();
    assert_eq!(restored.share_token, handle.share_token);
    assert!(tablet.shares().is_owner(&g1.id));

    let m2 = tablet
        .add_record(RecordPayload::memory("bath time"), &[g1.id])
        .await
        .unwrap();
    assert_eq!(m2.partition, Partition::Shared);
    assert!(family.cloud.share_records(&handle.share_token).contains(&m2.id));
    assert_eq!(family.cloud.calls("create_share"), 1);
    assert_co_resident(&tablet);

    // A second sync finds nothing left to restore
    assert_eq!(tablet.ensure_current().await.unwrap().shares_restored, 0);
}

#[tokio::test]
async fn owner_keeps_writing_to_read_only_share_after_reopen() {
    let family = Family::new();
    let dir = TempDir::new().unwrap();
    let (g1, token) = {
        let engine = open(&family, &dir, "u1");
        engine.set_session(pat_session()).unwrap();
        let (g1, _) = grandchild_with_memory(&engine).await;
        let handle = engine.create_share(g1.id).await.unwrap();
        (g1, handle.share_token)
    };
    family.cloud.set_permission(&token, Permission::ReadOnly);

    let reopened = open(&family, &dir, "u1");
    assert!(reopened.shares().fetch_existing_share(&g1.id).is_none());
    reopened.ensure_current().await.unwrap();
    assert!(reopened.shares().is_owner(&g1.id));

    let m2 = reopened
        .add_record(RecordPayload::memory("first word"), &[g1.id])
        .await
        .unwrap();
    assert!(family.cloud.share_records(&token).contains(&m2.id));
}

#[tokio::test]
async fn capture_recovers_share_without_prior_sync() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    let handle = pat.create_share(g1.id).await.unwrap();

    // Restoring during sync fails, so the capture has to ask again
    family
        .cloud
        .fail_next("fetch_share", RemoteError::Network("offline".to_string()));
    let tablet = family.pat();
    let summary = tablet.ensure_current().await.unwrap();
    assert_eq!(summary.shares_restored, 0);
    assert!(tablet.shares().fetch_existing_share(&g1.id).is_none());

    let m2 = tablet
        .add_record(RecordPayload::memory("new tooth"), &[g1.id])
        .await
        .unwrap();
    assert!(family.cloud.share_records(&handle.share_token).contains(&m2.id));
    assert_eq!(family.cloud.calls("fetch_share"), 2);
}

#[tokio::test]
async fn shared_capture_without_reachable_share_is_rolled_back() {
    let family = Family::new();
    let pat = family.pat();
    pat.current_contributor().unwrap();

    // Shared root whose share this account cannot see
    let mut orphan = Record::new(RecordPayload::grandchild("Ada"));
    orphan.partition = Partition::Shared;
    pat.store().insert(orphan.clone()).unwrap();
    let before = pat.store().len();
    let edges_before = pat.store().edge_count();

    let err = pat
        .add_record(RecordPayload::memory("unsent"), &[orphan.id])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShareUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(pat.store().len(), before);
    assert_eq!(pat.store().edge_count(), edges_before);
    assert_eq!(family.cloud.calls("extend_share"), 0);

    // Same when the backend cannot be asked at all
    family
        .cloud
        .fail_next("fetch_share", RemoteError::Network("offline".to_string()));
    let err = pat
        .add_record(RecordPayload::memory("unsent"), &[orphan.id])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote { operation: "fetch_share", .. }));
    assert_eq!(pat.store().len(), before);
}

#[tokio::test]
async fn create_share_on_synced_root_returns_existing_share() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    let handle = pat.create_share(g1.id).await.unwrap();

    let tablet = family.pat();
    family
        .cloud
        .fail_next("fetch_share", RemoteError::Network("offline".to_string()));
    tablet.ensure_current().await.unwrap();

    let again = tablet.create_share(g1.id).await.unwrap();
    assert_eq!(again.share_token, handle.share_token);
    assert_eq!(family.cloud.calls("create_share"), 1);
}
