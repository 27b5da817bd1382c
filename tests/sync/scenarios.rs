//! Reference scenarios
//!
//! One test per end-to-end scenario the engine must support exactly.

use crate::common::*;

// ============================================================================
// Deletion follows the creator's identity
// ============================================================================

#[tokio::test]
async fn creator_can_delete_other_account_cannot() {
    let family = Family::new();
    let pat = family.pat();
    let (_, m1) = grandchild_with_memory(&pat).await;

    assert!(pat.can_delete_as(&m1.id, &pat_session()).unwrap());

    let stranger = SessionState::default().with_identity("u2");
    assert!(!pat.can_delete_as(&m1.id, &stranger).unwrap());
}

// ============================================================================
// Sharing a root pulls later captures into Shared
// ============================================================================

#[tokio::test]
async fn capture_after_share_lands_in_shared_and_extends() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, m1) = grandchild_with_memory(&pat).await;
    assert_eq!(m1.partition, Partition::Private);
    assert_eq!(family.cloud.calls("create_share"), 0);

    let handle = pat.create_share(g1.id).await.unwrap();
    assert_eq!(pat.store().partition_of(&g1.id), Some(Partition::Shared));
    assert_eq!(pat.store().partition_of(&m1.id), Some(Partition::Shared));
    assert!(handle.covers(&m1.id));
    assert_co_resident(&pat);

    let m2 = pat
        .add_record(RecordPayload::memory("first word"), &[g1.id])
        .await
        .unwrap();
    assert_eq!(m2.partition, Partition::Shared);
    assert_eq!(family.cloud.calls("extend_share"), 1);
    assert!(family.cloud.share_records(&handle.share_token).contains(&m2.id));
    assert!(pat.shares().fetch_existing_share(&g1.id).unwrap().covers(&m2.id));
    assert_co_resident(&pat);
}

// ============================================================================
// Closed shares cannot be joined
// ============================================================================

#[tokio::test]
async fn private_invitation_is_rejected_without_remote_accept() {
    let family = Family::new();
    family.cloud.set_default_permission(Permission::None);
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    let handle = pat.create_share(g1.id).await.unwrap();

    let sam = family.sam();
    let err = sam
        .accept_invitation(&handle.share_token, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PrivateShareNotSupported));
    assert_eq!(family.cloud.calls("accept_invitation"), 0);
    assert!(sam.store().is_empty());
    assert!(!sam.session().is_co_owner_device);
}

// ============================================================================
// Shared roots cannot be deleted
// ============================================================================

#[tokio::test]
async fn shared_root_deletion_is_blocked() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    assert!(pat.can_delete_root(&g1.id).is_ok());

    pat.create_share(g1.id).await.unwrap();

    assert!(matches!(
        pat.can_delete_root(&g1.id),
        Err(Error::SharedRootDeletionBlocked(id)) if id == g1.id
    ));
    assert!(matches!(
        pat.delete_record(&g1.id),
        Err(Error::SharedRootDeletionBlocked(_))
    ));
    assert!(pat.store().contains(&g1.id));
}
