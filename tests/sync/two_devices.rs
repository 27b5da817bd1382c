//! Owner and co-owner working on the same share

use crate::common::*;
use hearthshare::{twin_id, EdgeKind, IdentityResolver};

#[tokio::test]
async fn co_owner_joins_by_code_and_contributes() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, m1) = grandchild_with_memory(&pat).await;
    let handle = pat.create_share(g1.id).await.unwrap();
    family.codes.insert("ab12cd", &handle.share_token);

    // Sam joins with a lower-case code
    let sam = family.sam();
    let root = sam
        .accept_invitation(" ab12cd ", &CancellationToken::new())
        .await
        .unwrap()
        .expect("shared root should be visible");
    assert_eq!(root.id, g1.id);
    assert_eq!(root.partition, Partition::Shared);
    assert!(sam.session().is_co_owner_device);
    assert!(sam.store().contains(&m1.id));
    assert_co_resident(&sam);

    // Pat's shared twin came along with the memory it authored
    let pat_twins = sam.store().contributors(Some(Partition::Shared));
    assert_eq!(pat_twins.len(), 1);
    assert_eq!(pat_twins[0].profile.display_name, "Pat");

    // Sam's first capture materializes the co-owner contributor
    let m2 = sam
        .add_record(RecordPayload::memory("park day"), &[g1.id])
        .await
        .unwrap();
    assert_eq!(m2.partition, Partition::Shared);
    let sam_id = IdentityResolver::materialized_id(Role::B);
    let sam_twin = twin_id(sam_id, Partition::Shared);
    assert_eq!(m2.created_by, Some(sam_twin));
    assert_eq!(sam.store().get(&sam_id).unwrap().label(), "Sam");
    let shared = family.cloud.share_records(&handle.share_token);
    assert!(shared.contains(&m2.id));
    assert!(shared.contains(&sam_twin));
    assert_co_resident(&sam);

    // Pat catches up
    let summary = pat.ensure_current().await.unwrap();
    assert_eq!(summary.inserted, 2);
    assert!(pat.store().contains(&m2.id));
    assert!(pat
        .store()
        .edges_from(&m2.id)
        .iter()
        .any(|e| e.kind == EdgeKind::Subject && e.to == g1.id));
    assert_co_resident(&pat);

    // Each side may only delete its own captures, and nothing Shared at all
    assert!(!pat.can_delete(&m2.id).unwrap());
    assert!(sam.can_delete(&m2.id).unwrap());
    assert!(matches!(
        sam.delete_record(&m2.id),
        Err(Error::SharedRecordDeletionBlocked(_))
    ));
    assert!(matches!(
        sam.can_delete_root(&g1.id),
        Err(Error::SharedRootDeletionBlocked(_))
    ));
}

#[tokio::test]
async fn owner_cannot_accept_own_invitation() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    let handle = pat.create_share(g1.id).await.unwrap();

    let err = pat
        .accept_invitation(&handle.share_token, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SelfInviteNotAllowed));
    assert_eq!(family.cloud.calls("accept_invitation"), 0);
}

#[tokio::test]
async fn sharing_twice_returns_the_same_share() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    let first = pat.create_share(g1.id).await.unwrap();
    let second = pat.create_share(g1.id).await.unwrap();
    assert_eq!(first.share_token, second.share_token);
    assert_eq!(family.cloud.calls("create_share"), 1);
}

#[tokio::test]
async fn failed_share_creation_leaves_records_private() {
    let family = Family::new();
    family
        .cloud
        .fail_next("create_share", hearthshare::RemoteError::Network("offline".to_string()));
    let pat = family.pat();
    let (g1, m1) = grandchild_with_memory(&pat).await;

    let err = pat.create_share(g1.id).await.unwrap_err();
    assert!(matches!(err, Error::Remote { operation: "create_share", .. }));
    assert_eq!(pat.store().partition_of(&g1.id), Some(Partition::Private));
    assert_eq!(pat.store().partition_of(&m1.id), Some(Partition::Private));
    assert!(pat.store().records_in(Partition::Shared).is_empty());

    pat.create_share(g1.id).await.unwrap();
    assert_eq!(pat.store().partition_of(&m1.id), Some(Partition::Shared));
}

#[tokio::test]
async fn mixed_targets_are_rejected_before_any_write() {
    let family = Family::new();
    let pat = family.pat();
    let (shared, _) = grandchild_with_memory(&pat).await;
    let private = pat
        .add_record(RecordPayload::grandchild("Ben"), &[])
        .await
        .unwrap();
    pat.create_share(shared.id).await.unwrap();
    let before = pat.store().len();

    let err = pat
        .add_record(RecordPayload::memory("both kids"), &[shared.id, private.id])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PartitionMismatch { .. }));
    assert_eq!(pat.store().len(), before);
    assert_eq!(family.cloud.calls("extend_share"), 0);
}
