//! Deletion authorization and policy

use crate::common::*;
use hearthshare::{ContributorProfile, Edge, EdgeKind, IdentityKey};

/// Store holding Pat (role A, account u1) and one memory Pat created
fn store_with_pats_memory(family: &Family) -> (SyncOrchestrator, RecordId) {
    let engine = family.device("u9", SessionState::default());
    let mut pat = Record::new(RecordPayload::Contributor(ContributorProfile {
        display_name: "Pat".to_string(),
        role: Role::A,
        color_tag: "blue".to_string(),
        remote_identity_key: Some(IdentityKey::from("u1")),
    }));
    pat.partition = Partition::Private;
    let mut memory = Record::new(RecordPayload::memory("first steps"));
    memory.created_by = Some(pat.id);
    let (pat_id, memory_id) = (pat.id, memory.id);
    engine.store().insert(pat).unwrap();
    engine.store().insert(memory).unwrap();
    engine
        .store()
        .link(Edge::new(memory_id, pat_id, EdgeKind::CreatedBy))
        .unwrap();
    (engine, memory_id)
}

#[test]
fn authorization_truth_table() {
    let family = Family::new();
    let (engine, memory) = store_with_pats_memory(&family);

    for key in [false, true] {
        for role in [false, true] {
            for name in [false, true] {
                let session = SessionState {
                    remote_identity_key: Some(IdentityKey::from(if key { "u1" } else { "u9" })),
                    current_role: Some(if role { Role::A } else { Role::B }),
                    display_name: Some(if name { " PAT " } else { "Robin" }.to_string()),
                    ..SessionState::default()
                };
                let expected = key || role || name;
                assert_eq!(
                    engine.can_delete_as(&memory, &session).unwrap(),
                    expected,
                    "key={} role={} name={}",
                    key,
                    role,
                    name
                );
            }
        }
    }
}

#[test]
fn empty_session_cannot_delete() {
    let family = Family::new();
    let (engine, memory) = store_with_pats_memory(&family);
    assert!(!engine.can_delete_as(&memory, &SessionState::default()).unwrap());
}

#[tokio::test]
async fn creator_deletes_private_record_and_its_edges() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, m1) = grandchild_with_memory(&pat).await;
    let edges_before = pat.store().edge_count();

    let removed = pat.delete_record(&m1.id).unwrap();
    assert_eq!(removed.id, m1.id);
    assert!(!pat.store().contains(&m1.id));
    assert_eq!(pat.store().edge_count(), edges_before - 2);
    assert!(pat.store().edges_to(&g1.id).is_empty());
    assert_co_resident(&pat);
}

#[tokio::test]
async fn other_person_cannot_delete() {
    let family = Family::new();
    let pat = family.pat();
    let (_, m1) = grandchild_with_memory(&pat).await;

    pat.set_session(
        SessionState::primary(Role::B)
            .with_identity("u2")
            .with_display_name("Sam"),
    )
    .unwrap();
    assert!(matches!(
        pat.delete_record(&m1.id),
        Err(Error::DeletionNotAuthorized(_))
    ));
    assert!(pat.store().contains(&m1.id));
}

#[tokio::test]
async fn shared_memory_cannot_be_deleted_even_by_creator() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, m1) = grandchild_with_memory(&pat).await;
    pat.create_share(g1.id).await.unwrap();

    assert!(pat.can_delete(&m1.id).unwrap());
    assert!(matches!(
        pat.delete_record(&m1.id),
        Err(Error::SharedRecordDeletionBlocked(_))
    ));
}

#[test]
fn unknown_record_is_not_found() {
    let family = Family::new();
    let pat = family.pat();
    let missing = RecordId::new();
    assert!(matches!(pat.can_delete(&missing), Err(Error::RecordNotFound(_))));
    assert!(matches!(pat.delete_record(&missing), Err(Error::RecordNotFound(_))));
}
