//! Randomized capture/share sequences
//!
//! Whatever order records are captured and roots are shared in, no edge may
//! ever connect two partitions, and a rejected capture must leave the store
//! untouched.

use proptest::prelude::*;

use crate::common::*;

#[derive(Debug, Clone)]
enum Op {
    Grandchild,
    Memory { subjects: Vec<usize> },
    Ancestor { subject: usize },
    AncestorPhoto { ancestor: usize },
    MemoryMentioning { subject: usize, ancestor: usize },
    Share { root: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Grandchild),
        4 => prop::collection::vec(0usize..8, 0..3).prop_map(|subjects| Op::Memory { subjects }),
        2 => (0usize..8).prop_map(|subject| Op::Ancestor { subject }),
        1 => (0usize..8).prop_map(|ancestor| Op::AncestorPhoto { ancestor }),
        1 => (0usize..8, 0usize..8)
            .prop_map(|(subject, ancestor)| Op::MemoryMentioning { subject, ancestor }),
        2 => (0usize..8).prop_map(|root| Op::Share { root }),
    ]
}

fn pick(engine: &SyncOrchestrator, kind: RecordKind, index: usize) -> Option<RecordId> {
    let records = engine.store().records_of_kind(kind, None);
    if records.is_empty() {
        return None;
    }
    Some(records[index % records.len()].id)
}

async fn capture(engine: &SyncOrchestrator, payload: RecordPayload, targets: Vec<RecordId>) {
    let before = engine.store().len();
    match engine.add_record(payload, &targets).await {
        Ok(record) => {
            for target in &targets {
                assert_eq!(
                    engine.store().partition_of(target),
                    Some(record.partition),
                    "record landed outside its target's partition"
                );
            }
        }
        Err(Error::PartitionMismatch { .. }) => {
            assert_eq!(engine.store().len(), before, "rejected capture wrote records");
        }
        Err(e) => panic!("unexpected error: {}", e),
    }
}

async fn apply(engine: &SyncOrchestrator, op: &Op) {
    match op {
        Op::Grandchild => {
            capture(engine, RecordPayload::grandchild("kid"), Vec::new()).await;
        }
        Op::Memory { subjects } => {
            let mut targets: Vec<RecordId> = subjects
                .iter()
                .filter_map(|i| pick(engine, RecordKind::Grandchild, *i))
                .collect();
            targets.sort();
            targets.dedup();
            capture(engine, RecordPayload::memory("moment"), targets).await;
        }
        Op::Ancestor { subject } => {
            let targets = pick(engine, RecordKind::Grandchild, *subject).into_iter().collect();
            capture(engine, RecordPayload::ancestor("Rose", "great-grandmother"), targets).await;
        }
        Op::AncestorPhoto { ancestor } => {
            let Some(target) = pick(engine, RecordKind::Ancestor, *ancestor) else {
                return;
            };
            let payload = RecordPayload::AncestorPhoto {
                caption: "portrait".to_string(),
                media: hearthshare::MediaRef {
                    asset: "asset-1".to_string(),
                    mime: "image/jpeg".to_string(),
                },
            };
            capture(engine, payload, vec![target]).await;
        }
        Op::MemoryMentioning { subject, ancestor } => {
            let targets = pick(engine, RecordKind::Grandchild, *subject)
                .into_iter()
                .chain(pick(engine, RecordKind::Ancestor, *ancestor))
                .collect();
            capture(engine, RecordPayload::memory("story"), targets).await;
        }
        Op::Share { root } => {
            let Some(root) = pick(engine, RecordKind::Grandchild, *root) else {
                return;
            };
            match engine.create_share(root).await {
                Ok(handle) => {
                    assert_eq!(engine.store().partition_of(&root), Some(Partition::Shared));
                    assert!(handle.covers(&root));
                }
                // Roots pulled into another root's component are already Shared
                Err(Error::InvalidOperation(_)) => {
                    assert_eq!(engine.store().partition_of(&root), Some(Partition::Shared));
                }
                Err(e) => panic!("unexpected share error: {}", e),
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn edges_never_span_partitions(ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let family = Family::new();
            let engine = family.pat();
            for op in &ops {
                apply(&engine, op).await;
                assert_co_resident(&engine);
            }
            for record in engine.store().records_in(Partition::Shared) {
                if record.kind() == RecordKind::Contributor {
                    continue;
                }
                let roots = engine.store().roots_of(&record.id);
                assert!(
                    roots.iter().all(|r| engine.store().partition_of(r) == Some(Partition::Shared)),
                    "shared record hangs off a private root"
                );
            }
        });
    }
}
