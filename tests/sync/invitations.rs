//! Accepting invitations: code lookup, waiting for data, cancellation

use std::time::Duration;

use crate::common::*;
use hearthshare::RemoteError;
use tokio::time::Instant;

async fn shared_family() -> (Family, SyncOrchestrator, Record, String) {
    let family = Family::new();
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    let handle = pat.create_share(g1.id).await.unwrap();
    (family, pat, g1, handle.share_token)
}

#[tokio::test(start_paused = true)]
async fn waits_for_share_to_become_visible() {
    let (family, _pat, g1, link) = shared_family().await;
    family.cloud.set_publish_after(5);
    let sam = family.sam();

    let started = Instant::now();
    let root = sam
        .accept_invitation(&link, &CancellationToken::new())
        .await
        .unwrap()
        .expect("share should arrive within the interactive budget");
    assert_eq!(root.id, g1.id);
    // Five hidden listings, then the sixth finds the root
    assert_eq!(started.elapsed(), Duration::from_secs(2 * 5));
    assert!(sam.session().is_co_owner_device);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_interactive_budget() {
    let (family, _pat, _g1, link) = shared_family().await;
    family.cloud.set_publish_after(u32::MAX);
    let sam = family.sam();

    let started = Instant::now();
    let outcome = sam
        .accept_invitation(&link, &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.is_none());
    let poll = &sam.config().poll;
    let bound = Duration::from_secs(poll.interactive_timeout_secs + poll.interactive_interval_secs);
    assert!(started.elapsed() <= bound);
    assert!(sam.store().is_empty());
    assert!(!sam.session().is_co_owner_device);
    // The remote accept still happened; a later ensure_current picks the data up
    assert_eq!(family.cloud.calls("accept_invitation"), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_waiting_without_side_effects() {
    let (family, _pat, _g1, link) = shared_family().await;
    family.cloud.set_publish_after(u32::MAX);
    let sam = family.sam();
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            cancel.cancel();
        })
    };
    let started = Instant::now();
    let outcome = sam.accept_invitation(&link, &cancel).await.unwrap();
    canceller.await.unwrap();

    assert!(outcome.is_none());
    assert!(started.elapsed() < Duration::from_secs(8));
    assert!(sam.store().is_empty());
    assert!(!sam.session().is_co_owner_device);
}

#[tokio::test]
async fn accepting_twice_is_harmless() {
    let (family, _pat, g1, link) = shared_family().await;
    let sam = family.sam();
    sam.accept_invitation(&link, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    let records = sam.store().len();

    let again = sam
        .accept_invitation(&link, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.id, g1.id);
    assert_eq!(sam.store().len(), records);
    assert_co_resident(&sam);
}

#[tokio::test]
async fn code_lookup_retries_transient_failures() {
    let family = Family::new();
    let pat = family.pat();
    let (g1, _) = grandchild_with_memory(&pat).await;
    let handle = pat.create_share(g1.id).await.unwrap();

    let codes = std::sync::Arc::new(
        StaticCodeLookup::new()
            .with_code("QW34ER", &handle.share_token)
            .failing_first(2),
    );
    let sam = SyncOrchestrator::ephemeral(fast_config(), family.cloud.account("u2"), codes.clone())
        .unwrap();
    sam.set_session(sam_session()).unwrap();

    let root = sam
        .accept_invitation("qw34er", &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.id, g1.id);
    assert_eq!(codes.calls(), 3);
}

#[tokio::test]
async fn unknown_link_surfaces_remote_error() {
    let family = Family::new();
    let sam = family.sam();
    let err = sam
        .accept_invitation("https://share.example/missing", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Remote {
            operation: "fetch_invitation_metadata",
            source: RemoteError::NotFound(_)
        }
    ));
}

#[tokio::test]
async fn device_identity_is_fetched_when_unknown() {
    let (family, _pat, g1, link) = shared_family().await;
    let sam = family.device("u2", SessionState::default());

    let root = sam
        .accept_invitation(&link, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.id, g1.id);
    assert_eq!(
        sam.session().remote_identity_key.map(|k| k.as_str().to_string()),
        Some("u2".to_string())
    );
    assert_eq!(family.cloud.calls("current_user_identity"), 1);
}
