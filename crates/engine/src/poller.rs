//! Waiting for shared data to arrive
//!
//! After an invitation is accepted the backend takes a while to make the
//! shared zone visible. `SyncPoller` lists the Shared partition on a fixed
//! cadence until a matching record shows up, the attempts run out, or the
//! caller cancels. Remote errors during a poll are logged and retried; they
//! never escape.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hearthshare_core::{PartitionFilter, RecordId, RecordKind, RemoteRecord};

use crate::config::PollConfig;
use crate::remote::RemoteBackend;

/// Cadence and target of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Listing attempts, at least one
    pub attempts: u32,
    /// Sleep between attempts
    pub interval: Duration,
    /// Only accept records belonging to this root
    pub expected_root: Option<RecordId>,
}

impl PollOptions {
    /// Background cadence: 40 attempts, 15 s apart
    pub fn background() -> Self {
        Self::background_from(&PollConfig::default())
    }

    /// Interactive cadence: 120 s budget, 2 s apart
    pub fn interactive() -> Self {
        Self::interactive_from(&PollConfig::default())
    }

    /// Background cadence from configuration
    pub fn background_from(config: &PollConfig) -> Self {
        Self {
            attempts: config.background_attempts.max(1),
            interval: Duration::from_secs(config.background_interval_secs),
            expected_root: None,
        }
    }

    /// Interactive cadence from configuration
    pub fn interactive_from(config: &PollConfig) -> Self {
        Self::from_timeout(
            Duration::from_secs(config.interactive_timeout_secs),
            Duration::from_secs(config.interactive_interval_secs),
        )
    }

    /// Attempts derived as `ceil(timeout / interval)`
    pub fn from_timeout(timeout: Duration, interval: Duration) -> Self {
        let attempts = if interval.is_zero() {
            1
        } else {
            let ratio = timeout.as_nanos().div_ceil(interval.as_nanos());
            u32::try_from(ratio).unwrap_or(u32::MAX).max(1)
        };
        Self {
            attempts,
            interval,
            expected_root: None,
        }
    }

    /// Narrow results to one root
    pub fn with_expected_root(mut self, root: RecordId) -> Self {
        self.expected_root = Some(root);
        self
    }

    /// Upper bound on time spent sleeping
    pub fn sleep_budget(&self) -> Duration {
        self.interval * self.attempts.saturating_sub(1)
    }

    fn accepts(&self, remote: &RemoteRecord) -> bool {
        match self.expected_root {
            None => true,
            Some(root) => remote.record.id == root || remote.edges.iter().any(|e| e.to == root),
        }
    }
}

/// Polls the backend for shared records
#[derive(Clone)]
pub struct SyncPoller {
    remote: Arc<dyn RemoteBackend>,
}

impl SyncPoller {
    /// Poller over `remote`
    pub fn new(remote: Arc<dyn RemoteBackend>) -> Self {
        Self { remote }
    }

    /// Wait for a Shared record of `kind`
    ///
    /// Returns the first match by label then id, or `None` once attempts are
    /// exhausted or `cancel` fires.
    pub async fn await_shared_import(
        &self,
        kind: RecordKind,
        options: &PollOptions,
        cancel: &CancellationToken,
    ) -> Option<RemoteRecord> {
        let attempts = options.attempts.max(1);
        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                debug!(target: "hearthshare::poll", kind = %kind, attempt, "poll cancelled");
                return None;
            }

            match self.remote.list_records(kind, PartitionFilter::Shared).await {
                Ok(records) => {
                    let mut matching: Vec<RemoteRecord> =
                        records.into_iter().filter(|r| options.accepts(r)).collect();
                    matching.sort_by(|a, b| {
                        a.record
                            .label()
                            .cmp(b.record.label())
                            .then(a.record.id.cmp(&b.record.id))
                    });
                    if let Some(found) = matching.into_iter().next() {
                        info!(target: "hearthshare::poll", kind = %kind, attempt, id = %found.record.id, "shared record arrived");
                        return Some(found);
                    }
                    debug!(target: "hearthshare::poll", kind = %kind, attempt, attempts, "nothing shared yet");
                }
                Err(e) => {
                    warn!(target: "hearthshare::poll", kind = %kind, attempt, error = %e, "listing failed, will retry");
                }
            }

            if attempt < attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(target: "hearthshare::poll", kind = %kind, attempt, "poll cancelled while waiting");
                        return None;
                    }
                    _ = tokio::time::sleep(options.interval) => {}
                }
            }
        }
        info!(target: "hearthshare::poll", kind = %kind, attempts, "gave up waiting for shared record");
        None
    }

    /// Run a poll as its own task
    pub fn spawn(&self, kind: RecordKind, options: PollOptions) -> PollTask {
        let cancel = CancellationToken::new();
        let poller = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { poller.await_shared_import(kind, &options, &token).await });
        PollTask { cancel, handle }
    }
}

impl std::fmt::Debug for SyncPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncPoller").finish_non_exhaustive()
    }
}

/// Handle to a spawned poll
#[derive(Debug)]
pub struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<Option<RemoteRecord>>,
}

impl PollTask {
    /// Ask the poll to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token controlling the poll
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the outcome
    pub async fn join(self) -> Option<RemoteRecord> {
        match self.handle.await {
            Ok(found) => found,
            Err(e) => {
                warn!(target: "hearthshare::poll", error = %e, "poll task failed");
                None
            }
        }
    }
}
