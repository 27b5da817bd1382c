//! Sync and sharing engine for Hearthshare
//!
//! This crate orchestrates the core and storage layers:
//! - IdentityResolver: session → durable contributor
//! - PartitionRouter: partition choice, contributor twins, share promotion
//! - ShareLifecycleManager: per-root share state machine and imports
//! - SyncPoller: cancellable wait for shared data to arrive
//! - SyncOrchestrator: the façade tying them together
//!
//! The cloud backend and the share-code service are reached only through
//! the `RemoteBackend` and `ShareCodeLookup` traits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod identity;
pub mod orchestrator;
pub mod poller;
pub mod remote;
pub mod router;
pub mod session;
pub mod share;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{CodeLookupConfig, PollConfig, RoleDefaults, SyncConfig, CONFIG_FILE_NAME};
pub use identity::{IdentityResolver, IdentitySignals, Resolution, Strategy};
pub use orchestrator::{InvitationInput, SyncOrchestrator, SHARE_CODE_LEN};
pub use poller::{PollOptions, PollTask, SyncPoller};
pub use remote::{RemoteBackend, RemoteResult, ShareCodeLookup};
pub use router::{twin_id, PartitionRouter, ResolvedTargets, TwinPlan};
pub use session::{SessionStore, SESSION_FILE_NAME};
pub use share::{ImportSummary, ShareLifecycleManager};
