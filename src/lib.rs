//! Hearthshare - two-tier replication and sharing for co-owned family archives
//!
//! A primary device and invited co-owner devices populate a partitioned
//! dataset together. Records live either in the device owner's Private
//! partition or in the Shared partition that syncs through a cloud backend
//! this crate does not control.
//!
//! # Quick Start
//!
//! ```ignore
//! use hearthshare::{RecordPayload, SessionState, Role, SyncOrchestrator};
//!
//! let engine = SyncOrchestrator::open("./data", remote, codes)?;
//! engine.set_session(SessionState::primary(Role::A))?;
//!
//! let ada = engine.add_record(RecordPayload::grandchild("Ada"), &[]).await?;
//! engine.add_record(RecordPayload::memory("first steps"), &[ada.id]).await?;
//!
//! // Invite someone; everything attached to Ada moves to Shared
//! let handle = engine.create_share(ada.id).await?;
//! ```
//!
//! # Architecture
//!
//! All operations go through the [`SyncOrchestrator`]. Identity resolution,
//! routing, share lifecycle and polling are exposed for callers that need
//! them directly; storage internals are limited to the record store.

pub use hearthshare_engine::*;

pub use hearthshare_core::{
    normalize_name, AcceptResult, Contributor, ContributorProfile, Edge, EdgeKind, Error,
    IdentityKey, InvitationMetadata, MediaRef, Partition, PartitionFilter, Permission,
    PersistedSession, Record, RecordId, RecordKind, RecordPayload, RemoteError, RemoteRecord,
    RemoteShare, Result, Role, SessionState, ShareHandle, ShareState,
};
pub use hearthshare_storage::{RecordStore, RelocationPlan, UpsertOutcome};
