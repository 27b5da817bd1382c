//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's
//! main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::{Arc, Once};

pub use hearthshare::testing::{SimulatedCloud, StaticCodeLookup};
pub use hearthshare::{
    Error, Partition, Permission, Record, RecordId, RecordKind, RecordPayload, Role,
    SessionState, SyncConfig, SyncOrchestrator,
};
pub use tokio_util::sync::CancellationToken;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Config with short code-lookup delays; poll cadence stays at defaults.
pub fn fast_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.code_lookup.retry_delay_ms = 1;
    config
}

// ============================================================================
// Sessions
// ============================================================================

/// Primary device of Pat (role A, account u1).
pub fn pat_session() -> SessionState {
    SessionState::primary(Role::A)
        .with_identity("u1")
        .with_display_name("Pat")
}

/// Fresh device of Sam (account u2) that has not joined anything yet.
pub fn sam_session() -> SessionState {
    SessionState::default()
        .with_identity("u2")
        .with_display_name("Sam")
}

// ============================================================================
// Family - one simulated cloud, several devices
// ============================================================================

/// A simulated backend plus the code service every device talks to.
pub struct Family {
    pub cloud: SimulatedCloud,
    pub codes: Arc<StaticCodeLookup>,
}

impl Family {
    pub fn new() -> Self {
        init_tracing();
        Family {
            cloud: SimulatedCloud::new(),
            codes: Arc::new(StaticCodeLookup::new()),
        }
    }

    /// In-memory device signed in as `identity` with `session`.
    pub fn device(&self, identity: &str, session: SessionState) -> SyncOrchestrator {
        let engine = SyncOrchestrator::ephemeral(
            fast_config(),
            self.cloud.account(identity),
            self.codes.clone(),
        )
        .expect("Failed to create engine");
        engine.set_session(session).expect("Failed to set session");
        engine
    }

    /// Pat's primary device.
    pub fn pat(&self) -> SyncOrchestrator {
        self.device("u1", pat_session())
    }

    /// Sam's device.
    pub fn sam(&self) -> SyncOrchestrator {
        self.device("u2", sam_session())
    }
}

impl Default for Family {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Grandchild plus one memory about it, both Private.
pub async fn grandchild_with_memory(engine: &SyncOrchestrator) -> (Record, Record) {
    let g = engine
        .add_record(RecordPayload::grandchild("Ada"), &[])
        .await
        .unwrap();
    let m = engine
        .add_record(RecordPayload::memory("first steps"), &[g.id])
        .await
        .unwrap();
    (g, m)
}

/// Assert that no edge spans two partitions.
pub fn assert_co_resident(engine: &SyncOrchestrator) {
    let violations = engine.store().co_residency_violations();
    assert!(
        violations.is_empty(),
        "co-residency violated by {} edge(s): {:?}",
        violations.len(),
        violations
    );
}
