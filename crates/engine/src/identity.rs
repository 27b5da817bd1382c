//! Identity resolution
//!
//! Maps a device session to a durable contributor. The rules are an ordered
//! list of strategies evaluated in a loop; the first one that produces a
//! contributor wins. Resolution is a pure function of `(session, known
//! contributors)`: the resolver never writes, and ties inside a strategy are
//! broken by partition (Private first) and then by id, so input order does
//! not matter.
//!
//! | # | Strategy | Matches |
//! |---|----------|---------|
//! | 1 | RemoteIdentity | contributor with the session's remote identity key |
//! | 2 | PrimaryDevice | primary (non co-owner) device: contributor with the primary role |
//! | 3 | CurrentRole | contributor with the session's current role |
//! | 4 | CoOwnerDevice | co-owner device: co-owner role, materialized if missing |
//! | 5 | PrimaryRole | contributor with the session's primary role |
//! | 6 | DisplayName | contributor whose name matches the session's display name |
//! | 7 | AnyCanonical | any contributor with a canonical role |

use tracing::debug;

use hearthshare_core::{
    normalize_name, Contributor, ContributorProfile, Error, IdentityKey, Partition, RecordId, Result,
    Role, SessionState,
};

use crate::config::{RoleDefaults, SyncConfig};

/// One rule of the resolution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Session remote identity key equals a contributor's key
    RemoteIdentity,
    /// Primary device acting as the primary role
    PrimaryDevice,
    /// Session's current role
    CurrentRole,
    /// Co-owner device: canonical co-owner role, created when missing
    CoOwnerDevice,
    /// Session's primary role
    PrimaryRole,
    /// Locally-known display name
    DisplayName,
    /// Any contributor with a canonical role
    AnyCanonical,
}

impl Strategy {
    /// Full chain, in priority order
    pub const CHAIN: [Strategy; 7] = [
        Strategy::RemoteIdentity,
        Strategy::PrimaryDevice,
        Strategy::CurrentRole,
        Strategy::CoOwnerDevice,
        Strategy::PrimaryRole,
        Strategy::DisplayName,
        Strategy::AnyCanonical,
    ];

    /// Chain used for authorization: no catch-all, no materialization
    pub const STRICT: [Strategy; 6] = [
        Strategy::RemoteIdentity,
        Strategy::PrimaryDevice,
        Strategy::CurrentRole,
        Strategy::CoOwnerDevice,
        Strategy::PrimaryRole,
        Strategy::DisplayName,
    ];
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Chosen contributor
    pub contributor: Contributor,
    /// Strategy that produced it
    pub strategy: Strategy,
    /// The contributor does not exist yet and must be inserted by the caller
    pub materialized: bool,
    /// Remote identity to write onto the contributor, when it has none
    pub backfill_identity: Option<IdentityKey>,
}

/// Identity signals compared when authorizing a deletion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySignals {
    /// Authenticated account
    pub remote_identity_key: Option<IdentityKey>,
    /// Canonical role
    pub role: Option<Role>,
    /// Display name
    pub display_name: Option<String>,
}

impl IdentitySignals {
    /// Whether at least one signal is present on both sides and equal
    ///
    /// Display names compare after normalization; blank names never match.
    pub fn matches(&self, other: &IdentitySignals) -> bool {
        let key_match = matches!(
            (&self.remote_identity_key, &other.remote_identity_key),
            (Some(a), Some(b)) if a == b
        );
        let role_match = matches!((self.role, other.role), (Some(a), Some(b)) if a == b);
        let name_match = match (&self.display_name, &other.display_name) {
            (Some(a), Some(b)) => {
                let a = normalize_name(a);
                !a.is_empty() && a == normalize_name(b)
            }
            _ => false,
        };
        key_match || role_match || name_match
    }
}

impl From<&Contributor> for IdentitySignals {
    fn from(c: &Contributor) -> Self {
        Self {
            remote_identity_key: c.profile.remote_identity_key.clone(),
            role: Some(c.profile.role),
            display_name: Some(c.profile.display_name.clone()),
        }
    }
}

impl From<&SessionState> for IdentitySignals {
    fn from(s: &SessionState) -> Self {
        Self {
            remote_identity_key: s.remote_identity_key.clone(),
            role: s.current_role,
            display_name: s.display_name.clone(),
        }
    }
}

/// Resolves a session to a contributor
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    primary_role: Role,
    co_owner_role: Role,
    co_owner_defaults: RoleDefaults,
}

impl IdentityResolver {
    /// Resolver using the configured canonical roles
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            primary_role: config.primary_role,
            co_owner_role: config.co_owner_role,
            co_owner_defaults: config.role_defaults(config.co_owner_role).clone(),
        }
    }

    /// Canonical role of the primary owner
    pub fn primary_role(&self) -> Role {
        self.primary_role
    }

    /// Canonical role of an invited co-owner
    pub fn co_owner_role(&self) -> Role {
        self.co_owner_role
    }

    /// Stable id of the contributor materialized for `role`
    pub fn materialized_id(role: Role) -> RecordId {
        RecordId::derived(&format!("hearthshare:contributor:{}", role))
    }

    /// Run the full chain
    ///
    /// # Errors
    /// `NoContributorAvailable` when nothing matches; the caller creates a
    /// contributor and resolves again.
    pub fn resolve(&self, session: &SessionState, known: &[Contributor]) -> Result<Resolution> {
        self.run(&Strategy::CHAIN, session, known, true)
            .ok_or(Error::NoContributorAvailable)
    }

    /// Run the chain without the catch-all step and without materializing
    pub fn resolve_strict(&self, session: &SessionState, known: &[Contributor]) -> Option<Resolution> {
        self.run(&Strategy::STRICT, session, known, false)
    }

    /// Signals describing the session's user, for authorization
    pub fn signals_for(&self, session: &SessionState, known: &[Contributor]) -> IdentitySignals {
        match self.resolve_strict(session, known) {
            Some(resolution) => {
                let mut signals = IdentitySignals::from(&resolution.contributor);
                if signals.remote_identity_key.is_none() {
                    signals.remote_identity_key = session.remote_identity_key.clone();
                }
                signals
            }
            None => IdentitySignals::from(session),
        }
    }

    fn run(
        &self,
        chain: &[Strategy],
        session: &SessionState,
        known: &[Contributor],
        allow_materialize: bool,
    ) -> Option<Resolution> {
        for strategy in chain {
            let Some((contributor, materialized)) =
                self.apply(*strategy, session, known, allow_materialize)
            else {
                continue;
            };
            let backfill_identity = match (&session.remote_identity_key, &contributor.profile.remote_identity_key) {
                (Some(key), None) => Some(key.clone()),
                _ => None,
            };
            debug!(
                target: "hearthshare::identity",
                strategy = ?strategy,
                contributor = %contributor.id,
                materialized,
                backfill = backfill_identity.is_some(),
                "resolved contributor"
            );
            return Some(Resolution {
                contributor,
                strategy: *strategy,
                materialized,
                backfill_identity,
            });
        }
        None
    }

    fn apply(
        &self,
        strategy: Strategy,
        session: &SessionState,
        known: &[Contributor],
        allow_materialize: bool,
    ) -> Option<(Contributor, bool)> {
        let existing = |found: Option<&Contributor>| found.map(|c| (c.clone(), false));
        match strategy {
            Strategy::RemoteIdentity => {
                let key = session.remote_identity_key.as_ref()?;
                existing(pick(known, |c| c.profile.remote_identity_key.as_ref() == Some(key)))
            }
            Strategy::PrimaryDevice => {
                if !session.is_primary_device || session.is_co_owner_device {
                    return None;
                }
                let role = session.primary_role.unwrap_or(self.primary_role);
                existing(pick(known, |c| c.profile.role == role))
            }
            Strategy::CurrentRole => {
                let role = session.current_role?;
                existing(pick(known, |c| c.profile.role == role))
            }
            Strategy::CoOwnerDevice => {
                if !session.is_co_owner_device {
                    return None;
                }
                let role = self.co_owner_role;
                match pick(known, |c| c.profile.role == role) {
                    Some(found) => Some((found.clone(), false)),
                    None if allow_materialize => Some((self.materialize(session), true)),
                    None => None,
                }
            }
            Strategy::PrimaryRole => {
                let role = session.primary_role?;
                existing(pick(known, |c| c.profile.role == role))
            }
            Strategy::DisplayName => {
                let name = session.display_name.as_deref()?;
                existing(pick(known, |c| c.name_matches(name)))
            }
            Strategy::AnyCanonical => {
                let preferred = if session.is_co_owner_device {
                    [self.co_owner_role, self.primary_role]
                } else {
                    [self.primary_role, self.co_owner_role]
                };
                preferred
                    .iter()
                    .find_map(|role| pick(known, |c| c.profile.role == *role))
                    .map(|c| (c.clone(), false))
            }
        }
    }

    fn materialize(&self, session: &SessionState) -> Contributor {
        let display_name = session
            .display_name
            .clone()
            .unwrap_or_else(|| self.co_owner_defaults.display_name.clone());
        Contributor {
            id: Self::materialized_id(self.co_owner_role),
            partition: Partition::Private,
            profile: ContributorProfile {
                display_name,
                role: self.co_owner_role,
                color_tag: self.co_owner_defaults.color_tag.clone(),
                remote_identity_key: session.remote_identity_key.clone(),
            },
        }
    }
}

/// Deterministic choice among matching contributors
fn pick<'a>(known: &'a [Contributor], pred: impl Fn(&Contributor) -> bool) -> Option<&'a Contributor> {
    known
        .iter()
        .filter(|c| pred(c))
        .min_by_key(|c| (c.partition, c.id))
}
