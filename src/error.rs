//! Error types exposed by this crate.
//!
//! The coordinator never retries and never surfaces transient failures: every
//! fallible entry point either updates state and returns an action, or returns
//! one of the typed errors below. Internal precondition violations are
//! programmer errors and panic instead.

use crate::optime::Term;

/// Failure to parse a `host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse address {input:?}: {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: String,
}

/// Errors surfaced in replies to peer protocol messages and admin commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("replica set names do not match, ours: {ours}; remote node's: {theirs}")]
    InconsistentReplicaSetNames { ours: String, theirs: String },

    #[error("replica set configured for protocol version {configured}; cannot process a protocol version {requested} request")]
    IncompatibleProtocolVersion { configured: i64, requested: i64 },

    #[error("{0}")]
    BadValue(String),

    #[error("{0}")]
    NotSecondary(String),

    #[error("{0}")]
    ConflictingOperationInProgress(String),

    #[error("{0}")]
    NotYetInitialized(String),

    #[error("term changed, expected {expected} but found {actual}")]
    StaleTerm { expected: Term, actual: Term },

    #[error("{0}")]
    NodeNotFound(String),

    #[error("{0}")]
    ExceededTimeLimit(String),
}

/// Why this node declines to stand for election right now.
///
/// Returned by `check_should_stand_for_election` so the runtime can log the
/// precise reason a scheduled election did not fire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElectionIneligible {
    #[error("not a member of a valid replica set configuration")]
    NoConfig,

    #[error("this node is not a member of the current configuration")]
    NotAMember,

    #[error("member is not currently a secondary; state: {state}")]
    NotSecondary { state: String },

    #[error("member is in maintenance mode ({count} tasks)")]
    Maintenance { count: u32 },

    #[error("election period has not yet started; frozen for {remaining_ms} more ms")]
    Frozen { remaining_ms: u128 },

    #[error("member has no votes or zero priority and cannot seek election")]
    NotElectableInConfig,

    #[error("a primary is already visible at member index {primary_index}")]
    PrimaryVisible { primary_index: usize },

    #[error("member is too stale to stand for election; lagging the freshest member by more than the freshness threshold")]
    TooStale,

    #[error("member is already a {role} and cannot become a candidate")]
    WrongRole { role: String },
}
