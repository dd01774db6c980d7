use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

/// The state a replica set member reports for itself.
///
/// This is the externally visible state, distinct from the protocol
/// [`Role`](crate::Role): several member states map onto the follower role,
/// and `Secondary` maps onto either follower or candidate.
#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub enum MemberState {
    Startup,
    Primary,
    Secondary,
    Recovering,
    Startup2,
    #[default]
    Unknown,
    Arbiter,
    Down,
    Rollback,
    Removed,
}

impl MemberState {
    pub fn is_primary(&self) -> bool {
        *self == MemberState::Primary
    }

    pub fn is_secondary(&self) -> bool {
        *self == MemberState::Secondary
    }

    /// States in which a member holds readable data.
    pub fn is_readable(&self) -> bool {
        matches!(self, MemberState::Primary | MemberState::Secondary)
    }

    /// States the applier may set on a follower via `set_follower_mode`.
    pub fn is_valid_follower_mode(&self) -> bool {
        matches!(
            self,
            MemberState::Secondary | MemberState::Startup2 | MemberState::Rollback | MemberState::Recovering
        )
    }
}

impl Display for MemberState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemberState::Startup => "STARTUP",
            MemberState::Primary => "PRIMARY",
            MemberState::Secondary => "SECONDARY",
            MemberState::Recovering => "RECOVERING",
            MemberState::Startup2 => "STARTUP2",
            MemberState::Unknown => "UNKNOWN",
            MemberState::Arbiter => "ARBITER",
            MemberState::Down => "DOWN",
            MemberState::Rollback => "ROLLBACK",
            MemberState::Removed => "REMOVED",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of the most recent heartbeat exchange with a member.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum HealthStatus {
    /// No heartbeat has completed yet.
    #[default]
    Unknown,
    /// The last heartbeat round trip succeeded.
    Up,
    /// The member rejected our credentials.
    AuthFailed,
    /// The member is unreachable or has exhausted its retry budget.
    Down,
}

impl HealthStatus {
    pub fn is_up(&self) -> bool {
        *self == HealthStatus::Up
    }
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Up => "up",
            HealthStatus::AuthFailed => "auth failed",
            HealthStatus::Down => "down",
        };
        write!(f, "{}", s)
    }
}
