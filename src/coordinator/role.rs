use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

/// The role a node plays in the replication protocol.
///
/// Distinct from [`MemberState`](crate::MemberState): several member states
/// map onto `Follower`, and `SECONDARY` maps onto either `Follower` or
/// `Candidate`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub enum Role {
    Leader,
    #[default]
    Follower,
    Candidate,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Leader => "leader",
            Role::Follower => "follower",
            Role::Candidate => "candidate",
        };
        write!(f, "{}", s)
    }
}

/// Refinement of `Role::Leader`: what phase of a leadership tenure the node
/// is in. `Master` is the only mode in which writes are accepted.
///
/// Valid transitions:
///
/// ```text
///      NotLeader <----------------------------------
///         |                                        |
///         v                                        |
///      LeaderElect ----                            |
///         |           |                            |
///         v           |                            |
///      Master --------------------------           |
///       |  ^          |                |           |
///       |  |    ------------------     |           |
///       |  |    |                |     |           |
///       v  |    v                v     v           |
///  AttemptingStepDown--------->SteppingDown        |
///       |                            |             |
///       -------------------------------------------
/// ```
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub enum LeaderMode {
    #[default]
    NotLeader,
    /// Elected, but not yet accepting writes.
    LeaderElect,
    /// Fully primary; writes accepted.
    Master,
    /// An unconditional (heartbeat-driven) stepdown that must complete.
    SteppingDown,
    /// A command-driven stepdown attempt that may fail.
    AttemptingStepDown,
}

impl LeaderMode {
    /// Whether moving to `to` is one of the legal transitions. An illegal
    /// transition is a programmer error; callers assert on this.
    pub(crate) fn can_transition_to(self, to: LeaderMode) -> bool {
        use LeaderMode::*;
        match self {
            NotLeader => matches!(to, LeaderElect),
            LeaderElect => matches!(to, Master | SteppingDown | NotLeader),
            Master => matches!(to, AttemptingStepDown | SteppingDown),
            AttemptingStepDown => matches!(to, Master | SteppingDown | NotLeader),
            SteppingDown => matches!(to, NotLeader),
        }
    }
}

impl Display for LeaderMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LeaderMode::NotLeader => "not-leader",
            LeaderMode::LeaderElect => "leader-elect",
            LeaderMode::Master => "master",
            LeaderMode::SteppingDown => "stepping-down",
            LeaderMode::AttemptingStepDown => "attempting-step-down",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_mode_legal_transitions() {
        use LeaderMode::*;

        assert!(NotLeader.can_transition_to(LeaderElect));
        assert!(LeaderElect.can_transition_to(Master));
        assert!(Master.can_transition_to(AttemptingStepDown));
        assert!(AttemptingStepDown.can_transition_to(Master));
        assert!(Master.can_transition_to(SteppingDown));
        assert!(AttemptingStepDown.can_transition_to(SteppingDown));
        assert!(SteppingDown.can_transition_to(NotLeader));
        assert!(AttemptingStepDown.can_transition_to(NotLeader));

        assert!(!NotLeader.can_transition_to(Master));
        assert!(!Master.can_transition_to(LeaderElect));
        assert!(!Master.can_transition_to(NotLeader));
        assert!(!SteppingDown.can_transition_to(Master));
    }
}
