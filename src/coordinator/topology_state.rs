use std::error::Error;
use std::time::Instant;

use validit::Validate;

use crate::coordinator::LeaderMode;
use crate::coordinator::Role;
use crate::last_vote::LastVote;
use crate::member_state::MemberState;
use crate::optime::ElectionId;
use crate::optime::OpTime;
use crate::optime::Term;
use crate::optime::Timestamp;

/// The protocol core of the coordinator: role, term, vote, and commit point.
///
/// Kept separate from the member registry and configuration so the whole
/// record can live behind `validit::Valid`, re-checking its invariants on
/// every access in debug builds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TopologyState {
    pub(crate) role: Role,
    pub(crate) leader_mode: LeaderMode,

    /// Reported state while `role` is follower; set by the applier.
    pub(crate) follower_mode: MemberState,
    pub(crate) maintenance_count: u32,

    pub(crate) term: Term,
    pub(crate) last_vote: LastVote,

    pub(crate) last_committed_op_time: OpTime,
    /// Commit floor for the current tenure as primary.
    pub(crate) first_op_time_of_term: OpTime,

    pub(crate) self_index: Option<usize>,
    pub(crate) current_primary_index: Option<usize>,

    /// This node declines candidacy before this instant.
    pub(crate) election_sleep_until: Option<Instant>,

    /// Set while this node is (or last was) primary.
    pub(crate) election_time: Option<Timestamp>,
    pub(crate) election_id: Option<ElectionId>,
}

impl Default for TopologyState {
    fn default() -> Self {
        TopologyState {
            role: Role::Follower,
            leader_mode: LeaderMode::NotLeader,
            follower_mode: MemberState::Startup,
            maintenance_count: 0,
            term: 0,
            last_vote: LastVote::default(),
            last_committed_op_time: OpTime::default(),
            first_op_time_of_term: OpTime::default(),
            self_index: None,
            current_primary_index: None,
            election_sleep_until: None,
            election_time: None,
            election_id: None,
        }
    }
}

impl TopologyState {
    /// Move to a new leader mode, asserting the transition is legal.
    pub(crate) fn set_leader_mode(&mut self, to: LeaderMode) {
        assert!(
            self.leader_mode.can_transition_to(to),
            "illegal leader mode transition: {} -> {}",
            self.leader_mode,
            to
        );
        tracing::debug!(from = display(self.leader_mode), to = display(to), "leader mode transition");
        self.leader_mode = to;
    }

    // Compound transitions. Each runs under a single deref of the `Valid`
    // wrapper so intermediate field states are never observed by validation.

    pub(crate) fn become_candidate(&mut self) {
        assert_eq!(Role::Follower, self.role, "only a follower may become candidate");
        self.role = Role::Candidate;
    }

    /// Candidate -> leader-elect, with ourselves as primary.
    pub(crate) fn win_election(&mut self, election_id: ElectionId, election_time: Timestamp) {
        assert_eq!(Role::Candidate, self.role, "winning an election requires candidate role");
        assert!(self.self_index.is_some(), "a non-member cannot win an election");

        self.role = Role::Leader;
        self.set_leader_mode(LeaderMode::LeaderElect);
        self.current_primary_index = self.self_index;
        self.election_id = Some(election_id);
        self.election_time = Some(election_time);
    }

    pub(crate) fn lose_election(&mut self) {
        assert_eq!(Role::Candidate, self.role, "losing an election requires candidate role");
        self.role = Role::Follower;
    }

    /// Relinquish leadership at once, passing through stepping-down so the
    /// mode transitions stay legal.
    pub(crate) fn step_down_to_follower(&mut self) {
        assert_eq!(Role::Leader, self.role, "only a leader can step down");

        if self.leader_mode != LeaderMode::SteppingDown {
            self.set_leader_mode(LeaderMode::SteppingDown);
        }
        self.set_leader_mode(LeaderMode::NotLeader);
        self.role = Role::Follower;
        self.current_primary_index = None;
    }

    /// Abandon candidacy when a newer term surfaces.
    pub(crate) fn abandon_candidacy(&mut self) {
        if self.role == Role::Candidate {
            self.role = Role::Follower;
        }
    }

    /// Settle role, self index, and primary index against a freshly installed
    /// configuration. Returns true when a leader was demoted because it is no
    /// longer a member. Bypasses the leader-mode diagram on demotion: the old
    /// tenure no longer exists.
    pub(crate) fn apply_membership(&mut self, self_index: Option<usize>) -> bool {
        self.abandon_candidacy();
        self.self_index = self_index;

        match (self.role, self_index) {
            (Role::Leader, Some(idx)) => {
                self.current_primary_index = Some(idx);
                false
            }
            (Role::Leader, None) => {
                self.role = Role::Follower;
                self.leader_mode = LeaderMode::NotLeader;
                self.current_primary_index = None;
                true
            }
            _ => {
                self.current_primary_index = None;
                false
            }
        }
    }
}

impl Validate for TopologyState {
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        match self.role {
            Role::Leader => {
                if self.leader_mode == LeaderMode::NotLeader {
                    return Err("leader role requires a leader mode".into());
                }
                if self.self_index.is_none() {
                    return Err("leader must be a member of the configuration".into());
                }
                validit::equal!(self.current_primary_index, self.self_index);
            }
            Role::Follower | Role::Candidate => {
                validit::equal!(self.leader_mode, LeaderMode::NotLeader);
            }
        }

        validit::less_equal!(self.last_vote.term, self.term);

        Ok(())
    }
}
