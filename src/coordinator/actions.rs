use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;

use crate::config::ReplSetConfig;

/// What the runtime must do after the coordinator ingested a heartbeat
/// response or ran a member timeout sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatAction {
    NoAction,

    /// The coordinator has become a candidate; the runtime must run the
    /// election protocol and finish with `process_win_election` or
    /// `process_lose_election`.
    StartElection,

    /// This node must relinquish primaryship. The runtime acquires its write
    /// lock, calls `prepare_for_unconditional_step_down`, then
    /// `finish_unconditional_step_down`.
    StepDownSelf,

    /// The remote member at `primary_index` claims primaryship it has lost;
    /// the runtime should ask it to step down.
    StepDownRemotePrimary { primary_index: usize },

    /// A peer advertised a newer configuration; the runtime validates it and
    /// calls `update_config`.
    Reconfig { new_config: ReplSetConfig },

    /// This node outranks the current primary and has deferred long enough.
    PriorityTakeover,

    /// The current primary has been stale relative to us long enough.
    CatchupTakeover,
}

/// A [`HeartbeatAction`] plus the schedule for the next heartbeat to the same
/// target. The runtime owns timers; the coordinator only names the instant.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatResponseAction {
    pub action: HeartbeatAction,
    pub next_heartbeat_at: Option<Instant>,
}

impl HeartbeatResponseAction {
    pub fn no_action() -> Self {
        HeartbeatResponseAction {
            action: HeartbeatAction::NoAction,
            next_heartbeat_at: None,
        }
    }

    pub fn start_election() -> Self {
        HeartbeatResponseAction {
            action: HeartbeatAction::StartElection,
            next_heartbeat_at: None,
        }
    }

    pub fn step_down_self() -> Self {
        HeartbeatResponseAction {
            action: HeartbeatAction::StepDownSelf,
            next_heartbeat_at: None,
        }
    }

    pub fn step_down_remote_primary(primary_index: usize) -> Self {
        HeartbeatResponseAction {
            action: HeartbeatAction::StepDownRemotePrimary { primary_index },
            next_heartbeat_at: None,
        }
    }

    pub fn reconfig(new_config: ReplSetConfig) -> Self {
        HeartbeatResponseAction {
            action: HeartbeatAction::Reconfig { new_config },
            next_heartbeat_at: None,
        }
    }

    pub fn priority_takeover() -> Self {
        HeartbeatResponseAction {
            action: HeartbeatAction::PriorityTakeover,
            next_heartbeat_at: None,
        }
    }

    pub fn catchup_takeover() -> Self {
        HeartbeatResponseAction {
            action: HeartbeatAction::CatchupTakeover,
            next_heartbeat_at: None,
        }
    }

    pub fn with_next_heartbeat(mut self, at: Instant) -> Self {
        self.next_heartbeat_at = Some(at);
        self
    }
}

/// Outcome of `update_term`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTermResult {
    /// The supplied term is not newer than ours.
    AlreadyUpToDate,
    /// The term advanced and this node was primary; the runtime must step it
    /// down.
    TriggerStepDown,
    /// The term advanced.
    UpdatedTerm,
}

/// Outcome of `prepare_freeze_response` beyond the reply itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareFreezeResponseResult {
    NoAction,
    /// Unfreezing a single-voter set: the runtime should run an election for
    /// this node immediately.
    ElectSelf,
}

/// What prompted a node to stand for election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum StartElectionReason {
    ElectionTimeout,
    PriorityTakeover,
    StepUpRequest,
    CatchupTakeover,
}

/// Whether `choose_new_sync_source` may chain through secondaries or must
/// honor the configuration's chaining setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainingPreference {
    AllowChaining,
    UseConfiguration,
}
