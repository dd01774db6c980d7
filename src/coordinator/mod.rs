//! The topology coordination engine.
//!
//! [`TopologyCoordinator`] is a pure decision engine: every entry point is
//! non-blocking, performs no I/O, and runs under a single lock held by the
//! caller. Inputs are absolute instants, parsed protocol messages, and
//! configuration snapshots; outputs are actions for the replication runtime
//! and formed replies. The implementation is split per concern across the
//! sibling files, one `impl TopologyCoordinator` block each.

mod actions;
mod commit;
mod config_update;
mod election;
mod heartbeat;
mod registry;
mod responses;
mod role;
mod step_down;
mod sync_source;
mod topology_state;

#[cfg(test)] mod commit_test;
#[cfg(test)] mod config_update_test;
#[cfg(test)] mod responses_test;
#[cfg(test)] mod step_down_test;
#[cfg(test)] pub(crate) mod testing;

use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use validit::Valid;

pub use actions::ChainingPreference;
pub use actions::HeartbeatAction;
pub use actions::HeartbeatResponseAction;
pub use actions::PrepareFreezeResponseResult;
pub use actions::StartElectionReason;
pub use actions::UpdateTermResult;
pub use role::LeaderMode;
pub use role::Role;

use crate::config::MemberId;
use crate::config::ReplSetConfig;
use crate::host_port::HostAndPort;
use crate::member_data::MemberData;
use crate::member_state::MemberState;
use crate::optime::OpTime;
use crate::optime::Term;
use crate::last_vote::LastVote;
use topology_state::TopologyState;

/// Tunables that are properties of this node rather than of the replica set
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// How far a sync source may trail the freshest syncable member before we
    /// abandon it.
    pub max_sync_source_lag: Duration,

    /// First-pass ping ceiling when choosing a sync source.
    pub sync_source_ping_threshold: Duration,

    /// How far our applied opTime may trail the freshest observed member and
    /// still stand for election.
    pub election_freshness_threshold: Duration,

    /// Fraction of the election timeout used as the jitter range.
    pub election_jitter_fraction: f64,

    /// Seed for the jitter source; tests pin it for determinism.
    pub election_jitter_seed: Option<u64>,

    /// Failed heartbeat attempts tolerated before the failure window starts
    /// counting against the member.
    pub heartbeat_retries: u32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_sync_source_lag: Duration::from_secs(30),
            sync_source_ping_threshold: Duration::from_millis(30),
            election_freshness_threshold: Duration::from_secs(10),
            election_jitter_fraction: 0.15,
            election_jitter_seed: None,
            heartbeat_retries: 2,
        }
    }
}

/// The replica-set topology coordinator.
///
/// Owns the node's view of the cluster: who is up, who leads, what is
/// committed, and where this node syncs from. The replication runtime drives
/// it through the entry points and acts on the returned values; it never
/// mutates coordinator state directly.
#[derive(Debug)]
pub struct TopologyCoordinator {
    options: Options,
    rng: StdRng,

    pub(crate) state: Valid<TopologyState>,
    pub(crate) config: ReplSetConfig,
    pub(crate) members: Vec<MemberData>,
    /// Entries for legacy master/slave peers, keyed by rid rather than by
    /// config index.
    pub(crate) slave_members: Vec<MemberData>,

    pub(crate) sync_source: Option<HostAndPort>,
    pub(crate) sync_source_blacklist: BTreeMap<HostAndPort, Instant>,
    pub(crate) force_sync_source_index: Option<usize>,

    pub(crate) my_heartbeat_message: String,
    pub(crate) storage_engine_supports_read_committed: bool,

    /// When we last saw evidence of a live primary; basis of the election
    /// timeout.
    pub(crate) last_primary_contact: Option<Instant>,
    /// Jitter added to the election timeout, re-rolled per election cycle.
    pub(crate) random_election_offset: Duration,

    /// Since when we have continuously observed a primary we outrank.
    pub(crate) lower_priority_primary_since: Option<Instant>,
    /// Since when the primary's opTime has been continuously behind ours.
    pub(crate) primary_stale_since: Option<Instant>,

    /// Protocol v0 vote lease: when we last voted and for whom.
    pub(crate) vote_lease: Option<(Instant, MemberId)>,
}

/// Protocol v0 election vote lease window.
pub(crate) const VOTE_LEASE: Duration = Duration::from_secs(60);

impl TopologyCoordinator {
    pub fn new(options: Options, now: Instant) -> Self {
        let rng = match options.election_jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Seed an entry for ourselves so progress reporting works before the
        // first configuration is installed.
        let self_entry = MemberData::new(0, MemberId(-1), HostAndPort::default(), true, now);

        TopologyCoordinator {
            options,
            rng,
            state: Valid::new(TopologyState::default()),
            config: ReplSetConfig::uninitialized(),
            members: vec![self_entry],
            slave_members: Vec::new(),
            sync_source: None,
            sync_source_blacklist: BTreeMap::new(),
            force_sync_source_index: None,
            my_heartbeat_message: String::new(),
            storage_engine_supports_read_committed: true,
            last_primary_contact: None,
            random_election_offset: Duration::ZERO,
            lower_priority_primary_since: None,
            primary_stale_since: None,
            vote_lease: None,
        }
    }

    // --- State inspection.

    pub fn role(&self) -> Role {
        self.state.role
    }

    /// The member state this node reports to the rest of the set.
    pub fn member_state(&self) -> MemberState {
        if self.state.self_index.is_none() {
            return if self.config.is_initialized() {
                MemberState::Removed
            } else {
                MemberState::Startup
            };
        }

        match self.state.role {
            Role::Leader => MemberState::Primary,
            Role::Candidate => MemberState::Secondary,
            Role::Follower => {
                if self.self_config().arbiter_only {
                    return MemberState::Arbiter;
                }
                if self.state.maintenance_count > 0 && self.state.follower_mode == MemberState::Secondary {
                    return MemberState::Recovering;
                }
                self.state.follower_mode
            }
        }
    }

    /// True iff this node is a fully established primary.
    pub fn can_accept_writes(&self) -> bool {
        self.state.role == Role::Leader && self.state.leader_mode == LeaderMode::Master
    }

    /// True during either kind of stepdown, conditional or not.
    pub fn is_stepping_down(&self) -> bool {
        matches!(
            self.state.leader_mode,
            LeaderMode::SteppingDown | LeaderMode::AttemptingStepDown
        )
    }

    pub fn term(&self) -> Term {
        self.state.term
    }

    pub fn last_vote(&self) -> LastVote {
        self.state.last_vote
    }

    pub fn maintenance_count(&self) -> u32 {
        self.state.maintenance_count
    }

    pub fn current_primary_index(&self) -> Option<usize> {
        self.state.current_primary_index
    }

    pub fn last_committed_op_time(&self) -> OpTime {
        self.state.last_committed_op_time
    }

    /// Earliest instant this node will stand for election, if frozen.
    pub fn election_sleep_until(&self) -> Option<Instant> {
        self.state.election_sleep_until
    }

    pub fn sync_source_address(&self) -> Option<&HostAndPort> {
        self.sync_source.as_ref()
    }

    pub fn config(&self) -> &ReplSetConfig {
        &self.config
    }

    // --- Role state machine mutators.

    /// Change the reported follower state; the applier's interface for
    /// flagging STARTUP2 / ROLLBACK / RECOVERING phases.
    ///
    /// Calling this while not a follower is a programmer error.
    pub fn set_follower_mode(&mut self, new_mode: MemberState) {
        assert_eq!(
            Role::Follower,
            self.state.role,
            "cannot set follower mode while {}",
            self.state.role
        );
        assert!(
            new_mode.is_valid_follower_mode(),
            "{} is not a follower mode",
            new_mode
        );

        self.state.follower_mode = new_mode;
    }

    /// Adjust the maintenance counter; positive while background maintenance
    /// tasks run. Only a follower may be in maintenance, and the counter may
    /// not go negative.
    pub fn adjust_maintenance_count_by(&mut self, inc: i32) {
        assert_eq!(
            Role::Follower,
            self.state.role,
            "cannot adjust maintenance count while {}",
            self.state.role
        );

        let new_count = self.state.maintenance_count as i64 + inc as i64;
        assert!(new_count >= 0, "maintenance count cannot go negative");
        self.state.maintenance_count = new_count as u32;
    }

    /// Finish catchup and drain: start accepting writes, with
    /// `first_op_time_of_term` as the commit floor for this tenure.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn complete_transition_to_primary(&mut self, first_op_time_of_term: OpTime) {
        assert_eq!(
            LeaderMode::LeaderElect,
            self.state.leader_mode,
            "completing a transition to primary requires leader-elect mode"
        );

        self.state.set_leader_mode(LeaderMode::Master);
        self.state.first_op_time_of_term = first_op_time_of_term;
        self.state.election_sleep_until = None;
    }

    pub fn set_election_sleep_until(&mut self, until: Instant) {
        self.state.election_sleep_until = Some(until);
    }

    /// Record that the storage engine can(not) serve majority reads; surfaced
    /// through isMaster.
    pub fn set_storage_engine_supports_read_committed(&mut self, supported: bool) {
        self.storage_engine_supports_read_committed = supported;
    }

    // --- Internal helpers shared across the impl files.

    pub(crate) fn self_config(&self) -> &crate::config::MemberConfig {
        let idx = self.state.self_index.expect("self must be in the configuration");
        self.config.member_at(idx)
    }

    pub(crate) fn self_id(&self) -> MemberId {
        self.self_config().id
    }

    pub(crate) fn is_member(&self) -> bool {
        self.state.self_index.is_some()
    }

    /// The member currently believed primary, if any.
    pub(crate) fn current_primary_member(&self) -> Option<&MemberData> {
        self.state.current_primary_index.map(|i| &self.members[i])
    }

    /// Position of our own entry in the member registry. The entry always
    /// exists, even before a configuration is installed or after this node is
    /// dropped from one.
    pub(crate) fn my_member_index(&self) -> usize {
        self.members
            .iter()
            .position(|m| m.is_self)
            .expect("the registry always holds a self entry")
    }

    /// Re-roll the per-cycle election jitter.
    pub(crate) fn reroll_election_offset(&mut self) {
        use rand::Rng;

        let range_ms = (self.config.election_timeout.as_millis() as f64 * self.options.election_jitter_fraction) as u64;
        let offset_ms = if range_ms == 0 { 0 } else { self.rng.gen_range(0..=range_ms) };
        self.random_election_offset = Duration::from_millis(offset_ms);
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }
}
