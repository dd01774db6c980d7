use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::config::MemberConfig;
use crate::config::MemberId;
use crate::config::ReplSetTagPattern;
use crate::host_port::HostAndPort;

/// An immutable replica set configuration snapshot.
///
/// The caller parses and validates configurations; the coordinator only reads
/// them. `version` strictly increases across reconfigs and totally orders
/// snapshots of the same set.
#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct ReplSetConfig {
    pub set_name: String,

    /// Strictly increasing across reconfigs. Zero means uninitialized.
    pub version: i64,

    pub members: Vec<MemberConfig>,

    /// How long a follower waits after losing contact with the primary before
    /// standing for election.
    pub election_timeout: Duration,

    pub heartbeat_interval: Duration,

    /// Whether a secondary may sync from another secondary.
    pub chaining_allowed: bool,

    /// Replication protocol version, 0 (legacy) or 1.
    pub protocol_version: i64,

    /// Whether majority commit is computed over durable (journaled) opTimes
    /// rather than applied opTimes.
    pub write_concern_majority_journal_default: bool,

    /// Named custom write-concern tag patterns.
    pub custom_write_concerns: BTreeMap<String, ReplSetTagPattern>,

    /// How long a fresher member waits before a catch-up takeover of a stale
    /// primary.
    pub catchup_takeover_delay: Duration,

    /// Opaque id stamped on the set at initiation, carried in metadata.
    pub replica_set_id: u64,
}

impl ReplSetConfig {
    pub const DEFAULT_ELECTION_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_CATCHUP_TAKEOVER_DELAY: Duration = Duration::from_secs(30);

    /// The placeholder held before the first `update_config`.
    pub fn uninitialized() -> Self {
        ReplSetConfig {
            set_name: String::new(),
            version: 0,
            members: Vec::new(),
            election_timeout: Self::DEFAULT_ELECTION_TIMEOUT,
            heartbeat_interval: Self::DEFAULT_HEARTBEAT_INTERVAL,
            chaining_allowed: true,
            protocol_version: 1,
            write_concern_majority_journal_default: true,
            custom_write_concerns: BTreeMap::new(),
            catchup_takeover_delay: Self::DEFAULT_CATCHUP_TAKEOVER_DELAY,
            replica_set_id: 0,
        }
    }

    /// A protocol-v1 configuration with the given members and defaults for
    /// everything else.
    pub fn new(set_name: impl ToString, version: i64, members: Vec<MemberConfig>) -> Self {
        ReplSetConfig {
            set_name: set_name.to_string(),
            version,
            members,
            ..Self::uninitialized()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.version > 0 && !self.members.is_empty()
    }

    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    pub fn member_at(&self, index: usize) -> &MemberConfig {
        &self.members[index]
    }

    pub fn find_member_index_by_host(&self, host: &HostAndPort) -> Option<usize> {
        self.members.iter().position(|m| &m.host == host)
    }

    pub fn find_member_index_by_id(&self, id: MemberId) -> Option<usize> {
        self.members.iter().position(|m| m.id == id)
    }

    /// Sum of vote weights across all members.
    pub fn total_votes(&self) -> u32 {
        self.members.iter().map(|m| m.votes as u32).sum()
    }

    pub fn num_voters(&self) -> usize {
        self.members.iter().filter(|m| m.is_voter()).count()
    }

    /// The vote weight a strict majority must reach: `⌊total/2⌋ + 1`.
    pub fn majority_vote_count(&self) -> u32 {
        self.total_votes() / 2 + 1
    }

    /// True when this node is the only member that can ever become primary.
    pub fn is_single_electable_voter_set(&self, self_index: usize) -> bool {
        self.num_voters() == 1
            && self.member_at(self_index).is_voter()
            && self.member_at(self_index).is_electable()
    }

    /// Number of distinct priorities strictly greater than `priority`.
    ///
    /// Rank 0 means no member outranks the given priority.
    pub fn priority_rank(&self, priority: f64) -> usize {
        let mut higher: Vec<u64> = self
            .members
            .iter()
            .filter(|m| m.priority > priority)
            .map(|m| m.priority.to_bits())
            .collect();
        higher.sort_unstable();
        higher.dedup();
        higher.len()
    }

    /// How long the member at `index` defers to higher-priority members
    /// before taking over a lower-priority primary.
    pub fn priority_takeover_delay(&self, index: usize) -> Duration {
        let rank = self.priority_rank(self.member_at(index).priority);
        self.election_timeout * (rank as u32 + 1)
    }
}
