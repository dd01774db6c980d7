use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::host_port::HostAndPort;

/// The id a member is assigned in the replica set configuration.
///
/// Member ids are stable across reconfigs; config indexes are not.
#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub struct MemberId(pub i64);

impl Display for MemberId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One member's entry in a replica set configuration.
#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct MemberConfig {
    pub id: MemberId,
    pub host: HostAndPort,

    /// Election priority, `>= 0`. Zero means the member never seeks election.
    pub priority: f64,

    /// Vote weight, 0 or 1.
    pub votes: u8,

    /// Arbiters vote but carry no data.
    pub arbiter_only: bool,

    /// Hidden members are invisible to clients and never chosen as sync
    /// sources.
    pub hidden: bool,

    /// How far behind the primary this member intentionally stays.
    pub slave_delay: Duration,

    pub build_indexes: bool,

    pub tags: BTreeMap<String, String>,
}

impl MemberConfig {
    /// A data-bearing, voting member with default priority.
    pub fn new(id: MemberId, host: HostAndPort) -> Self {
        MemberConfig {
            id,
            host,
            priority: 1.0,
            votes: 1,
            arbiter_only: false,
            hidden: false,
            slave_delay: Duration::ZERO,
            build_indexes: true,
            tags: BTreeMap::new(),
        }
    }

    pub fn is_voter(&self) -> bool {
        self.votes > 0
    }

    /// Whether this member may ever stand for election, per configuration
    /// alone. Runtime conditions (liveness, reported state, freshness) are
    /// the coordinator's concern.
    pub fn is_electable(&self) -> bool {
        !self.arbiter_only && self.priority > 0.0
    }
}

impl Display for MemberConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{id:{} host:{} votes:{} priority:{}}}", self.id, self.host, self.votes, self.priority)
    }
}
