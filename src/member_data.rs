use std::fmt::Display;
use std::fmt::Formatter;
use std::time::Duration;
use std::time::Instant;

use crate::config::MemberId;
use crate::host_port::HostAndPort;
use crate::member_state::HealthStatus;
use crate::member_state::MemberState;
use crate::optime::OpTime;
use crate::optime::Term;
use crate::optime::Timestamp;

/// Identifier of a legacy master/slave replication peer.
#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Rid(pub u64);

impl Display for Rid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything this node knows about one member of the set, gathered from
/// heartbeat exchanges and progress notifications.
///
/// One entry exists per configured member, created by `update_config` and
/// destroyed by the next `update_config` that drops the member. A
/// distinguished self entry tracks our own applied/durable opTimes.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberData {
    pub(crate) config_index: usize,
    pub(crate) member_id: MemberId,
    pub(crate) host: HostAndPort,
    pub(crate) is_self: bool,

    pub(crate) health: HealthStatus,
    pub(crate) up_since: Option<Instant>,

    /// When our most recent heartbeat attempt to this member completed.
    pub(crate) last_heartbeat: Option<Instant>,
    /// When we last received a heartbeat request *from* this member.
    pub(crate) last_heartbeat_recv: Option<Instant>,
    pub(crate) last_heartbeat_message: String,
    pub(crate) last_rtt: Option<Duration>,

    /// Consecutive failed heartbeat attempts since the last success.
    pub(crate) consecutive_failures: u32,
    pub(crate) last_heartbeat_ok: Option<Instant>,

    /// Advances on any progress notification or successful heartbeat; member
    /// timeout checks compare it against the election timeout.
    pub(crate) last_update: Instant,
    pub(crate) last_response: Option<Instant>,
    pub(crate) updated_since_restart: bool,

    pub(crate) last_applied: OpTime,
    pub(crate) last_durable: OpTime,

    pub(crate) state: MemberState,
    pub(crate) election_time: Option<Timestamp>,
    /// The authoritative term the member reported (protocol v1).
    pub(crate) term: Term,
    pub(crate) sync_source: Option<HostAndPort>,
    pub(crate) config_version_seen: i64,
    pub(crate) rbid: Option<i32>,
    pub(crate) rid: Option<Rid>,
}

impl MemberData {
    pub(crate) fn new(config_index: usize, member_id: MemberId, host: HostAndPort, is_self: bool, now: Instant) -> Self {
        MemberData {
            config_index,
            member_id,
            host,
            is_self,
            health: HealthStatus::Unknown,
            up_since: None,
            last_heartbeat: None,
            last_heartbeat_recv: None,
            last_heartbeat_message: String::new(),
            last_rtt: None,
            consecutive_failures: 0,
            last_heartbeat_ok: None,
            last_update: now,
            last_response: None,
            updated_since_restart: false,
            last_applied: OpTime::default(),
            last_durable: OpTime::default(),
            state: if is_self { MemberState::Startup } else { MemberState::Unknown },
            election_time: None,
            term: 0,
            sync_source: None,
            config_version_seen: -1,
            rbid: None,
            rid: None,
        }
    }

    pub fn config_index(&self) -> usize {
        self.config_index
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn host(&self) -> &HostAndPort {
        &self.host
    }

    pub fn is_self(&self) -> bool {
        self.is_self
    }

    pub fn health(&self) -> HealthStatus {
        self.health
    }

    /// Confirmed alive by a successful heartbeat.
    pub fn is_up(&self) -> bool {
        self.is_self || self.health.is_up()
    }

    /// Not confirmed dead: up, or not yet heard from.
    pub fn is_maybe_up(&self) -> bool {
        self.is_self || matches!(self.health, HealthStatus::Up | HealthStatus::Unknown)
    }

    pub fn state(&self) -> MemberState {
        self.state
    }

    pub fn last_applied_op_time(&self) -> OpTime {
        self.last_applied
    }

    pub fn last_durable_op_time(&self) -> OpTime {
        self.last_durable
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }

    pub fn sync_source(&self) -> Option<&HostAndPort> {
        self.sync_source.as_ref()
    }

    pub fn election_time(&self) -> Option<Timestamp> {
        self.election_time
    }

    pub fn rbid(&self) -> Option<i32> {
        self.rbid
    }

    pub fn rid(&self) -> Option<Rid> {
        self.rid
    }

    pub fn last_heartbeat_message(&self) -> &str {
        &self.last_heartbeat_message
    }

    /// Fold a successful heartbeat response into this entry.
    pub(crate) fn set_up_values(&mut self, now: Instant, rtt: Duration, state: MemberState) {
        if !self.health.is_up() {
            self.up_since = Some(now);
        }
        self.health = HealthStatus::Up;
        self.state = state;
        self.last_rtt = Some(rtt);
        self.consecutive_failures = 0;
        self.last_heartbeat_ok = Some(now);
        self.last_heartbeat = Some(now);
        self.last_response = Some(now);
        self.last_update = now;
        self.updated_since_restart = true;
        self.last_heartbeat_message.clear();
    }

    /// Fold a failed heartbeat attempt into this entry without (yet) marking
    /// the member down.
    pub(crate) fn note_heartbeat_failure(&mut self, now: Instant, message: &str) {
        self.consecutive_failures += 1;
        self.last_heartbeat = Some(now);
        self.updated_since_restart = true;
        self.last_heartbeat_message = message.to_string();
    }

    pub(crate) fn set_down_values(&mut self, now: Instant, message: &str) {
        self.health = HealthStatus::Down;
        self.state = MemberState::Down;
        self.up_since = None;
        self.election_time = None;
        self.sync_source = None;
        self.last_heartbeat = Some(now);
        if !message.is_empty() {
            self.last_heartbeat_message = message.to_string();
        }
    }

    pub(crate) fn set_auth_issue(&mut self, now: Instant) {
        self.health = HealthStatus::AuthFailed;
        self.state = MemberState::Unknown;
        self.up_since = None;
        self.election_time = None;
        self.sync_source = None;
        self.last_heartbeat = Some(now);
        self.last_heartbeat_message = "unauthorized".to_string();
    }

    /// Record an applied-opTime progress notification. Returns whether the
    /// opTime moved forward.
    pub(crate) fn advance_last_applied(&mut self, op: OpTime, now: Instant) -> bool {
        self.last_update = now;
        if op > self.last_applied {
            self.last_applied = op;
            true
        } else {
            false
        }
    }

    /// Record a durable-opTime progress notification. Returns whether the
    /// opTime moved forward.
    pub(crate) fn advance_last_durable(&mut self, op: OpTime, now: Instant) -> bool {
        self.last_update = now;
        if op > self.last_durable {
            self.last_durable = op;
            true
        } else {
            false
        }
    }
}
