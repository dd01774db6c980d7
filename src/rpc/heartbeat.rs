use serde::Deserialize;
use serde::Serialize;

use crate::config::MemberId;
use crate::config::ReplSetConfig;
use crate::host_port::HostAndPort;
use crate::member_state::MemberState;
use crate::optime::OpTime;
use crate::optime::Term;
use crate::optime::Timestamp;

/// A legacy (protocol v0) heartbeat request.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct HeartbeatArgs {
    pub set_name: String,
    pub protocol_version: i64,
    pub config_version: i64,
    pub sender_id: Option<MemberId>,
    pub sender_host: HostAndPort,
    /// Set when the sender has no config and is probing whether the target
    /// does.
    pub check_empty: bool,
}

/// A protocol v1 heartbeat request.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct HeartbeatArgsV1 {
    pub set_name: String,
    pub config_version: i64,
    pub sender_id: Option<MemberId>,
    pub sender_host: HostAndPort,
    /// The sender's current term.
    pub term: Term,
}

/// A heartbeat reply, shared between both protocol versions.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub set_name: String,
    pub state: MemberState,
    /// Authoritative election time, set while the responder believes itself
    /// primary.
    pub election_time: Option<Timestamp>,
    pub applied_op_time: OpTime,
    pub durable_op_time: OpTime,
    pub sync_source: Option<HostAndPort>,
    pub config_version: i64,
    /// The responder's full configuration, attached when its version is newer
    /// than the requester's.
    pub config: Option<ReplSetConfig>,
    /// Config index of the member the responder believes is primary.
    pub primary_id: Option<MemberId>,
    /// The responder's current term (protocol v1).
    pub term: Term,
    /// The responder's rollback id.
    pub rbid: Option<i32>,
}

impl HeartbeatResponse {
    /// Whether the responder claims to be primary.
    pub fn claims_primary(&self) -> bool {
        self.state.is_primary()
    }
}

/// A heartbeat exchange that failed before producing a response.
///
/// Failures carry no protocol content; the coordinator folds them into member
/// liveness and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeartbeatFailure {
    #[error("heartbeat target unreachable: {0}")]
    Unreachable(String),

    #[error("heartbeat rejected: {0}")]
    Unauthorized(String),
}
