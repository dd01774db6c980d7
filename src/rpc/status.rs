use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::config::MemberId;
use crate::host_port::HostAndPort;
use crate::member_state::HealthStatus;
use crate::member_state::MemberState;
use crate::optime::ElectionId;
use crate::optime::OpTime;
use crate::optime::Term;
use crate::optime::Timestamp;

/// Caller-supplied inputs to a status report.
///
/// Timestamps the coordinator does not own (process uptime, the majority read
/// point, initial-sync progress) travel in from the runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplSetStatusArgs {
    pub self_uptime: Duration,
    pub read_concern_majority_op_time: OpTime,
    /// Opaque initial-sync progress report, echoed through verbatim.
    pub initial_sync_status: Option<String>,
}

/// One member's row in a status report. Instants are reported as ages
/// relative to the `now` of the request; the caller renders wall-clock dates.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct MemberStatus {
    pub id: MemberId,
    pub name: HostAndPort,
    pub is_self: bool,
    pub health: HealthStatus,
    pub state: MemberState,
    pub uptime: Duration,
    pub applied_op_time: OpTime,
    pub durable_op_time: OpTime,
    pub sync_source: Option<HostAndPort>,
    pub config_version: i64,
    /// Set on the row of a member reporting itself primary.
    pub election_time: Option<Timestamp>,
    pub ping: Option<Duration>,
    pub last_heartbeat_ago: Option<Duration>,
    pub last_heartbeat_recv_ago: Option<Duration>,
    pub last_heartbeat_message: String,
    pub maintenance_mode: Option<u32>,
}

/// Reply to a status request.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct ReplSetStatusResponse {
    pub set_name: String,
    pub my_state: MemberState,
    pub term: Term,
    pub heartbeat_interval: Duration,
    pub self_uptime: Duration,
    pub last_committed_op_time: OpTime,
    pub read_concern_majority_op_time: OpTime,
    pub applied_op_time: OpTime,
    pub durable_op_time: OpTime,
    pub initial_sync_status: Option<String>,
    pub sync_source: Option<HostAndPort>,
    pub members: Vec<MemberStatus>,
}

/// Reply to an isMaster request from a replica set client.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct IsMasterResponse {
    pub is_master: bool,
    pub secondary: bool,
    pub set_name: String,
    pub set_version: i64,
    /// Visible, electable members.
    pub hosts: Vec<HostAndPort>,
    /// Visible, priority-zero members.
    pub passives: Vec<HostAndPort>,
    pub arbiters: Vec<HostAndPort>,
    pub primary: Option<HostAndPort>,
    pub me: Option<HostAndPort>,
    pub arbiter_only: bool,
    pub passive: bool,
    pub hidden: bool,
    pub build_indexes: bool,
    pub slave_delay: Duration,
    pub tags: BTreeMap<String, String>,
    pub election_id: Option<ElectionId>,
    /// True when the storage engine cannot serve majority reads.
    pub read_only: bool,
}

/// One member's row for the serverStatus repl section.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct MemberHealthReport {
    pub id: MemberId,
    pub host: HostAndPort,
    pub health: HealthStatus,
    pub state: MemberState,
    pub applied_op_time: OpTime,
    pub last_heartbeat_ago: Option<Duration>,
    pub last_heartbeat_message: String,
}

/// The replication section of the diagnostic web page.
///
/// The coordinator fills the fields; `render` produces the HTML fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplSetHtmlSummary {
    pub set_name: String,
    pub config_version: i64,
    pub self_index: Option<usize>,
    pub primary_index: Option<usize>,
    pub self_state: MemberState,
    pub self_heartbeat_message: String,
    pub members: Vec<MemberStatus>,
}

impl ReplSetHtmlSummary {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<h2>Replica set {} (config version {})</h2>", self.set_name, self.config_version);
        let _ = writeln!(out, "<p>State: {}</p>", self.self_state);
        if !self.self_heartbeat_message.is_empty() {
            let _ = writeln!(out, "<p>Message: {}</p>", self.self_heartbeat_message);
        }
        let _ = writeln!(out, "<table><tr><th>member</th><th>state</th><th>health</th><th>opTime</th><th>note</th></tr>");
        for (i, m) in self.members.iter().enumerate() {
            let mut note = String::new();
            if m.is_self {
                note.push_str("(me)");
            }
            if Some(i) == self.primary_index {
                note.push_str(" (primary)");
            }
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                m.name, m.state, m.health, m.applied_op_time, note
            );
        }
        let _ = writeln!(out, "</table>");
        out
    }
}
