//! Shared fixtures for coordinator tests.

use std::time::Duration;
use std::time::Instant;

use crate::config::MemberConfig;
use crate::config::MemberId;
use crate::config::ReplSetConfig;
use crate::coordinator::Options;
use crate::coordinator::StartElectionReason;
use crate::coordinator::TopologyCoordinator;
use crate::host_port::HostAndPort;
use crate::member_state::MemberState;
use crate::optime::ElectionId;
use crate::optime::OpTime;
use crate::optime::Term;
use crate::optime::Timestamp;
use crate::rpc::HeartbeatResponse;

pub(crate) fn host(id: i64) -> HostAndPort {
    HostAndPort::new(format!("node-{}", id), 27017)
}

pub(crate) fn member(id: i64) -> MemberConfig {
    MemberConfig::new(MemberId(id), host(id))
}

pub(crate) fn config(n: i64, version: i64) -> ReplSetConfig {
    ReplSetConfig::new("rs0", version, (0..n).map(member).collect())
}

pub(crate) fn op(ts: u64, term: Term) -> OpTime {
    OpTime::new(Timestamp(ts), term)
}

/// A follower coordinator in an `n`-member set, reporting SECONDARY, with a
/// pinned jitter seed.
pub(crate) fn coordinator(n: i64, self_index: usize, now: Instant) -> TopologyCoordinator {
    let options = Options {
        election_jitter_seed: Some(7),
        ..Options::default()
    };
    let mut topo = TopologyCoordinator::new(options, now);
    topo.update_config(config(n, 1), Some(self_index), now);
    if n > 1 {
        topo.set_follower_mode(MemberState::Secondary);
    }
    topo
}

/// A coordinator already established as master in `term`.
pub(crate) fn leader(n: i64, self_index: usize, term: Term, now: Instant) -> TopologyCoordinator {
    let mut topo = coordinator(n, self_index, now);
    for _ in 0..term {
        let next = topo.term() + 1;
        topo.update_term(next, now);
    }
    topo.become_candidate_if_electable(now, StartElectionReason::ElectionTimeout)
        .expect("fixture node must be electable");
    topo.vote_for_myself_v1();
    topo.process_win_election(ElectionId::from_term(term), Timestamp(1));
    topo.complete_transition_to_primary(op(1, term));
    topo
}

/// A heartbeat reply from a healthy secondary.
pub(crate) fn secondary_response(term: Term, applied: OpTime) -> HeartbeatResponse {
    HeartbeatResponse {
        set_name: "rs0".to_string(),
        state: MemberState::Secondary,
        election_time: None,
        applied_op_time: applied,
        durable_op_time: applied,
        sync_source: None,
        config_version: 1,
        config: None,
        primary_id: None,
        term,
        rbid: None,
    }
}

/// A heartbeat reply from a member claiming primaryship.
pub(crate) fn primary_response(term: Term, applied: OpTime, election_time: Timestamp) -> HeartbeatResponse {
    HeartbeatResponse {
        state: MemberState::Primary,
        election_time: Some(election_time),
        ..secondary_response(term, applied)
    }
}

/// Ingest a successful heartbeat reply from the member at `idx`.
pub(crate) fn ack_heartbeat(
    topo: &mut TopologyCoordinator,
    now: Instant,
    idx: i64,
    response: HeartbeatResponse,
) -> crate::coordinator::HeartbeatResponseAction {
    topo.process_heartbeat_response(now, Duration::from_millis(5), &host(idx), Ok(response))
}
