use serde::Deserialize;
use serde::Serialize;

use crate::config::MemberId;
use crate::host_port::HostAndPort;
use crate::optime::OpTime;
use crate::optime::Term;
use crate::optime::Timestamp;

/// A protocol v1 vote request.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct RequestVotesArgs {
    pub set_name: String,
    pub term: Term,
    pub candidate_id: MemberId,
    pub config_version: i64,
    /// Dry-run requests probe electability without consuming the voter's
    /// vote for the term.
    pub dry_run: bool,
    /// The candidate's latest oplog position.
    pub last_op: OpTime,
}

/// Reply to a protocol v1 vote request.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct RequestVotesResponse {
    pub term: Term,
    pub vote_granted: bool,
    pub reason: String,
}

/// A legacy (protocol v0) freshness probe sent before an election.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct FreshArgs {
    pub set_name: String,
    pub who: HostAndPort,
    pub id: MemberId,
    pub config_version: i64,
    pub op_time: Timestamp,
}

/// Reply to a legacy freshness probe.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct FreshResponse {
    /// True when this node or any member it knows of has a fresher opTime
    /// than the candidate.
    pub fresher: bool,
    pub op_time: Timestamp,
    pub veto: bool,
    pub errmsg: Option<String>,
}

/// A legacy (protocol v0) election request.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct ElectArgs {
    pub set_name: String,
    pub who_id: MemberId,
    pub config_version: i64,
    /// Identifies the election round; echoed in the reply.
    pub round: u64,
}

/// Reply to a legacy election request: our vote weight, or a negative veto.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct ElectResponse {
    pub vote: i64,
    pub round: u64,
}
