//! A replica-set topology coordination engine.
//!
//! This crate implements the decision core of a replica-set replication
//! protocol: leader election, heartbeat-driven liveness, majority commit
//! calculation, sync-source selection, and the replies a member owes its
//! peers and clients.
//!
//! The engine is deliberately pure. [`TopologyCoordinator`] performs no I/O,
//! spawns nothing, and never reads the clock; every entry point takes an
//! absolute `Instant` supplied by the surrounding replication runtime and is
//! executed under a single lock the runtime holds. Decisions come back as
//! values: typed actions (start an election, step down, reconfigure,
//! schedule the next heartbeat) and fully formed logical replies that the
//! caller serialises onto the wire.
//!
//! The runtime drives the coordinator through five kinds of input: clock
//! ticks, heartbeat responses, peer command requests, configuration updates,
//! and local progress notifications. It must act on the returned
//! [`HeartbeatResponseAction`]s and honor the persistence contract: after
//! any granted vote or self-vote, the [`LastVote`] record must reach disk
//! before the reply leaves the node.

#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::uninlined_format_args)]
#![deny(unused_qualifications)]

mod config;
mod coordinator;
mod host_port;
mod last_vote;
mod member_data;
mod member_state;
mod optime;

pub mod error;
pub mod rpc;

pub use crate::config::MemberConfig;
pub use crate::config::MemberId;
pub use crate::config::ReplSetConfig;
pub use crate::config::ReplSetTagPattern;
pub use crate::config::TagConstraint;
pub use crate::coordinator::ChainingPreference;
pub use crate::coordinator::HeartbeatAction;
pub use crate::coordinator::HeartbeatResponseAction;
pub use crate::coordinator::LeaderMode;
pub use crate::coordinator::Options;
pub use crate::coordinator::PrepareFreezeResponseResult;
pub use crate::coordinator::Role;
pub use crate::coordinator::StartElectionReason;
pub use crate::coordinator::TopologyCoordinator;
pub use crate::coordinator::UpdateTermResult;
pub use crate::host_port::HostAndPort;
pub use crate::last_vote::LastVote;
pub use crate::member_data::MemberData;
pub use crate::member_data::Rid;
pub use crate::member_state::HealthStatus;
pub use crate::member_state::MemberState;
pub use crate::optime::ElectionId;
pub use crate::optime::OpTime;
pub use crate::optime::Term;
pub use crate::optime::Timestamp;
