//! Replica set configuration snapshots.
//!
//! Configurations arrive at the coordinator already parsed and validated by
//! the caller; the types here are immutable value objects. A snapshot is
//! replaced atomically at the `update_config` call boundary and never mutated
//! in place.

mod member_config;
mod replset_config;
mod tag_pattern;

pub use member_config::MemberConfig;
pub use member_config::MemberId;
pub use replset_config::ReplSetConfig;
pub use tag_pattern::ReplSetTagPattern;
pub use tag_pattern::TagConstraint;
