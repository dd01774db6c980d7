use serde::Deserialize;
use serde::Serialize;

use crate::optime::OpTime;
use crate::optime::Term;

/// Replication metadata a node attaches to its command replies, letting peers
/// learn the commit point, term, and topology without extra round trips.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct ReplSetMetadata {
    pub term: Term,
    pub last_op_committed: OpTime,
    /// The latest opTime the sender allows readers to observe.
    pub last_op_visible: OpTime,
    pub config_version: i64,
    pub replica_set_id: u64,
    /// Config index of the primary as the sender sees it.
    pub primary_index: Option<usize>,
    /// Config index of the sender's sync source.
    pub sync_source_index: Option<usize>,
}

/// Metadata attached to oplog query replies, consumed by the sync-source
/// selector of the pulling node.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct OplogQueryMetadata {
    pub last_op_committed: OpTime,
    pub last_op_applied: OpTime,
    /// The sender's rollback id.
    pub rbid: i32,
    pub primary_index: Option<usize>,
    pub sync_source_index: Option<usize>,
}
