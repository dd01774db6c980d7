use serde::Deserialize;
use serde::Serialize;

use crate::config::MemberId;
use crate::optime::OpTime;

/// Which shape of position report the sync source expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub enum UpdatePositionCommandStyle {
    /// Reports both applied and durable opTimes per member.
    NewStyle,
    /// Pre-journaling shape: one opTime per member.
    OldStyle,
}

/// One member's replication progress, as reported upstream.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct MemberPosition {
    pub member_id: MemberId,
    pub applied_op_time: OpTime,
    /// Absent in the old command style.
    pub durable_op_time: Option<OpTime>,
    pub config_version: i64,
}

/// The position report a node sends to its sync source, covering every member
/// whose progress it knows.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct UpdatePositionCommand {
    pub positions: Vec<MemberPosition>,
}
