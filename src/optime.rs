use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

/// An election epoch.
///
/// Terms only ever grow. Protocol-v0 opTimes carry term `0`.
pub type Term = u64;

/// An opaque logical clock value assigned to an oplog entry.
#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const MIN: Timestamp = Timestamp(0);
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The position of an operation in the oplog.
///
/// OpTimes order lexicographically by `(term, timestamp)`: an entry written in
/// a later term sorts after every entry of an earlier term, regardless of
/// timestamp. `OpTime::default()` is the smallest opTime and stands for
/// "nothing applied yet".
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub struct OpTime {
    pub term: Term,
    pub timestamp: Timestamp,
}

impl OpTime {
    pub fn new(timestamp: Timestamp, term: Term) -> Self {
        OpTime { term, timestamp }
    }

    /// True if this opTime has ever been set to a real oplog position.
    pub fn is_set(&self) -> bool {
        *self != OpTime::default()
    }
}

impl PartialOrd for OpTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.term, self.timestamp).cmp(&(other.term, other.timestamp))
    }
}

impl Display for OpTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.timestamp, self.term)
    }
}

/// Identifier a primary stamps on its tenure when it wins an election.
#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub struct ElectionId(pub u64);

impl ElectionId {
    /// The election id a protocol-v1 primary derives from its term.
    pub fn from_term(term: Term) -> Self {
        ElectionId(term)
    }
}

impl Display for ElectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
