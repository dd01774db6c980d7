use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

use crate::config::MemberId;
use crate::optime::Term;

/// The persisted record of the most recent vote this node cast.
///
/// The record is monotonic in term: a vote in term `t` can never be followed
/// by a vote in a smaller term. The caller persists it before any vote reply
/// leaves the node, and loads it exactly once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct LastVote {
    pub term: Term,
    pub voted_for: Option<MemberId>,
}

impl LastVote {
    pub fn new(term: Term, voted_for: MemberId) -> Self {
        LastVote {
            term,
            voted_for: Some(voted_for),
        }
    }

    /// Record a vote for `candidate` in `term`.
    ///
    /// Term monotonicity is the caller's precondition; granting backwards is a
    /// programmer error.
    pub fn grant(&mut self, term: Term, candidate: MemberId) {
        assert!(term >= self.term, "vote term may not decrease: {} < {}", term, self.term);
        self.term = term;
        self.voted_for = Some(candidate);
    }
}

impl Display for LastVote {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.voted_for {
            Some(id) => write!(f, "term:{} votedFor:{}", self.term, id),
            None => write!(f, "term:{} votedFor:none", self.term),
        }
    }
}
