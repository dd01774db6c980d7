use serde::Deserialize;
use serde::Serialize;

use crate::config::MemberConfig;

/// One constraint of a custom write concern: at least `min_distinct_values`
/// distinct values of `tag_key` must be covered.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct TagConstraint {
    pub tag_key: String,
    pub min_distinct_values: usize,
}

/// A named write-concern tag pattern from the replica set configuration.
///
/// A pattern is satisfied by a set of members when every constraint's tag key
/// is covered by at least the required number of distinct tag values among
/// those members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct ReplSetTagPattern {
    pub constraints: Vec<TagConstraint>,
}

impl ReplSetTagPattern {
    pub fn new(constraints: Vec<TagConstraint>) -> Self {
        ReplSetTagPattern { constraints }
    }

    pub fn satisfied_by<'a>(&self, members: impl Iterator<Item = &'a MemberConfig> + Clone) -> bool {
        self.constraints.iter().all(|c| {
            let mut values: Vec<&str> = members
                .clone()
                .filter_map(|m| m.tags.get(&c.tag_key))
                .map(|v| v.as_str())
                .collect();
            values.sort_unstable();
            values.dedup();
            values.len() >= c.min_distinct_values
        })
    }
}
