use crate::coordinator::LeaderMode;
use crate::coordinator::Role;
use crate::coordinator::TopologyCoordinator;
use crate::optime::OpTime;

impl TopologyCoordinator {
    /// Recompute the majority-committed opTime from the registry.
    ///
    /// Collects the applied (or durable, when the configuration says majority
    /// writes must journal) opTime of every voting member, sorts descending,
    /// and takes the entry at index `⌊N/2⌋`: the freshest opTime a strict
    /// majority of voters has reached. Returns whether the commit point
    /// moved.
    pub fn update_last_committed_op_time(&mut self) -> bool {
        if !self.config.is_initialized() || !self.is_member() {
            return false;
        }

        let use_durable = self.config.write_concern_majority_journal_default;

        let mut voter_op_times: Vec<OpTime> = self
            .config
            .members
            .iter()
            .zip(self.members.iter())
            .filter(|(mc, _)| mc.is_voter())
            .map(|(_, m)| {
                if use_durable {
                    m.last_durable_op_time()
                } else {
                    m.last_applied_op_time()
                }
            })
            .collect();

        if voter_op_times.is_empty() || (voter_op_times.len() as u32) < self.config.majority_vote_count() {
            return false;
        }

        voter_op_times.sort_unstable_by(|a, b| b.cmp(a));
        let committed = voter_op_times[voter_op_times.len() / 2];

        // Only operations of the current term count as majority-committed;
        // an older term's entry may still be rolled back.
        if committed.term != self.state.term {
            return false;
        }

        self.advance_last_committed_op_time(committed)
    }

    /// Advance the commit point to `op` if it is ahead of the current one.
    /// Backward moves are silently ignored.
    pub fn advance_last_committed_op_time(&mut self, op: OpTime) -> bool {
        if op == self.state.last_committed_op_time {
            return false;
        }

        // While establishing a tenure, nothing before our first op of the
        // term may count as committed in our view.
        if op < self.state.first_op_time_of_term
            && self.state.role == Role::Leader
            && self.state.leader_mode != LeaderMode::SteppingDown
        {
            tracing::debug!(
                op = display(op),
                floor = display(self.state.first_op_time_of_term),
                "ignoring commit point older than the first op of our term"
            );
            return false;
        }

        if op < self.state.last_committed_op_time {
            return false;
        }

        // The commit point never runs ahead of what we have locally applied.
        let capped = op.min(self.my_last_applied_op_time());
        if capped <= self.state.last_committed_op_time {
            return false;
        }

        tracing::debug!(op = display(capped), "advancing commit point");
        self.state.last_committed_op_time = capped;
        true
    }
}
