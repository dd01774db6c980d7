use std::time::Instant;

use crate::coordinator::LeaderMode;
use crate::coordinator::Role;
use crate::coordinator::TopologyCoordinator;
use crate::error::CommandError;
use crate::optime::Term;

impl TopologyCoordinator {
    /// Ready this node for a stepdown command, which can fail if no
    /// caught-up electable secondary exists. At most one stepdown request is
    /// processed at a time.
    pub fn prepare_for_step_down_attempt(&mut self) -> Result<(), CommandError> {
        assert_eq!(Role::Leader, self.state.role, "stepdown attempts require the leader role");

        match self.state.leader_mode {
            LeaderMode::Master => {
                self.state.set_leader_mode(LeaderMode::AttemptingStepDown);
                Ok(())
            }
            LeaderMode::AttemptingStepDown | LeaderMode::SteppingDown => Err(
                CommandError::ConflictingOperationInProgress("a stepdown is already in progress".to_string()),
            ),
            LeaderMode::LeaderElect => Err(CommandError::ConflictingOperationInProgress(
                "cannot step down while establishing primaryship".to_string(),
            )),
            LeaderMode::NotLeader => unreachable!("leader role with not-leader mode"),
        }
    }

    /// Abort an in-flight stepdown attempt and return to full primaryship.
    /// A concurrent unconditional stepdown is left in place.
    pub fn abort_attempted_step_down_if_needed(&mut self) {
        if self.state.leader_mode == LeaderMode::AttemptingStepDown {
            self.state.set_leader_mode(LeaderMode::Master);
        }
    }

    /// Try to complete a stepdown attempt. Succeeds when either
    ///
    ///   C1. `force` and `now > wait_until`, or
    ///   C2. a majority of voting members have caught up to our last applied
    ///       opTime, and
    ///   C3. at least one caught-up member is electable.
    ///
    /// Returns `Ok(false)` while waiting longer could still succeed. The
    /// attempt is abandoned with an error once `step_down_until` passes, the
    /// wait deadline expires without the conditions holding, the term moves
    /// under us, or an unconditional stepdown supersedes the attempt.
    ///
    /// On success this node is a follower and declines elections until
    /// `step_down_until`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn attempt_step_down(
        &mut self,
        term_at_start: Term,
        now: Instant,
        wait_until: Instant,
        step_down_until: Instant,
        force: bool,
    ) -> Result<bool, CommandError> {
        if term_at_start != self.state.term {
            return Err(CommandError::StaleTerm {
                expected: term_at_start,
                actual: self.state.term,
            });
        }

        if self.state.leader_mode == LeaderMode::SteppingDown {
            return Err(CommandError::ConflictingOperationInProgress(
                "this node began stepping down unconditionally while the stepdown command waited".to_string(),
            ));
        }
        assert_eq!(
            LeaderMode::AttemptingStepDown,
            self.state.leader_mode,
            "attempt_step_down requires a prepared stepdown attempt"
        );

        if now >= step_down_until {
            return Err(CommandError::ExceededTimeLimit(
                "by the time we were ready to step down, the stepdown period had already expired".to_string(),
            ));
        }

        let can_complete = (force && now > wait_until) || self.is_safe_to_step_down();
        if !can_complete {
            if now >= wait_until {
                return Err(CommandError::ExceededTimeLimit(format!(
                    "no electable secondaries caught up as of {:?}; use force:true to step down regardless",
                    now
                )));
            }
            return Ok(false);
        }

        tracing::info!(term = self.state.term, "stepping down from primary by request");
        self.state.step_down_to_follower();

        let until = match self.state.election_sleep_until {
            Some(existing) => existing.max(step_down_until),
            None => step_down_until,
        };
        self.state.election_sleep_until = Some(until);

        Ok(true)
    }

    /// Conditions C2 and C3 of `attempt_step_down`, evaluated in isolation.
    pub fn is_safe_to_step_down(&self) -> bool {
        if !self.config.is_initialized() || !self.is_member() {
            return false;
        }

        let my_applied = self.my_last_applied_op_time();

        let caught_up_votes: u32 = self
            .config
            .members
            .iter()
            .zip(self.members.iter())
            .filter(|(_, m)| m.last_applied_op_time() >= my_applied)
            .map(|(mc, _)| mc.votes as u32)
            .sum();
        if caught_up_votes < self.config.majority_vote_count() {
            return false;
        }

        (0..self.config.num_members()).any(|idx| {
            Some(idx) != self.state.self_index
                && self.member_looks_electable(idx)
                && self.members[idx].last_applied_op_time() >= my_applied
        })
    }

    /// Ready this node for a stepdown that must complete (a newer term, a
    /// lost majority). Returns false if one is already underway. Supersedes
    /// any stepdown command attempt in flight, causing it to fail.
    ///
    /// A true return must be followed by `finish_unconditional_step_down`
    /// once the runtime holds its exclusive lock.
    pub fn prepare_for_unconditional_step_down(&mut self) -> bool {
        assert_eq!(Role::Leader, self.state.role, "unconditional stepdown requires the leader role");

        if self.state.leader_mode == LeaderMode::SteppingDown {
            return false;
        }
        self.state.set_leader_mode(LeaderMode::SteppingDown);
        true
    }

    /// Complete an unconditional stepdown: follower role, no primary.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn finish_unconditional_step_down(&mut self) {
        assert_eq!(
            LeaderMode::SteppingDown,
            self.state.leader_mode,
            "finishing a stepdown requires one to be prepared"
        );

        tracing::info!(term = self.state.term, "stepping down from primary unconditionally");
        self.state.step_down_to_follower();
    }
}
