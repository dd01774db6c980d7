use std::time::Instant;

use crate::config::ReplSetConfig;
use crate::coordinator::Role;
use crate::coordinator::TopologyCoordinator;
use crate::coordinator::UpdateTermResult;
use crate::last_vote::LastVote;
use crate::member_data::MemberData;
use crate::optime::Term;

impl TopologyCoordinator {
    /// Install a new configuration snapshot, completely replacing state
    /// derived from the previous one.
    ///
    /// Member entries are rebuilt; entries for members present in both
    /// configurations (same id and host) keep their heartbeat-derived state.
    /// The sync-source blacklist, term, and last vote survive. `self_index`
    /// is `None` when this node is not a member of `new_config`.
    ///
    /// Outstanding elections must be wrapped up (`process_win_election` /
    /// `process_lose_election`) before installing a configuration.
    #[tracing::instrument(level = "debug", skip(self, new_config))]
    pub fn update_config(&mut self, new_config: ReplSetConfig, self_index: Option<usize>, now: Instant) {
        if let Some(idx) = self_index {
            assert!(idx < new_config.num_members(), "self index out of range");
        }

        tracing::info!(
            set = display(&new_config.set_name),
            version = new_config.version,
            members = new_config.num_members(),
            self_index = debug(self_index),
            "installing replica set configuration"
        );

        let old_members = std::mem::take(&mut self.members);
        let old_self = old_members.iter().find(|m| m.is_self);

        self.members = new_config
            .members
            .iter()
            .enumerate()
            .map(|(i, mc)| {
                let is_self = self_index == Some(i);
                let old = old_members.iter().find(|m| m.member_id == mc.id && m.host == mc.host);
                match old {
                    Some(old) => {
                        let mut m = old.clone();
                        m.config_index = i;
                        m.is_self = is_self;
                        m
                    }
                    None => {
                        let mut m = MemberData::new(i, mc.id, mc.host.clone(), is_self, now);
                        if is_self {
                            // Never lose track of our own progress, even when
                            // our id or address changed across configs.
                            if let Some(old_self) = old_self {
                                m.last_applied = old_self.last_applied;
                                m.last_durable = old_self.last_durable;
                                m.state = old_self.state;
                            }
                        }
                        m
                    }
                }
            })
            .collect();

        // A node dropped from the configuration still tracks its own opTimes.
        if self_index.is_none() {
            let idx = self.members.len();
            let mut detached = match old_self {
                Some(old_self) => old_self.clone(),
                None => MemberData::new(idx, crate::config::MemberId(-1), Default::default(), true, now),
            };
            detached.config_index = idx;
            detached.is_self = true;
            self.members.push(detached);
        }

        self.config = new_config;

        // Abandon any candidacy the caller failed to wrap up and settle the
        // role against the new membership, in one step.
        let demoted = self.state.apply_membership(self_index);
        if demoted {
            tracing::info!("this node was dropped from the configuration while primary; stepping down");
        }

        // Sync-source forcing is expressed in config indexes, which have just
        // been reassigned.
        self.force_sync_source_index = None;

        self.lower_priority_primary_since = None;
        self.primary_stale_since = None;
        self.last_primary_contact = Some(now);
        self.reroll_election_offset();

        // A set with a single electable node goes straight to candidate; no
        // peer will ever time out to elect it.
        if self.state.role == Role::Follower {
            if let Some(idx) = self_index {
                if self.config.num_members() == 1 && self.config.member_at(idx).is_electable() {
                    self.state.become_candidate();
                }
            }
        }
    }

    /// Adopt `term` if it is newer than ours.
    ///
    /// A primary is not allowed to silently adopt a newer term: the caller
    /// must first step it down (`TriggerStepDown`) and call again.
    pub fn update_term(&mut self, term: Term, _now: Instant) -> UpdateTermResult {
        if term <= self.state.term {
            return UpdateTermResult::AlreadyUpToDate;
        }

        if self.state.role == Role::Leader {
            tracing::info!(current = self.state.term, seen = term, "stepping down from primary; newer term seen");
            return UpdateTermResult::TriggerStepDown;
        }

        // The role is untouched: a candidate bumps its own term through this
        // path while electing itself.
        tracing::debug!(from = self.state.term, to = term, "updating term");
        self.state.term = term;
        UpdateTermResult::UpdatedTerm
    }

    /// Install the last-vote record read from local storage.
    ///
    /// Called exactly once, during replication startup; all later updates are
    /// internal.
    pub fn load_last_vote(&mut self, last_vote: LastVote) {
        // The vote record may carry a term from before the restart.
        if last_vote.term > self.state.term {
            self.state.term = last_vote.term;
        }
        self.state.last_vote = last_vote;
    }

    /// Point this node at the member it should consider primary.
    pub fn set_primary_index(&mut self, primary_index: Option<usize>) {
        if self.state.role == Role::Leader {
            assert_eq!(
                self.state.self_index, primary_index,
                "a leader's primary index must name itself"
            );
        }
        self.state.current_primary_index = primary_index;
    }
}
