use std::time::Instant;

use crate::coordinator::Role;
use crate::coordinator::StartElectionReason;
use crate::coordinator::TopologyCoordinator;
use crate::coordinator::VOTE_LEASE;
use crate::error::CommandError;
use crate::error::ElectionIneligible;
use crate::member_state::MemberState;
use crate::optime::ElectionId;
use crate::optime::Timestamp;
use crate::rpc::ElectArgs;
use crate::rpc::ElectResponse;
use crate::rpc::FreshArgs;
use crate::rpc::FreshResponse;
use crate::rpc::RequestVotesArgs;
use crate::rpc::RequestVotesResponse;

/// Veto weight in a legacy elect reply.
const ELECT_VETO: i64 = -10000;

impl TopologyCoordinator {
    /// Whether this node may stand for election right now, and if not, why.
    pub fn check_should_stand_for_election(&self, now: Instant) -> Result<(), ElectionIneligible> {
        self.check_electable(now, StartElectionReason::ElectionTimeout)
    }

    /// Transition to candidate if electable. Takeover and step-up reasons
    /// relax the freshness requirement: the caller has independent evidence
    /// we are fresh enough.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn become_candidate_if_electable(
        &mut self,
        now: Instant,
        reason: StartElectionReason,
    ) -> Result<(), ElectionIneligible> {
        self.check_electable(now, reason)?;
        tracing::info!(reason = debug(reason), "transitioning to candidate");
        self.state.become_candidate();
        Ok(())
    }

    /// A single-node set comes straight back as candidate when its stepdown
    /// freeze lapses; no peer exists to time out and elect it.
    pub fn become_candidate_if_stepdown_period_over_and_single_node_set(&mut self, now: Instant) -> bool {
        if let Some(until) = self.state.election_sleep_until {
            if now < until {
                return false;
            }
        }

        let Some(self_index) = self.state.self_index else {
            return false;
        };

        if self.state.role == Role::Follower
            && self.config.num_members() == 1
            && self.config.member_at(self_index).is_electable()
        {
            self.state.election_sleep_until = None;
            self.state.become_candidate();
            return true;
        }
        false
    }

    /// Legacy (protocol v0) self-vote, gated by the vote lease.
    ///
    /// Returns false when this node is not a candidate or its vote is leased
    /// to another member.
    pub fn vote_for_myself(&mut self, now: Instant) -> bool {
        if self.state.role != Role::Candidate {
            return false;
        }
        let self_id = self.self_id();

        if let Some((when, who)) = self.vote_lease {
            if now.duration_since(when) < VOTE_LEASE && who != self_id {
                tracing::debug!(leased_to = display(who), "cannot vote for myself; vote is leased");
                return false;
            }
        }

        let term = self.state.term;
        if self.state.last_vote.term == term && self.state.last_vote.voted_for.is_some_and(|v| v != self_id) {
            return false;
        }

        self.state.last_vote.grant(term, self_id);
        self.vote_lease = Some((now, self_id));
        true
    }

    /// Record a vote for ourselves in the current term (protocol v1).
    pub fn vote_for_myself_v1(&mut self) {
        assert_eq!(Role::Candidate, self.state.role, "self-vote requires candidate role");
        let self_id = self.self_id();
        let term = self.state.term;
        self.state.last_vote.grant(term, self_id);
    }

    /// Record the id and opTime stamped on our election win.
    pub fn set_election_info(&mut self, election_id: ElectionId, election_op_time: Timestamp) {
        self.state.election_id = Some(election_id);
        self.state.election_time = Some(election_op_time);
    }

    /// Decide a protocol v1 vote request.
    ///
    /// When the reply grants and `dry_run` is false, the caller must persist
    /// `last_vote()` before sending the reply.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn process_replset_request_votes(&mut self, args: &RequestVotesArgs) -> RequestVotesResponse {
        // Adopting a newer term first keeps the vote record's term bounded by
        // ours. A leader does not adopt here; it must step down first.
        if args.term > self.state.term && self.state.role != Role::Leader {
            self.state.abandon_candidacy();
            self.state.term = args.term;
        }

        let mut response = RequestVotesResponse {
            term: self.state.term,
            vote_granted: false,
            reason: String::new(),
        };

        if args.set_name != self.config.set_name {
            response.reason = format!(
                "candidate's set name ({}) differs from mine ({})",
                args.set_name, self.config.set_name
            );
        } else if args.term < self.state.term {
            response.reason = format!(
                "candidate's term ({}) is lower than mine ({})",
                args.term, self.state.term
            );
        } else if args.term > self.state.term {
            // Only reachable while we are primary: we must step down and
            // adopt the term before our vote can mean anything.
            response.reason = format!(
                "candidate's term ({}) is ahead of mine ({}) and I am primary",
                args.term, self.state.term
            );
        } else if args.config_version != self.config.version {
            response.reason = format!(
                "candidate's config version ({}) differs from mine ({})",
                args.config_version, self.config.version
            );
        } else if args.last_op < self.my_last_applied_op_time() {
            response.reason = format!(
                "candidate's data is staler than mine; candidate's last op {} vs mine {}",
                args.last_op,
                self.my_last_applied_op_time()
            );
        } else if args.term == self.state.last_vote.term && self.state.last_vote.voted_for != Some(args.candidate_id) {
            response.reason = format!("already voted for another candidate this term: {}", self.state.last_vote);
        } else {
            if !args.dry_run {
                self.state.last_vote.grant(args.term, args.candidate_id);
            }
            response.vote_granted = true;
        }

        tracing::debug!(
            candidate = display(args.candidate_id),
            term = args.term,
            granted = response.vote_granted,
            reason = display(&response.reason),
            "vote request decided"
        );
        response
    }

    /// Decide a legacy freshness probe.
    pub fn prepare_fresh_response(&mut self, args: &FreshArgs, now: Instant) -> Result<FreshResponse, CommandError> {
        if self.config.protocol_version != 0 {
            return Err(CommandError::IncompatibleProtocolVersion {
                configured: self.config.protocol_version,
                requested: 0,
            });
        }
        if !self.is_member() {
            return Err(CommandError::NotYetInitialized(
                "cannot participate in elections because not initialized".to_string(),
            ));
        }
        if args.set_name != self.config.set_name {
            return Err(CommandError::InconsistentReplicaSetNames {
                ours: self.config.set_name.clone(),
                theirs: args.set_name.clone(),
            });
        }
        if args.id == self.self_id() {
            return Err(CommandError::BadValue(format!(
                "received replSetFresh command from member with the same member id as ourself: {}",
                args.id
            )));
        }

        let my_timestamp = self.my_last_applied_op_time().timestamp;
        let latest_known = self
            .members
            .iter()
            .take(self.config.num_members())
            .filter(|m| m.is_up())
            .map(|m| m.last_applied_op_time().timestamp)
            .max()
            .unwrap_or(my_timestamp);

        let fresher = self.config.version > args.config_version || latest_known > args.op_time;
        let errmsg = self.fresh_veto_reason(args, now);

        Ok(FreshResponse {
            fresher,
            op_time: my_timestamp,
            veto: errmsg.is_some(),
            errmsg,
        })
    }

    /// Decide a legacy elect request: our vote weight, a refusal (0), or a
    /// veto.
    pub fn prepare_elect_response(&mut self, args: &ElectArgs, now: Instant) -> Result<ElectResponse, CommandError> {
        if self.config.protocol_version != 0 {
            return Err(CommandError::IncompatibleProtocolVersion {
                configured: self.config.protocol_version,
                requested: 0,
            });
        }
        if !self.is_member() {
            return Err(CommandError::NotYetInitialized(
                "cannot participate in elections because not initialized".to_string(),
            ));
        }

        let candidate_index = self.config.find_member_index_by_id(args.who_id);

        let vote = if args.set_name != self.config.set_name {
            tracing::info!(theirs = display(&args.set_name), "elect request for a different set");
            0
        } else if args.config_version != self.config.version {
            tracing::info!(
                ours = self.config.version,
                theirs = args.config_version,
                "elect request with a mismatched config version"
            );
            0
        } else if candidate_index.is_none() {
            tracing::info!(candidate = display(args.who_id), "elect request for an unknown member");
            0
        } else if self.state.role == Role::Leader || self.current_primary_member().is_some() {
            tracing::info!(candidate = display(args.who_id), "vetoing elect request; a primary already exists");
            ELECT_VETO
        } else if candidate_index.is_some_and(|c| self.electable_member_outranks(c)) {
            tracing::info!(candidate = display(args.who_id), "vetoing elect request; a higher priority member exists");
            ELECT_VETO
        } else if self
            .vote_lease
            .is_some_and(|(when, who)| now.duration_since(when) < VOTE_LEASE && who != args.who_id)
        {
            tracing::info!(candidate = display(args.who_id), "refusing to vote; voted too recently");
            0
        } else {
            self.vote_lease = Some((now, args.who_id));
            self.self_config().votes as i64
        };

        Ok(ElectResponse { vote, round: args.round })
    }

    /// Record winning the election: leader-elect, primary is us.
    ///
    /// Exactly one of `process_win_election` / `process_lose_election` must
    /// follow every transition to candidate.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn process_win_election(&mut self, election_id: ElectionId, election_op_time: Timestamp) {
        self.state.win_election(election_id, election_op_time);
        self.sync_source = None;
        tracing::info!(term = self.state.term, "election won; entering leader-elect");
    }

    /// Record losing the election and return to follower.
    pub fn process_lose_election(&mut self) {
        tracing::info!(term = self.state.term, "election lost; returning to follower");
        self.state.lose_election();
        self.reroll_election_offset();
    }

    // --- Internal.

    fn check_electable(&self, now: Instant, reason: StartElectionReason) -> Result<(), ElectionIneligible> {
        if !self.config.is_initialized() {
            return Err(ElectionIneligible::NoConfig);
        }
        let Some(self_index) = self.state.self_index else {
            return Err(ElectionIneligible::NotAMember);
        };

        if self.state.role != Role::Follower {
            return Err(ElectionIneligible::WrongRole {
                role: self.state.role.to_string(),
            });
        }
        if self.state.maintenance_count > 0 {
            return Err(ElectionIneligible::Maintenance {
                count: self.state.maintenance_count,
            });
        }
        if self.member_state() != MemberState::Secondary {
            return Err(ElectionIneligible::NotSecondary {
                state: self.member_state().to_string(),
            });
        }
        if let Some(until) = self.state.election_sleep_until {
            if now < until {
                return Err(ElectionIneligible::Frozen {
                    remaining_ms: until.duration_since(now).as_millis(),
                });
            }
        }

        let me = self.config.member_at(self_index);
        if !me.is_voter() || !me.is_electable() {
            return Err(ElectionIneligible::NotElectableInConfig);
        }

        if let Some(primary_index) = self.state.current_primary_index {
            if primary_index != self_index {
                return Err(ElectionIneligible::PrimaryVisible { primary_index });
            }
        }

        // Takeovers and step-up requests carry their own freshness evidence.
        let relaxed = matches!(
            reason,
            StartElectionReason::StepUpRequest
                | StartElectionReason::PriorityTakeover
                | StartElectionReason::CatchupTakeover
        );
        if !relaxed && !self.close_enough_to_latest_op_time() {
            return Err(ElectionIneligible::TooStale);
        }

        Ok(())
    }

    /// Whether our applied opTime trails the freshest observed member by no
    /// more than the freshness threshold.
    fn close_enough_to_latest_op_time(&self) -> bool {
        let mine = self.my_last_applied_op_time().timestamp.0;
        let latest = self
            .members
            .iter()
            .take(self.config.num_members())
            .filter(|m| m.is_up())
            .map(|m| m.last_applied_op_time().timestamp.0)
            .max()
            .unwrap_or(mine);

        latest.saturating_sub(mine) <= self.options().election_freshness_threshold.as_secs()
    }

    /// Whether any member that looks fit to lead strictly outranks the
    /// candidate at `candidate_index`; used to veto legacy elections.
    fn electable_member_outranks(&self, candidate_index: usize) -> bool {
        let candidate_priority = self.config.member_at(candidate_index).priority;
        (0..self.config.num_members()).any(|i| {
            i != candidate_index
                && self.member_looks_electable(i)
                && self.config.member_at(i).priority > candidate_priority
        })
    }

    /// Whether the member at `index` could win an election, as far as we can
    /// tell from here.
    pub(crate) fn member_looks_electable(&self, index: usize) -> bool {
        let mc = self.config.member_at(index);
        if !mc.is_voter() || !mc.is_electable() || !mc.slave_delay.is_zero() {
            return false;
        }

        let m = &self.members[index];
        if m.is_self() {
            return self.member_state() == MemberState::Secondary;
        }
        m.is_up() && m.state().is_secondary()
    }

    fn fresh_veto_reason(&self, args: &FreshArgs, _now: Instant) -> Option<String> {
        if args.config_version < self.config.version {
            return Some(format!(
                "candidate's config version ({}) is stale; ours is {}",
                args.config_version, self.config.version
            ));
        }

        let Some(candidate_index) = self.config.find_member_index_by_id(args.id) else {
            return Some(format!("candidate {} is not in config", args.id));
        };

        if self.electable_member_outranks(candidate_index) {
            return Some(format!("candidate {}'s priority is too low", args.id));
        }

        let my_timestamp = self.my_last_applied_op_time().timestamp;
        if args.op_time == my_timestamp && args.id > self.self_id() {
            return Some(format!(
                "candidate {} is tied with us and does not hold the lower member id",
                args.id
            ));
        }

        None
    }
}
