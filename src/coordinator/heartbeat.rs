use std::time::Duration;
use std::time::Instant;

use crate::coordinator::HeartbeatResponseAction;
use crate::coordinator::Role;
use crate::coordinator::TopologyCoordinator;
use crate::error::CommandError;
use crate::host_port::HostAndPort;
use crate::optime::OpTime;
use crate::optime::Timestamp;
use crate::rpc::HeartbeatArgs;
use crate::rpc::HeartbeatArgsV1;
use crate::rpc::HeartbeatFailure;
use crate::rpc::HeartbeatResponse;

impl TopologyCoordinator {
    /// Build a legacy (protocol v0) heartbeat request for `target`, plus the
    /// time the runtime should wait for the reply.
    pub fn prepare_heartbeat_request(
        &self,
        _now: Instant,
        our_set_name: &str,
        target: &HostAndPort,
    ) -> (HeartbeatArgs, Duration) {
        tracing::debug!(target = display(target), "preparing heartbeat request");
        let args = HeartbeatArgs {
            set_name: self.effective_set_name(our_set_name),
            protocol_version: 1,
            config_version: self.advertised_config_version(),
            sender_id: self.is_member().then(|| self.self_id()),
            sender_host: self.my_host().cloned().unwrap_or_default(),
            check_empty: !self.config.is_initialized(),
        };

        (args, self.heartbeat_timeout())
    }

    /// Build a protocol v1 heartbeat request for `target`.
    pub fn prepare_heartbeat_request_v1(
        &self,
        _now: Instant,
        our_set_name: &str,
        target: &HostAndPort,
    ) -> (HeartbeatArgsV1, Duration) {
        tracing::debug!(target = display(target), "preparing heartbeat request");
        let args = HeartbeatArgsV1 {
            set_name: self.effective_set_name(our_set_name),
            config_version: self.advertised_config_version(),
            sender_id: self.is_member().then(|| self.self_id()),
            sender_host: self.my_host().cloned().unwrap_or_default(),
            term: self.state.term,
        };

        (args, self.heartbeat_timeout())
    }

    /// Reply to a legacy (protocol v0) heartbeat request.
    pub fn prepare_heartbeat_response(
        &mut self,
        now: Instant,
        args: &HeartbeatArgs,
        our_set_name: &str,
    ) -> Result<HeartbeatResponse, CommandError> {
        if args.protocol_version != 1 {
            return Err(CommandError::BadValue(format!(
                "incompatible heartbeat protocol version: {}",
                args.protocol_version
            )));
        }

        if self.config.is_initialized() && self.config.protocol_version == 1 {
            return Err(CommandError::IncompatibleProtocolVersion {
                configured: 1,
                requested: 0,
            });
        }

        self.check_heartbeat_sender(now, args.sender_id, &args.set_name, our_set_name)?;
        Ok(self.build_heartbeat_response(args.config_version))
    }

    /// Reply to a protocol v1 heartbeat request.
    pub fn prepare_heartbeat_response_v1(
        &mut self,
        now: Instant,
        args: &HeartbeatArgsV1,
        our_set_name: &str,
    ) -> Result<HeartbeatResponse, CommandError> {
        if self.config.is_initialized() && self.config.protocol_version == 0 {
            return Err(CommandError::IncompatibleProtocolVersion {
                configured: 0,
                requested: 1,
            });
        }

        self.check_heartbeat_sender(now, args.sender_id, &args.set_name, our_set_name)?;
        Ok(self.build_heartbeat_response(args.config_version))
    }

    /// Ingest the outcome of a heartbeat exchange with `target` and decide
    /// what the runtime must do next.
    ///
    /// When the returned action is `StepDownSelf` this node has already
    /// transitioned to the follower role; the caller performs the runtime
    /// side of stepping down.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn process_heartbeat_response(
        &mut self,
        now: Instant,
        rtt: Duration,
        target: &HostAndPort,
        result: Result<HeartbeatResponse, HeartbeatFailure>,
    ) -> HeartbeatResponseAction {
        let next_period = now + self.config.heartbeat_interval;

        let target_index = match self.config.find_member_index_by_host(target) {
            Some(idx) if Some(idx) != self.state.self_index => idx,
            _ => {
                tracing::debug!(target = display(target), "heartbeat response from a host not in our config");
                return HeartbeatResponseAction::no_action().with_next_heartbeat(next_period);
            }
        };

        let response = match result {
            Ok(response) => response,
            Err(failure) => {
                let next = self.handle_heartbeat_failure(now, target_index, &failure);
                return HeartbeatResponseAction::no_action().with_next_heartbeat(next);
            }
        };

        tracing::debug!(
            target = display(target),
            state = display(response.state),
            term = response.term,
            "heartbeat response received"
        );

        let advertises_newer_config = response.config_version > self.config.version;
        {
            let m = &mut self.members[target_index];
            m.set_up_values(now, rtt, response.state);
            m.last_applied = response.applied_op_time;
            m.last_durable = response.durable_op_time;
            m.election_time = response.election_time;
            m.sync_source = response.sync_source.clone();
            m.term = response.term;
            m.config_version_seen = response.config_version;
            if response.rbid.is_some() {
                m.rbid = response.rbid;
            }
        }

        if advertises_newer_config {
            if let Some(new_config) = response.config {
                tracing::info!(
                    ours = self.config.version,
                    theirs = new_config.version,
                    "peer advertises a newer configuration"
                );
                return HeartbeatResponseAction::reconfig(new_config).with_next_heartbeat(next_period);
            }
        }

        self.update_primary_from_heartbeat(now, target_index, &response).with_next_heartbeat(next_period)
    }

    /// Sweep the registry and mark members we have not heard from within an
    /// election timeout as down. Returns `StepDownSelf` when this costs a
    /// leader its majority (the role has then already changed).
    pub fn check_member_timeouts(&mut self, now: Instant) -> HeartbeatResponseAction {
        let mut lost_majority = false;

        for idx in 0..self.config.num_members() {
            if Some(idx) == self.state.self_index {
                continue;
            }
            let m = &self.members[idx];
            if m.is_up() && m.last_update + self.config.election_timeout < now {
                tracing::info!(member = display(&m.host), "member has not been updated within the election timeout");
                lost_majority |= self.set_member_as_down(now, idx);
                if self.state.current_primary_index == Some(idx) {
                    self.state.current_primary_index = None;
                }
            }
        }

        if lost_majority {
            tracing::info!("cannot see a majority of the set; stepping down");
            self.state.step_down_to_follower();
            return HeartbeatResponseAction::step_down_self();
        }
        HeartbeatResponseAction::no_action()
    }

    /// Forget which members have responded; used when the runtime restarts
    /// its heartbeat schedule.
    pub fn restart_heartbeats(&mut self) {
        for m in &mut self.members {
            m.updated_since_restart = false;
        }
    }

    /// The freshest opTime across all up peers, provided every peer has
    /// responded (successfully or not) since `restart_heartbeats`.
    ///
    /// Returns the smallest opTime when every other member is down, and
    /// `None` while any of them has yet to respond.
    pub fn latest_known_op_time_since_heartbeat_restart(&self) -> Option<OpTime> {
        let mut latest = OpTime::default();
        for idx in 0..self.config.num_members() {
            if Some(idx) == self.state.self_index {
                continue;
            }
            let m = &self.members[idx];
            if !m.updated_since_restart {
                return None;
            }
            if m.is_up() && m.last_applied > latest {
                latest = m.last_applied;
            }
        }
        Some(latest)
    }

    // --- Internal.

    fn effective_set_name(&self, our_set_name: &str) -> String {
        if self.config.is_initialized() {
            self.config.set_name.clone()
        } else {
            our_set_name.to_string()
        }
    }

    fn advertised_config_version(&self) -> i64 {
        if self.config.is_initialized() {
            self.config.version
        } else {
            -2
        }
    }

    pub(crate) fn my_host(&self) -> Option<&HostAndPort> {
        self.state.self_index.map(|i| &self.config.member_at(i).host)
    }

    /// Twice the heartbeat interval, clamped by the election timeout.
    fn heartbeat_timeout(&self) -> Duration {
        (self.config.heartbeat_interval * 2).min(self.config.election_timeout)
    }

    fn check_heartbeat_sender(
        &mut self,
        now: Instant,
        sender_id: Option<crate::config::MemberId>,
        their_set_name: &str,
        our_set_name: &str,
    ) -> Result<(), CommandError> {
        let ours = self.effective_set_name(our_set_name);
        if their_set_name != ours {
            tracing::info!(ours = display(&ours), theirs = display(their_set_name), "replica set name mismatch");
            return Err(CommandError::InconsistentReplicaSetNames {
                ours,
                theirs: their_set_name.to_string(),
            });
        }

        if let Some(sender_id) = sender_id {
            if self.is_member() && sender_id == self.self_id() {
                return Err(CommandError::BadValue(format!(
                    "received heartbeat from member with the same member id as ourself: {}",
                    sender_id
                )));
            }
            if let Some(idx) = self.config.find_member_index_by_id(sender_id) {
                self.members[idx].last_heartbeat_recv = Some(now);
            }
        }
        Ok(())
    }

    fn build_heartbeat_response(&self, requester_config_version: i64) -> HeartbeatResponse {
        let me = self.my_member_data();

        HeartbeatResponse {
            set_name: self.config.set_name.clone(),
            state: self.member_state(),
            election_time: if self.state.role == Role::Leader {
                self.state.election_time
            } else {
                None
            },
            applied_op_time: me.last_applied_op_time(),
            durable_op_time: me.last_durable_op_time(),
            sync_source: self.sync_source.clone(),
            config_version: self.config.version,
            config: (self.config.is_initialized() && requester_config_version < self.config.version)
                .then(|| self.config.clone()),
            primary_id: self
                .state
                .current_primary_index
                .map(|i| self.config.member_at(i).id),
            term: self.state.term,
            rbid: None,
        }
    }

    /// Fold a failed heartbeat attempt into liveness. Returns when the next
    /// heartbeat to this target should start: immediately while retry budget
    /// remains, otherwise after a full interval.
    fn handle_heartbeat_failure(&mut self, now: Instant, target_index: usize, failure: &HeartbeatFailure) -> Instant {
        let retries = self.options().heartbeat_retries;
        let election_timeout = self.config.election_timeout;

        let m = &mut self.members[target_index];
        m.note_heartbeat_failure(now, &failure.to_string());

        match failure {
            HeartbeatFailure::Unauthorized(_) => {
                m.set_auth_issue(now);
            }
            HeartbeatFailure::Unreachable(message) => {
                let window_elapsed = m
                    .last_heartbeat_ok
                    .map_or(true, |ok| now.duration_since(ok) >= election_timeout);
                if m.consecutive_failures > retries && window_elapsed {
                    tracing::info!(
                        member = display(&m.host),
                        failures = m.consecutive_failures,
                        "heartbeat retries exhausted; marking member down"
                    );
                    m.set_down_values(now, message);
                }
            }
        }

        let retry_budget_remains = matches!(failure, HeartbeatFailure::Unreachable(_))
            && self.members[target_index].consecutive_failures <= retries;

        if self.state.current_primary_index == Some(target_index) && !self.members[target_index].is_up() {
            self.state.current_primary_index = None;
        }

        if retry_budget_remains {
            now
        } else {
            now + self.config.heartbeat_interval
        }
    }

    /// The decision chain run after a successful heartbeat updated the
    /// target's registry entry.
    fn update_primary_from_heartbeat(
        &mut self,
        now: Instant,
        target_index: usize,
        response: &HeartbeatResponse,
    ) -> HeartbeatResponseAction {
        let v1 = self.config.protocol_version == 1;

        // A newer term wins immediately: a leader abdicates without adopting
        // it (the runtime re-drives `update_term` once it is a follower); any
        // one else adopts it on the spot.
        if v1 && response.term > self.state.term {
            if self.state.role == Role::Leader {
                tracing::info!(ours = self.state.term, theirs = response.term, "newer term seen; stepping down");
                self.state.step_down_to_follower();
                return HeartbeatResponseAction::step_down_self();
            }
            self.state.abandon_candidacy();
            self.state.term = response.term;
        }

        let claims_current_primary = response.claims_primary() && (!v1 || response.term == self.state.term);

        if claims_current_primary {
            if let Some(action) = self.resolve_primary_conflict(now, target_index, response) {
                return action;
            }
        } else if self.state.current_primary_index == Some(target_index) {
            // Our recorded primary no longer claims the post.
            self.state.current_primary_index = None;
        }

        if self.state.role != Role::Follower {
            return HeartbeatResponseAction::no_action();
        }

        match self.state.current_primary_index {
            Some(primary_index) => {
                if v1 {
                    if let Some(action) = self.consider_takeovers(now, primary_index) {
                        return action;
                    }
                }
            }
            None => {
                self.lower_priority_primary_since = None;
                self.primary_stale_since = None;
                if self.election_timeout_elapsed(now) && self.check_should_stand_for_election(now).is_ok() {
                    tracing::info!("no primary within the election timeout; standing for election");
                    self.state.become_candidate();
                    return HeartbeatResponseAction::start_election();
                }
            }
        }

        HeartbeatResponseAction::no_action()
    }

    /// Settle competing primaryship claims: the primary with the older
    /// election time abdicates. Returns an action when one must step down.
    fn resolve_primary_conflict(
        &mut self,
        now: Instant,
        target_index: usize,
        response: &HeartbeatResponse,
    ) -> Option<HeartbeatResponseAction> {
        let their_election_time = response.election_time.unwrap_or(Timestamp::MIN);

        if self.state.role == Role::Leader {
            let our_election_time = self.state.election_time.unwrap_or(Timestamp::MIN);
            return if our_election_time < their_election_time {
                tracing::info!(
                    remote = display(&self.members[target_index].host),
                    "another primary was elected after us; stepping down"
                );
                self.state.step_down_to_follower();
                self.state.current_primary_index = Some(target_index);
                self.last_primary_contact = Some(now);
                Some(HeartbeatResponseAction::step_down_self())
            } else {
                Some(HeartbeatResponseAction::step_down_remote_primary(target_index))
            };
        }

        if let Some(current) = self.state.current_primary_index {
            if current != target_index && self.members[current].state().is_primary() {
                let current_election_time = self.members[current].election_time().unwrap_or(Timestamp::MIN);
                return if their_election_time > current_election_time {
                    self.state.current_primary_index = Some(target_index);
                    self.last_primary_contact = Some(now);
                    Some(HeartbeatResponseAction::step_down_remote_primary(current))
                } else {
                    Some(HeartbeatResponseAction::step_down_remote_primary(target_index))
                };
            }
        }

        self.state.current_primary_index = Some(target_index);
        self.last_primary_contact = Some(now);
        None
    }

    /// Whether we outrank or out-replicate the visible primary, and have done
    /// so long enough to take over.
    fn consider_takeovers(&mut self, now: Instant, primary_index: usize) -> Option<HeartbeatResponseAction> {
        if !self.is_member() {
            return None;
        }
        let self_index = self.state.self_index?;

        let my_priority = self.self_config().priority;
        let primary_priority = self.config.member_at(primary_index).priority;
        if my_priority > primary_priority {
            let since = *self.lower_priority_primary_since.get_or_insert(now);
            if now.duration_since(since) >= self.config.priority_takeover_delay(self_index) {
                tracing::info!(
                    primary = display(&self.members[primary_index].host),
                    "primary has lower priority than us; taking over"
                );
                return Some(HeartbeatResponseAction::priority_takeover());
            }
        } else {
            self.lower_priority_primary_since = None;
        }

        let primary_applied = self.members[primary_index].last_applied_op_time();
        if primary_applied < self.my_last_applied_op_time() {
            let since = *self.primary_stale_since.get_or_insert(now);
            if now.duration_since(since) >= self.config.catchup_takeover_delay {
                tracing::info!(
                    primary = display(&self.members[primary_index].host),
                    "primary's opTime trails ours; taking over to catch it up"
                );
                return Some(HeartbeatResponseAction::catchup_takeover());
            }
        } else {
            self.primary_stale_since = None;
        }

        None
    }

    /// Whether we have been without a primary longer than the election
    /// timeout plus this node's jitter.
    fn election_timeout_elapsed(&self, now: Instant) -> bool {
        let Some(basis) = self.last_primary_contact else {
            return false;
        };
        let Some(self_index) = self.state.self_index else {
            return false;
        };

        let rank = self.config.priority_rank(self.config.member_at(self_index).priority) as u32;
        let wait = self.config.election_timeout + self.random_election_offset * (rank + 1);
        now.duration_since(basis) >= wait
    }
}
