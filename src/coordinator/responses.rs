use std::time::Duration;
use std::time::Instant;

use crate::coordinator::PrepareFreezeResponseResult;
use crate::coordinator::Role;
use crate::coordinator::TopologyCoordinator;
use crate::error::CommandError;
use crate::host_port::HostAndPort;
use crate::member_state::MemberState;
use crate::rpc::FreezeResponse;
use crate::rpc::IsMasterResponse;
use crate::rpc::MemberHealthReport;
use crate::rpc::MemberPosition;
use crate::rpc::MemberStatus;
use crate::rpc::OplogQueryMetadata;
use crate::rpc::ReplSetHtmlSummary;
use crate::rpc::ReplSetMetadata;
use crate::rpc::ReplSetStatusArgs;
use crate::rpc::ReplSetStatusResponse;
use crate::rpc::SyncFromResponse;
use crate::rpc::UpdatePositionCommand;
use crate::rpc::UpdatePositionCommandStyle;

impl TopologyCoordinator {
    /// Build a full status report of the set as this node sees it.
    pub fn prepare_status_response(
        &self,
        now: Instant,
        args: &ReplSetStatusArgs,
    ) -> Result<ReplSetStatusResponse, CommandError> {
        if !self.config.is_initialized() || !self.is_member() {
            return Err(CommandError::NotYetInitialized(
                "our replica set config is invalid or we are not a member of it".to_string(),
            ));
        }

        let me = self.my_member_data();

        Ok(ReplSetStatusResponse {
            set_name: self.config.set_name.clone(),
            my_state: self.member_state(),
            term: self.state.term,
            heartbeat_interval: self.config.heartbeat_interval,
            self_uptime: args.self_uptime,
            last_committed_op_time: self.state.last_committed_op_time,
            read_concern_majority_op_time: args.read_concern_majority_op_time,
            applied_op_time: me.last_applied_op_time(),
            durable_op_time: me.last_durable_op_time(),
            initial_sync_status: args.initial_sync_status.clone(),
            sync_source: self.sync_source.clone(),
            members: self.member_status_rows(now, args.self_uptime),
        })
    }

    /// Build the reply to an isMaster request. Only meaningful on a node
    /// running with a replica set configuration.
    pub fn fill_is_master_for_repl_set(&self) -> IsMasterResponse {
        if !self.config.is_initialized() {
            return IsMasterResponse::default();
        }

        let my_state = self.member_state();
        let mut response = IsMasterResponse {
            is_master: my_state.is_primary(),
            secondary: my_state.is_secondary(),
            set_name: self.config.set_name.clone(),
            set_version: self.config.version,
            primary: self.current_primary_member().map(|m| m.host().clone()),
            election_id: if my_state.is_primary() { self.state.election_id } else { None },
            read_only: !self.storage_engine_supports_read_committed,
            ..IsMasterResponse::default()
        };

        for mc in &self.config.members {
            if mc.hidden {
                continue;
            }
            if mc.arbiter_only {
                response.arbiters.push(mc.host.clone());
            } else if mc.priority > 0.0 {
                response.hosts.push(mc.host.clone());
            } else {
                response.passives.push(mc.host.clone());
            }
        }

        if let Some(self_index) = self.state.self_index {
            let me = self.config.member_at(self_index);
            response.me = Some(me.host.clone());
            response.arbiter_only = me.arbiter_only;
            response.passive = me.priority == 0.0;
            response.hidden = me.hidden;
            response.build_indexes = me.build_indexes;
            response.slave_delay = me.slave_delay;
            response.tags = me.tags.clone();
        }

        response
    }

    /// Per-member health rows for the serverStatus repl section.
    pub fn fill_member_data(&self, now: Instant) -> Vec<MemberHealthReport> {
        (0..self.config.num_members())
            .map(|idx| {
                let m = &self.members[idx];
                MemberHealthReport {
                    id: m.member_id(),
                    host: m.host().clone(),
                    health: m.health(),
                    state: if m.is_self() { self.member_state() } else { m.state() },
                    applied_op_time: m.last_applied_op_time(),
                    last_heartbeat_ago: m.last_heartbeat.map(|at| now.duration_since(at)),
                    last_heartbeat_message: m.last_heartbeat_message().to_string(),
                }
            })
            .collect()
    }

    /// Build the position report this node sends to its sync source.
    ///
    /// The old command style predates separate durable opTimes; there our own
    /// row reports `committed_snapshot` when available, the only position the
    /// old shape can promise is stable.
    pub fn prepare_replset_update_position_command(
        &self,
        style: UpdatePositionCommandStyle,
        committed_snapshot: Option<crate::optime::OpTime>,
    ) -> Result<UpdatePositionCommand, CommandError> {
        if !self.config.is_initialized() || !self.is_member() {
            return Err(CommandError::NodeNotFound(
                "this node is not in its current configuration and cannot report positions".to_string(),
            ));
        }

        let positions = (0..self.config.num_members())
            .map(|idx| {
                let m = &self.members[idx];
                let applied = match style {
                    UpdatePositionCommandStyle::OldStyle if m.is_self() => {
                        committed_snapshot.unwrap_or_else(|| m.last_applied_op_time())
                    }
                    _ => m.last_applied_op_time(),
                };
                MemberPosition {
                    member_id: m.member_id(),
                    applied_op_time: applied,
                    durable_op_time: match style {
                        UpdatePositionCommandStyle::NewStyle => Some(m.last_durable_op_time()),
                        UpdatePositionCommandStyle::OldStyle => None,
                    },
                    config_version: self.config.version,
                }
            })
            .collect();

        Ok(UpdatePositionCommand { positions })
    }

    /// Metadata describing our term, commit point, and topology, attached to
    /// command replies.
    pub fn prepare_replset_metadata(&self, last_visible_op_time: crate::optime::OpTime) -> ReplSetMetadata {
        ReplSetMetadata {
            term: self.state.term,
            last_op_committed: self.state.last_committed_op_time,
            last_op_visible: last_visible_op_time,
            config_version: self.config.version,
            replica_set_id: self.config.replica_set_id,
            primary_index: self.state.current_primary_index,
            sync_source_index: self.sync_source_index(),
        }
    }

    /// Metadata attached to oplog query replies for downstream selectors.
    pub fn prepare_oplog_query_metadata(&self, rbid: i32) -> OplogQueryMetadata {
        OplogQueryMetadata {
            last_op_committed: self.state.last_committed_op_time,
            last_op_applied: self.my_last_applied_op_time(),
            rbid,
            primary_index: self.state.current_primary_index,
            sync_source_index: self.sync_source_index(),
        }
    }

    /// Fill the diagnostic web page summary.
    pub fn summarize_as_html(&self, now: Instant) -> ReplSetHtmlSummary {
        ReplSetHtmlSummary {
            set_name: self.config.set_name.clone(),
            config_version: self.config.version,
            self_index: self.state.self_index,
            primary_index: self.state.current_primary_index,
            self_state: self.member_state(),
            self_heartbeat_message: self.my_heartbeat_message.clone(),
            members: self.member_status_rows(now, Duration::ZERO),
        }
    }

    /// Decide a syncFrom command: validate the target, then force it as the
    /// next sync source choice.
    pub fn prepare_sync_from_response(&mut self, target: &HostAndPort) -> Result<SyncFromResponse, CommandError> {
        if self.state.role == Role::Leader {
            return Err(CommandError::NotSecondary("primaries don't sync".to_string()));
        }
        let Some(self_index) = self.state.self_index else {
            return Err(CommandError::NotSecondary(
                "removed and uninitialized nodes do not sync".to_string(),
            ));
        };
        if self.config.member_at(self_index).arbiter_only {
            return Err(CommandError::NotSecondary("arbiters don't sync".to_string()));
        }

        let Some(target_index) = self.config.find_member_index_by_host(target) else {
            return Err(CommandError::NodeNotFound(format!(
                "could not find member {} in replica set config",
                target
            )));
        };
        if target_index == self_index {
            return Err(CommandError::BadValue("I cannot sync from myself".to_string()));
        }

        let target_config = self.config.member_at(target_index);
        if target_config.arbiter_only {
            return Err(CommandError::BadValue(format!(
                "cannot sync from {} because it is an arbiter",
                target
            )));
        }
        if !target_config.build_indexes && self.config.member_at(self_index).build_indexes {
            return Err(CommandError::BadValue(format!(
                "cannot sync from {} because it does not build indexes",
                target
            )));
        }

        let target_data = &self.members[target_index];
        if !target_data.is_up() {
            return Err(CommandError::BadValue(format!(
                "I cannot reach the requested member: {}",
                target
            )));
        }

        let mut response = SyncFromResponse {
            prev_sync_target: self.sync_source.clone(),
            sync_from_requested: Some(target.clone()),
            warning: None,
        };
        if target_data.last_applied_op_time() < self.my_last_applied_op_time() {
            response.warning = Some(format!(
                "requested member {} is behind us; syncing from it will not move us forward",
                target
            ));
        }

        self.set_force_sync_source_index(target_index);
        Ok(response)
    }

    /// Decide a freeze command. `secs == 0` unfreezes; in a set where only
    /// this node can lead, unfreezing also asks the runtime to elect us.
    pub fn prepare_freeze_response(
        &mut self,
        now: Instant,
        secs: u64,
    ) -> Result<(FreezeResponse, PrepareFreezeResponseResult), CommandError> {
        if self.state.role != Role::Follower {
            return Err(CommandError::NotSecondary(format!(
                "cannot freeze node when primary or running for election. state: {}",
                self.member_state()
            )));
        }

        let mut response = FreezeResponse::default();

        if secs == 0 {
            self.state.election_sleep_until = None;
            response.info = Some("unfreezing".to_string());

            let single_electable = self
                .state
                .self_index
                .is_some_and(|idx| self.config.is_single_electable_voter_set(idx));
            if single_electable {
                return Ok((response, PrepareFreezeResponseResult::ElectSelf));
            }
            return Ok((response, PrepareFreezeResponseResult::NoAction));
        }

        if secs == 1 {
            response.warning = Some("you really want to freeze for only 1 second?".to_string());
        }

        let until = now + Duration::from_secs(secs);
        let until = match self.state.election_sleep_until {
            Some(existing) => existing.max(until),
            None => until,
        };
        self.state.election_sleep_until = Some(until);
        tracing::info!(secs, "election freeze requested");

        Ok((response, PrepareFreezeResponseResult::NoAction))
    }

    // --- Internal.

    fn sync_source_index(&self) -> Option<usize> {
        self.sync_source
            .as_ref()
            .and_then(|host| self.config.find_member_index_by_host(host))
    }

    fn member_status_rows(&self, now: Instant, self_uptime: Duration) -> Vec<MemberStatus> {
        (0..self.config.num_members())
            .map(|idx| {
                let m = &self.members[idx];
                if m.is_self() {
                    MemberStatus {
                        id: m.member_id(),
                        name: m.host().clone(),
                        is_self: true,
                        health: crate::member_state::HealthStatus::Up,
                        state: self.member_state(),
                        uptime: self_uptime,
                        applied_op_time: m.last_applied_op_time(),
                        durable_op_time: m.last_durable_op_time(),
                        sync_source: self.sync_source.clone(),
                        config_version: self.config.version,
                        election_time: if self.state.role == Role::Leader {
                            self.state.election_time
                        } else {
                            None
                        },
                        ping: None,
                        last_heartbeat_ago: None,
                        last_heartbeat_recv_ago: None,
                        last_heartbeat_message: self.my_heartbeat_message.clone(),
                        maintenance_mode: (self.state.maintenance_count > 0).then_some(self.state.maintenance_count),
                    }
                } else {
                    MemberStatus {
                        id: m.member_id(),
                        name: m.host().clone(),
                        is_self: false,
                        health: m.health(),
                        state: m.state(),
                        uptime: m.up_since.map(|at| now.duration_since(at)).unwrap_or_default(),
                        applied_op_time: m.last_applied_op_time(),
                        durable_op_time: m.last_durable_op_time(),
                        sync_source: m.sync_source().cloned(),
                        config_version: m.config_version_seen,
                        election_time: if m.state() == MemberState::Primary {
                            m.election_time()
                        } else {
                            None
                        },
                        ping: m.last_rtt(),
                        last_heartbeat_ago: m.last_heartbeat.map(|at| now.duration_since(at)),
                        last_heartbeat_recv_ago: m.last_heartbeat_recv.map(|at| now.duration_since(at)),
                        last_heartbeat_message: m.last_heartbeat_message().to_string(),
                        maintenance_mode: None,
                    }
                }
            })
            .collect()
    }
}
