use std::collections::HashSet;
use std::time::Instant;

use crate::config::MemberId;
use crate::config::ReplSetTagPattern;
use crate::coordinator::Role;
use crate::coordinator::TopologyCoordinator;
use crate::error::CommandError;
use crate::host_port::HostAndPort;
use crate::member_data::MemberData;
use crate::member_data::Rid;
use crate::optime::OpTime;

impl TopologyCoordinator {
    pub fn member_data(&self) -> &[MemberData] {
        &self.members
    }

    pub fn my_member_data(&self) -> &MemberData {
        &self.members[self.my_member_index()]
    }

    pub fn find_member_data_by_id(&self, id: MemberId) -> Option<&MemberData> {
        self.members.iter().find(|m| m.member_id == id)
    }

    /// Legacy master/slave lookup.
    pub fn find_member_data_by_rid(&self, rid: Rid) -> Option<&MemberData> {
        self.slave_members.iter().find(|m| m.rid == Some(rid))
    }

    /// Create (or return) the tracking entry for a legacy slave peer.
    pub fn add_slave_member_data(&mut self, rid: Rid, now: Instant) -> &mut MemberData {
        if let Some(pos) = self.slave_members.iter().position(|m| m.rid == Some(rid)) {
            return &mut self.slave_members[pos];
        }

        let idx = self.slave_members.len();
        let mut m = MemberData::new(idx, MemberId(-1), HostAndPort::default(), false, now);
        m.rid = Some(rid);
        self.slave_members.push(m);
        &mut self.slave_members[idx]
    }

    pub fn my_last_applied_op_time(&self) -> OpTime {
        self.my_member_data().last_applied
    }

    pub fn my_last_durable_op_time(&self) -> OpTime {
        self.my_member_data().last_durable
    }

    /// Progress notification: this node applied up to `op`.
    pub fn set_my_last_applied_op_time(&mut self, op: OpTime, now: Instant) -> bool {
        let idx = self.my_member_index();
        self.members[idx].advance_last_applied(op, now)
    }

    /// Progress notification: this node made `op` durable.
    pub fn set_my_last_durable_op_time(&mut self, op: OpTime, now: Instant) -> bool {
        let idx = self.my_member_index();
        self.members[idx].advance_last_durable(op, now)
    }

    /// Progress notification relayed from a downstream member (an
    /// updatePosition command).
    pub fn process_member_progress(
        &mut self,
        member_id: MemberId,
        applied: OpTime,
        durable: Option<OpTime>,
        now: Instant,
    ) -> Result<(), CommandError> {
        let m = self
            .members
            .iter_mut()
            .find(|m| m.member_id == member_id)
            .ok_or_else(|| CommandError::NodeNotFound(format!("no member found with id {}", member_id)))?;

        m.advance_last_applied(applied, now);
        if let Some(durable) = durable {
            m.advance_last_durable(durable, now);
        }
        Ok(())
    }

    /// The outbound heartbeat status message peers see from us.
    pub fn set_my_heartbeat_message(&mut self, now: Instant, message: impl ToString) {
        let idx = self.my_member_index();
        self.members[idx].last_heartbeat_message = message.to_string();
        self.members[idx].last_update = now;
        self.my_heartbeat_message = message.to_string();
    }

    /// Mark the member at `index` down.
    ///
    /// Returns true iff this node is the leader and can no longer see a
    /// majority of vote weight; the caller must then step it down.
    pub fn set_member_as_down(&mut self, now: Instant, index: usize) -> bool {
        assert_ne!(Some(index), self.state.self_index, "cannot mark ourselves down");
        assert!(index < self.config.num_members(), "member index out of range");

        self.members[index].set_down_values(now, "no response within election timeout period");

        self.state.role == Role::Leader && !self.can_see_majority()
    }

    /// Whether the vote weight of members currently visible to us (ourselves
    /// included) still reaches a majority.
    pub(crate) fn can_see_majority(&self) -> bool {
        let up_votes: u32 = self
            .config
            .members
            .iter()
            .zip(self.members.iter())
            .filter(|(_, m)| m.is_up())
            .map(|(mc, _)| mc.votes as u32)
            .sum();

        up_votes >= self.config.majority_vote_count()
    }

    /// The live peer we have heard from least recently.
    pub fn stalest_live_member(&self) -> Option<(usize, Instant)> {
        self.members
            .iter()
            .take(self.config.num_members())
            .filter(|m| !m.is_self && m.is_up())
            .map(|m| (m.config_index, m.last_update))
            .min_by_key(|&(_, at)| at)
    }

    /// Forgive all members their staleness, restarting the liveness window at
    /// `now`.
    pub fn reset_all_member_timeouts(&mut self, now: Instant) {
        for m in &mut self.members {
            m.last_update = now;
        }
    }

    /// Like `reset_all_member_timeouts`, restricted to the given hosts.
    pub fn reset_member_timeouts(&mut self, now: Instant, hosts: &HashSet<HostAndPort>) {
        for m in &mut self.members {
            if hosts.contains(&m.host) {
                m.last_update = now;
            }
        }
    }

    /// All peers that are not confirmed down.
    pub fn maybe_up_host_and_ports(&self) -> Vec<HostAndPort> {
        self.members
            .iter()
            .take(self.config.num_members())
            .filter(|m| !m.is_self && m.is_maybe_up())
            .map(|m| m.host.clone())
            .collect()
    }

    /// Whether at least `num` members (ourselves included) have reached `op`.
    pub fn have_num_nodes_reached_op_time(&self, op: OpTime, num: usize, durably_written: bool) -> bool {
        self.members_reached(op, durably_written).count() >= num
    }

    /// Whether members satisfying `pattern` have reached `op`.
    pub fn have_tagged_nodes_reached_op_time(
        &self,
        op: OpTime,
        pattern: &ReplSetTagPattern,
        durably_written: bool,
    ) -> bool {
        let reached: Vec<usize> = self
            .members_reached(op, durably_written)
            .map(|m| m.config_index)
            .filter(|&i| i < self.config.num_members())
            .collect();

        pattern.satisfied_by(reached.iter().map(|&i| self.config.member_at(i)))
    }

    /// Hosts known to have reached `op`.
    pub fn hosts_written_to(&self, op: OpTime, durably_written: bool, skip_self: bool) -> Vec<HostAndPort> {
        self.members_reached(op, durably_written)
            .filter(|m| !(skip_self && m.is_self))
            .map(|m| m.host.clone())
            .collect()
    }

    fn members_reached(&self, op: OpTime, durably_written: bool) -> impl Iterator<Item = &MemberData> {
        self.members.iter().filter(move |m| {
            let reached = if durably_written { m.last_durable } else { m.last_applied };
            reached >= op
        })
    }
}
