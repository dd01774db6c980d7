use std::time::Instant;

use crate::coordinator::ChainingPreference;
use crate::coordinator::TopologyCoordinator;
use crate::host_port::HostAndPort;
use crate::optime::OpTime;
use crate::rpc::OplogQueryMetadata;
use crate::rpc::ReplSetMetadata;

impl TopologyCoordinator {
    /// Choose and record a new sync source, based on what we currently know
    /// of the set. Returns `None` when no member qualifies.
    ///
    /// Selection runs two passes: the first admits only members within the
    /// ping threshold whose reported sync topology would not chain back
    /// through us; the second relaxes both. Ties go to the lowest member id.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn choose_new_sync_source(
        &mut self,
        now: Instant,
        my_last_fetched: OpTime,
        chaining_preference: ChainingPreference,
    ) -> Option<HostAndPort> {
        if !self.is_member() {
            self.sync_source = None;
            return None;
        }

        // A forced source is consumed whether or not it qualifies fully; the
        // operator asked for it by name.
        if let Some(forced) = self.force_sync_source_index.take() {
            let host = self.config.member_at(forced).host.clone();
            tracing::info!(source = display(&host), "choosing sync source by operator request");
            self.sync_source = Some(host.clone());
            return Some(host);
        }

        // With chaining disabled only the primary may feed us.
        if chaining_preference == ChainingPreference::UseConfiguration && !self.config.chaining_allowed {
            let Some(primary_index) = self.state.current_primary_index else {
                tracing::debug!("chaining disallowed and no primary visible; cannot choose a sync source");
                self.sync_source = None;
                return None;
            };
            if Some(primary_index) == self.state.self_index
                || !self.sync_source_candidate(primary_index, now, my_last_fetched)
            {
                self.sync_source = None;
                return None;
            }
            let host = self.config.member_at(primary_index).host.clone();
            tracing::info!(source = display(&host), "syncing from the primary; chaining is disallowed");
            self.sync_source = Some(host.clone());
            return Some(host);
        }

        for relaxed_ping in [false, true] {
            let mut best: Option<usize> = None;

            for idx in 0..self.config.num_members() {
                if !self.sync_source_candidate(idx, now, my_last_fetched) {
                    continue;
                }
                if self.would_chain_through_us(idx) {
                    continue;
                }
                if !relaxed_ping {
                    let close_enough = self.members[idx]
                        .last_rtt()
                        .is_some_and(|rtt| rtt <= self.options().sync_source_ping_threshold);
                    if !close_enough {
                        continue;
                    }
                }

                best = match best {
                    Some(b) if self.config.member_at(b).id <= self.config.member_at(idx).id => Some(b),
                    _ => Some(idx),
                };
            }

            if let Some(chosen) = best {
                let host = self.config.member_at(chosen).host.clone();
                tracing::info!(source = display(&host), relaxed_ping, "sync source chosen");
                self.sync_source = Some(host.clone());
                return Some(host);
            }
        }

        tracing::info!("could not find a member to sync from");
        self.sync_source = None;
        None
    }

    /// Whether the current sync source should be abandoned for a better one.
    ///
    /// True when the source left the config, is blacklisted or down, lags a
    /// syncable candidate by more than the allowed sync lag, or (protocol v1)
    /// is a dead end: not the primary, with no sync source of its own, and
    /// nothing we do not already have.
    pub fn should_change_sync_source(
        &self,
        current_source: &HostAndPort,
        repl_metadata: &ReplSetMetadata,
        oq_metadata: Option<&OplogQueryMetadata>,
        now: Instant,
    ) -> bool {
        if !self.is_member() {
            return false;
        }

        let Some(current_index) = self.config.find_member_index_by_host(current_source) else {
            tracing::info!(source = display(current_source), "sync source is no longer in our config");
            return true;
        };

        if self.is_blacklisted(current_source, now) {
            return true;
        }
        if !self.members[current_index].is_up() {
            tracing::info!(source = display(current_source), "sync source is down");
            return true;
        }

        let (meta_op_time, source_has_sync_source, source_index_is_primary) = match oq_metadata {
            Some(oq) => (
                oq.last_op_applied,
                oq.sync_source_index.is_some(),
                oq.primary_index == Some(current_index),
            ),
            None => (
                repl_metadata.last_op_visible,
                repl_metadata.sync_source_index.is_some(),
                repl_metadata.primary_index == Some(current_index),
            ),
        };
        let source_op_time = meta_op_time.max(self.members[current_index].last_applied_op_time());

        // Nothing heard from the source yet; give it a chance.
        if !source_op_time.is_set() {
            return false;
        }

        if self.config.protocol_version == 1
            && !source_has_sync_source
            && !source_index_is_primary
            && source_op_time <= self.my_last_applied_op_time()
        {
            tracing::info!(
                source = display(current_source),
                "sync source is a dead end: not primary, syncing from nobody, and has nothing new"
            );
            return true;
        }

        let goal = source_op_time.timestamp.0 + self.options().max_sync_source_lag.as_secs();
        for idx in 0..self.config.num_members() {
            if idx == current_index {
                continue;
            }
            if self.sync_source_candidate(idx, now, OpTime::default())
                && self.members[idx].last_applied_op_time().timestamp.0 > goal
            {
                tracing::info!(
                    source = display(current_source),
                    fresher = display(&self.config.member_at(idx).host),
                    "sync source lags a syncable member by more than the allowed sync lag"
                );
                return true;
            }
        }

        false
    }

    /// Suppress `host` as a sync source until `until`.
    pub fn blacklist_sync_source(&mut self, host: &HostAndPort, until: Instant) {
        tracing::debug!(host = display(host), "blacklisting sync source");
        self.sync_source_blacklist.insert(host.clone(), until);
    }

    /// Lift the suppression of `host` if its entry has expired by `now`.
    pub fn unblacklist_sync_source(&mut self, host: &HostAndPort, now: Instant) {
        if let Some(&until) = self.sync_source_blacklist.get(host) {
            if until <= now {
                tracing::debug!(host = display(host), "unblacklisting sync source");
                self.sync_source_blacklist.remove(host);
            }
        }
    }

    pub fn clear_sync_source_blacklist(&mut self) {
        self.sync_source_blacklist.clear();
    }

    /// Name the config index to prefer on the next sync-source choice.
    pub fn set_force_sync_source_index(&mut self, index: usize) {
        assert!(index < self.config.num_members(), "forced sync source index out of range");
        self.force_sync_source_index = Some(index);
    }

    // --- Internal.

    pub(crate) fn is_blacklisted(&self, host: &HostAndPort, now: Instant) -> bool {
        self.sync_source_blacklist.get(host).is_some_and(|&until| until > now)
    }

    /// The baseline tests every sync-source candidate must pass: up, reading
    /// from it is possible and allowed, and it has oplog we do not.
    fn sync_source_candidate(&self, index: usize, now: Instant, my_last_fetched: OpTime) -> bool {
        if Some(index) == self.state.self_index {
            return false;
        }

        let mc = self.config.member_at(index);
        if mc.arbiter_only || mc.hidden {
            return false;
        }

        let m = &self.members[index];
        if !m.is_up() || !m.state().is_readable() {
            return false;
        }
        if self.is_blacklisted(&mc.host, now) {
            return false;
        }

        m.last_applied_op_time() > my_last_fetched
    }

    /// Whether syncing from the member at `index` would create a loop that
    /// leads back to us, according to the sync topology members last
    /// reported.
    fn would_chain_through_us(&self, index: usize) -> bool {
        let Some(my_host) = self.my_host().cloned() else {
            return false;
        };

        let mut hop = self.members[index].sync_source().cloned();
        // Bounded walk; reported topology can be stale or cyclic.
        for _ in 0..self.config.num_members() {
            let Some(host) = hop else {
                return false;
            };
            if host == my_host {
                return true;
            }
            hop = self
                .config
                .find_member_index_by_host(&host)
                .and_then(|i| self.members[i].sync_source().cloned());
        }
        false
    }
}
