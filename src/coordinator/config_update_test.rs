use std::time::Instant;

use pretty_assertions::assert_eq;

use crate::config::MemberId;
use crate::coordinator::testing::*;
use crate::coordinator::Role;
use crate::coordinator::UpdateTermResult;
use crate::last_vote::LastVote;
use crate::member_state::MemberState;

#[test]
fn test_reconfig_preserves_member_progress() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);

    ack_heartbeat(&mut topo, t0, 1, secondary_response(0, op(7, 0)));
    topo.set_my_last_applied_op_time(op(9, 0), t0);

    // Same membership, new version: everything learned survives.
    topo.update_config(config(3, 2), Some(0), t0);

    assert_eq!(op(7, 0), topo.member_data()[1].last_applied_op_time());
    assert_eq!(op(9, 0), topo.my_last_applied_op_time());
    assert_eq!(2, topo.config().version);

    Ok(())
}

#[test]
fn test_reconfig_rebuilds_entries_for_new_members() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);
    ack_heartbeat(&mut topo, t0, 1, secondary_response(0, op(7, 0)));

    // Member 1 is replaced by member 5 at a different host.
    let mut cfg = config(3, 2);
    cfg.members[1] = member(5);
    topo.update_config(cfg, Some(0), t0);

    assert_eq!(MemberId(5), topo.member_data()[1].member_id());
    assert_eq!(op(0, 0), topo.member_data()[1].last_applied_op_time());
    assert_eq!(MemberState::Unknown, topo.member_data()[1].state());

    Ok(())
}

#[test]
fn test_dropped_node_keeps_tracking_its_own_progress() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);
    topo.set_my_last_applied_op_time(op(12, 0), t0);

    // A new config without us: reported state becomes REMOVED but our own
    // opTimes stay known.
    let cfg = crate::config::ReplSetConfig::new("rs0", 2, vec![member(1), member(2)]);
    topo.update_config(cfg, None, t0);

    assert_eq!(MemberState::Removed, topo.member_state());
    assert_eq!(op(12, 0), topo.my_last_applied_op_time());

    Ok(())
}

#[test]
fn test_leader_dropped_from_config_becomes_follower() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 1, t0);

    let cfg = crate::config::ReplSetConfig::new("rs0", 2, vec![member(1), member(2)]);
    topo.update_config(cfg, None, t0);

    assert_eq!(Role::Follower, topo.role());
    assert_eq!(None, topo.current_primary_index());
    assert_eq!(false, topo.can_accept_writes());

    Ok(())
}

#[test]
fn test_leader_survives_reconfig_that_keeps_it() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 1, t0);

    topo.update_config(config(3, 2), Some(0), t0);

    assert_eq!(Role::Leader, topo.role());
    assert_eq!(Some(0), topo.current_primary_index());
    assert_eq!(true, topo.can_accept_writes());

    Ok(())
}

#[test]
fn test_reconfig_preserves_blacklist_and_vote_state() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);

    topo.blacklist_sync_source(&host(1), t0 + std::time::Duration::from_secs(60));
    topo.update_term(4, t0);
    topo.load_last_vote(LastVote::new(4, MemberId(2)));

    topo.update_config(config(3, 2), Some(0), t0);

    assert_eq!(true, topo.is_blacklisted(&host(1), t0));
    assert_eq!(4, topo.term());
    assert_eq!(Some(MemberId(2)), topo.last_vote().voted_for);

    Ok(())
}

#[test]
fn test_single_member_config_goes_straight_to_candidate() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let topo = coordinator(1, 0, t0);
    assert_eq!(Role::Candidate, topo.role());
    Ok(())
}

#[test]
fn test_update_term_is_idempotent_and_leader_guarded() -> anyhow::Result<()> {
    let t0 = Instant::now();

    // --- follower adopts newer terms, once
    {
        let mut topo = coordinator(3, 0, t0);
        assert_eq!(UpdateTermResult::UpdatedTerm, topo.update_term(3, t0));
        assert_eq!(UpdateTermResult::AlreadyUpToDate, topo.update_term(3, t0));
        assert_eq!(UpdateTermResult::AlreadyUpToDate, topo.update_term(1, t0));
        assert_eq!(3, topo.term());
    }

    // --- a primary must be stepped down before the term moves
    {
        let mut topo = leader(3, 0, 2, t0);
        assert_eq!(UpdateTermResult::TriggerStepDown, topo.update_term(5, t0));
        assert_eq!(2, topo.term());

        assert_eq!(true, topo.prepare_for_unconditional_step_down());
        topo.finish_unconditional_step_down();
        assert_eq!(UpdateTermResult::UpdatedTerm, topo.update_term(5, t0));
        assert_eq!(5, topo.term());
    }

    Ok(())
}

#[test]
fn test_load_last_vote_lifts_term() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);

    topo.load_last_vote(LastVote::new(6, MemberId(1)));

    assert_eq!(6, topo.term());
    assert_eq!(6, topo.last_vote().term);

    Ok(())
}

#[test]
fn test_progress_notifications_update_registry() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);

    topo.process_member_progress(MemberId(1), op(8, 0), Some(op(6, 0)), t0)?;
    assert_eq!(op(8, 0), topo.member_data()[1].last_applied_op_time());
    assert_eq!(op(6, 0), topo.member_data()[1].last_durable_op_time());

    let err = topo.process_member_progress(MemberId(9), op(1, 0), None, t0).unwrap_err();
    assert!(matches!(err, crate::error::CommandError::NodeNotFound(_)), "{:?}", err);

    Ok(())
}

#[test]
fn test_legacy_slave_member_data_by_rid() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);

    let rid = crate::member_data::Rid(42);
    topo.add_slave_member_data(rid, t0);

    assert!(topo.find_member_data_by_rid(rid).is_some());
    assert!(topo.find_member_data_by_rid(crate::member_data::Rid(7)).is_none());

    Ok(())
}

#[test]
fn test_stalest_live_member() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);

    assert_eq!(None, topo.stalest_live_member());

    let t1 = t0 + std::time::Duration::from_secs(1);
    let t2 = t0 + std::time::Duration::from_secs(2);
    ack_heartbeat(&mut topo, t1, 1, secondary_response(0, op(1, 0)));
    ack_heartbeat(&mut topo, t2, 2, secondary_response(0, op(1, 0)));

    assert_eq!(Some((1, t1)), topo.stalest_live_member());

    Ok(())
}
