use std::time::Instant;

use pretty_assertions::assert_eq;

use crate::coordinator::testing::*;

#[test]
fn test_majority_commit_five_voters() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(5, 0, 2, t0);
    topo.set_my_last_applied_op_time(op(10, 2), t0);
    topo.set_my_last_durable_op_time(op(10, 2), t0);

    ack_heartbeat(&mut topo, t0, 1, secondary_response(2, op(10, 2)));
    ack_heartbeat(&mut topo, t0, 2, secondary_response(2, op(9, 2)));
    ack_heartbeat(&mut topo, t0, 3, secondary_response(2, op(8, 2)));
    ack_heartbeat(&mut topo, t0, 4, secondary_response(2, op(7, 2)));

    // Sorted descending the voter opTimes are (10,10,9,8,7); the entry at
    // index 2 is what three of five voters have reached.
    assert_eq!(true, topo.update_last_committed_op_time());
    assert_eq!(op(9, 2), topo.last_committed_op_time());

    // Recomputing without new progress changes nothing.
    assert_eq!(false, topo.update_last_committed_op_time());

    Ok(())
}

#[test]
fn test_commit_requires_current_term() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 3, t0);
    topo.set_my_last_applied_op_time(op(10, 2), t0);
    topo.set_my_last_durable_op_time(op(10, 2), t0);

    // Every voter has reached (10,2), but term 2 entries may still be rolled
    // back; nothing commits until a term-3 entry reaches a majority.
    ack_heartbeat(&mut topo, t0, 1, secondary_response(3, op(10, 2)));
    ack_heartbeat(&mut topo, t0, 2, secondary_response(3, op(10, 2)));

    assert_eq!(false, topo.update_last_committed_op_time());
    assert_eq!(op(0, 0), topo.last_committed_op_time());

    Ok(())
}

#[test]
fn test_commit_uses_applied_when_journaling_not_required() -> anyhow::Result<()> {
    let t0 = Instant::now();

    let mut cfg = config(3, 1);
    cfg.write_concern_majority_journal_default = false;

    let options = crate::coordinator::Options {
        election_jitter_seed: Some(7),
        ..Default::default()
    };
    let mut topo = crate::coordinator::TopologyCoordinator::new(options, t0);
    topo.update_config(cfg, Some(0), t0);
    topo.set_follower_mode(crate::member_state::MemberState::Secondary);

    topo.set_my_last_applied_op_time(op(10, 0), t0);
    // Durable opTimes lag far behind; with journaling not required they are
    // irrelevant.
    let mut response = secondary_response(0, op(10, 0));
    response.durable_op_time = op(1, 0);
    ack_heartbeat(&mut topo, t0, 1, response.clone());
    ack_heartbeat(&mut topo, t0, 2, response);

    assert_eq!(true, topo.update_last_committed_op_time());
    assert_eq!(op(10, 0), topo.last_committed_op_time());

    Ok(())
}

#[test]
fn test_advance_is_monotonic_and_ignores_backward_moves() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);
    topo.set_my_last_applied_op_time(op(20, 0), t0);

    assert_eq!(true, topo.advance_last_committed_op_time(op(5, 0)));
    assert_eq!(op(5, 0), topo.last_committed_op_time());

    // Backward moves are silently ignored, not errors.
    assert_eq!(false, topo.advance_last_committed_op_time(op(3, 0)));
    assert_eq!(op(5, 0), topo.last_committed_op_time());

    assert_eq!(true, topo.advance_last_committed_op_time(op(8, 0)));
    assert_eq!(op(8, 0), topo.last_committed_op_time());

    Ok(())
}

#[test]
fn test_advance_never_passes_local_applied() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);
    topo.set_my_last_applied_op_time(op(6, 0), t0);

    // A commit point learned from upstream is capped at what we have locally.
    assert_eq!(true, topo.advance_last_committed_op_time(op(9, 0)));
    assert_eq!(op(6, 0), topo.last_committed_op_time());

    Ok(())
}

#[test]
fn test_commit_floor_during_new_tenure() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 2, t0);
    topo.set_my_last_applied_op_time(op(10, 2), t0);

    // The fixture's first op of term is (1,2); an older commit point from
    // before our election must not count.
    assert_eq!(false, topo.advance_last_committed_op_time(op(1, 1)));

    assert_eq!(true, topo.advance_last_committed_op_time(op(4, 2)));
    assert_eq!(op(4, 2), topo.last_committed_op_time());

    Ok(())
}
