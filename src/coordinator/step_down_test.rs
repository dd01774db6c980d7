use std::time::Duration;
use std::time::Instant;

use pretty_assertions::assert_eq;

use crate::coordinator::testing::*;
use crate::coordinator::Role;
use crate::coordinator::StartElectionReason;
use crate::error::CommandError;
use crate::error::ElectionIneligible;

#[test]
fn test_step_down_command_waits_for_caught_up_secondary() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 1, t0);
    topo.set_my_last_applied_op_time(op(10, 1), t0);

    // Both secondaries trail us; no one could take over.
    ack_heartbeat(&mut topo, t0, 1, secondary_response(1, op(5, 1)));
    ack_heartbeat(&mut topo, t0, 2, secondary_response(1, op(5, 1)));

    topo.prepare_for_step_down_attempt()?;

    let wait_until = t0 + Duration::from_secs(5);
    let step_down_until = t0 + Duration::from_secs(60);

    // Not yet: no caught-up electable secondary, deadline not reached.
    assert_eq!(
        false,
        topo.attempt_step_down(1, t0, wait_until, step_down_until, false)?
    );
    assert_eq!(Role::Leader, topo.role());

    // Forced past the wait deadline: down we go.
    let t6 = t0 + Duration::from_secs(6);
    assert_eq!(true, topo.attempt_step_down(1, t6, wait_until, step_down_until, true)?);
    assert_eq!(Role::Follower, topo.role());

    // Elections stay frozen until the stepdown period lapses.
    assert!(matches!(
        topo.become_candidate_if_electable(t0 + Duration::from_secs(7), StartElectionReason::ElectionTimeout),
        Err(ElectionIneligible::Frozen { .. })
    ));
    assert!(topo
        .become_candidate_if_electable(t0 + Duration::from_secs(61), StartElectionReason::ElectionTimeout)
        .is_ok());

    Ok(())
}

#[test]
fn test_step_down_succeeds_with_caught_up_electable_secondary() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 1, t0);
    topo.set_my_last_applied_op_time(op(10, 1), t0);

    ack_heartbeat(&mut topo, t0, 1, secondary_response(1, op(10, 1)));
    ack_heartbeat(&mut topo, t0, 2, secondary_response(1, op(10, 1)));

    assert_eq!(true, topo.is_safe_to_step_down());

    topo.prepare_for_step_down_attempt()?;
    let stepped = topo.attempt_step_down(
        1,
        t0,
        t0 + Duration::from_secs(5),
        t0 + Duration::from_secs(60),
        false,
    )?;

    assert_eq!(true, stepped);
    assert_eq!(Role::Follower, topo.role());

    Ok(())
}

#[test]
fn test_step_down_attempt_abandonment() -> anyhow::Result<()> {
    let t0 = Instant::now();

    // --- the wait deadline passes without the conditions holding
    {
        let mut topo = leader(3, 0, 1, t0);
        topo.set_my_last_applied_op_time(op(10, 1), t0);
        ack_heartbeat(&mut topo, t0, 1, secondary_response(1, op(5, 1)));
        topo.prepare_for_step_down_attempt()?;

        let err = topo
            .attempt_step_down(
                1,
                t0 + Duration::from_secs(6),
                t0 + Duration::from_secs(5),
                t0 + Duration::from_secs(60),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::ExceededTimeLimit(_)), "{:?}", err);
    }

    // --- the whole stepdown period expires
    {
        let mut topo = leader(3, 0, 1, t0);
        topo.prepare_for_step_down_attempt()?;

        let err = topo
            .attempt_step_down(
                1,
                t0 + Duration::from_secs(61),
                t0 + Duration::from_secs(5),
                t0 + Duration::from_secs(60),
                true,
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::ExceededTimeLimit(_)), "{:?}", err);
    }

    // --- the term moved under us
    {
        let mut topo = leader(3, 0, 1, t0);
        topo.prepare_for_step_down_attempt()?;

        let err = topo
            .attempt_step_down(
                7,
                t0,
                t0 + Duration::from_secs(5),
                t0 + Duration::from_secs(60),
                false,
            )
            .unwrap_err();
        assert_eq!(CommandError::StaleTerm { expected: 7, actual: 1 }, err);
    }

    Ok(())
}

#[test]
fn test_only_one_step_down_attempt_at_a_time() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 1, t0);

    topo.prepare_for_step_down_attempt()?;
    let err = topo.prepare_for_step_down_attempt().unwrap_err();
    assert!(matches!(err, CommandError::ConflictingOperationInProgress(_)), "{:?}", err);

    // Aborting restores full primaryship and a new attempt may start.
    topo.abort_attempted_step_down_if_needed();
    assert_eq!(true, topo.can_accept_writes());
    topo.prepare_for_step_down_attempt()?;

    Ok(())
}

#[test]
fn test_unconditional_step_down_supersedes_attempt() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 1, t0);

    topo.prepare_for_step_down_attempt()?;

    // A heartbeat-driven stepdown arrives while the command waits.
    assert_eq!(true, topo.prepare_for_unconditional_step_down());
    assert_eq!(false, topo.prepare_for_unconditional_step_down());
    assert_eq!(true, topo.is_stepping_down());

    // The command attempt now fails instead of completing.
    let err = topo
        .attempt_step_down(
            1,
            t0,
            t0 + Duration::from_secs(5),
            t0 + Duration::from_secs(60),
            true,
        )
        .unwrap_err();
    assert!(matches!(err, CommandError::ConflictingOperationInProgress(_)), "{:?}", err);

    // Aborting the attempt must not cancel the unconditional stepdown.
    topo.abort_attempted_step_down_if_needed();
    assert_eq!(true, topo.is_stepping_down());

    topo.finish_unconditional_step_down();
    assert_eq!(Role::Follower, topo.role());
    assert_eq!(None, topo.current_primary_index());

    Ok(())
}

#[test]
fn test_is_safe_to_step_down_requires_majority() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(5, 0, 1, t0);
    topo.set_my_last_applied_op_time(op(10, 1), t0);

    // Only one of four secondaries caught up: 2 of 5 votes.
    ack_heartbeat(&mut topo, t0, 1, secondary_response(1, op(10, 1)));
    ack_heartbeat(&mut topo, t0, 2, secondary_response(1, op(2, 1)));
    assert_eq!(false, topo.is_safe_to_step_down());

    // A third caught-up voter tips the majority.
    ack_heartbeat(&mut topo, t0, 3, secondary_response(1, op(10, 1)));
    assert_eq!(true, topo.is_safe_to_step_down());

    Ok(())
}
