use std::time::Duration;
use std::time::Instant;

use pretty_assertions::assert_eq;

use crate::config::MemberId;
use crate::coordinator::testing::*;
use crate::coordinator::Options;
use crate::coordinator::PrepareFreezeResponseResult;
use crate::coordinator::TopologyCoordinator;
use crate::error::CommandError;
use crate::member_state::HealthStatus;
use crate::member_state::MemberState;
use crate::optime::ElectionId;
use crate::optime::Timestamp;
use crate::rpc::ReplSetStatusArgs;
use crate::rpc::UpdatePositionCommandStyle;

#[test]
fn test_status_response_reports_the_set_as_we_see_it() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 2, t0);
    topo.set_my_last_applied_op_time(op(9, 2), t0);

    ack_heartbeat(&mut topo, t0, 1, secondary_response(2, op(7, 2)));

    let t5 = t0 + Duration::from_secs(5);
    let args = ReplSetStatusArgs {
        self_uptime: Duration::from_secs(100),
        read_concern_majority_op_time: op(5, 2),
        initial_sync_status: None,
    };
    let status = topo.prepare_status_response(t5, &args)?;

    assert_eq!("rs0", status.set_name);
    assert_eq!(MemberState::Primary, status.my_state);
    assert_eq!(2, status.term);
    assert_eq!(op(9, 2), status.applied_op_time);
    assert_eq!(3, status.members.len());

    let me = &status.members[0];
    assert_eq!(true, me.is_self);
    assert_eq!(Duration::from_secs(100), me.uptime);

    let peer = &status.members[1];
    assert_eq!(MemberState::Secondary, peer.state);
    assert_eq!(HealthStatus::Up, peer.health);
    assert_eq!(op(7, 2), peer.applied_op_time);
    assert_eq!(Some(Duration::from_secs(5)), peer.last_heartbeat_ago);

    let silent = &status.members[2];
    assert_eq!(HealthStatus::Unknown, silent.health);
    assert_eq!(None, silent.last_heartbeat_ago);

    Ok(())
}

#[test]
fn test_status_response_requires_a_config() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let topo = TopologyCoordinator::new(Options::default(), t0);

    let err = topo.prepare_status_response(t0, &ReplSetStatusArgs::default()).unwrap_err();
    assert!(matches!(err, CommandError::NotYetInitialized(_)), "{:?}", err);

    Ok(())
}

#[test]
fn test_is_master_response_for_primary_and_secondary() -> anyhow::Result<()> {
    let t0 = Instant::now();

    // --- as primary
    {
        let topo = leader(3, 0, 2, t0);
        let response = topo.fill_is_master_for_repl_set();

        assert_eq!(true, response.is_master);
        assert_eq!(false, response.secondary);
        assert_eq!("rs0", response.set_name);
        assert_eq!(Some(host(0)), response.me);
        assert_eq!(Some(host(0)), response.primary);
        assert_eq!(Some(ElectionId::from_term(2)), response.election_id);
    }

    // --- as secondary, with the primary discovered by heartbeat
    {
        let mut topo = coordinator(3, 0, t0);
        ack_heartbeat(&mut topo, t0, 2, primary_response(0, op(1, 0), Timestamp(1)));

        let response = topo.fill_is_master_for_repl_set();
        assert_eq!(false, response.is_master);
        assert_eq!(true, response.secondary);
        assert_eq!(Some(host(2)), response.primary);
        assert_eq!(None, response.election_id);
    }

    Ok(())
}

#[test]
fn test_is_master_partitions_hosts() -> anyhow::Result<()> {
    let t0 = Instant::now();

    let mut cfg = config(5, 1);
    cfg.members[1].priority = 0.0;
    cfg.members[2].arbiter_only = true;
    cfg.members[2].priority = 0.0;
    cfg.members[3].hidden = true;
    cfg.members[3].priority = 0.0;

    let mut topo = TopologyCoordinator::new(Options::default(), t0);
    topo.update_config(cfg, Some(0), t0);
    topo.set_follower_mode(MemberState::Secondary);

    let response = topo.fill_is_master_for_repl_set();

    assert_eq!(vec![host(0), host(4)], response.hosts);
    assert_eq!(vec![host(1)], response.passives);
    assert_eq!(vec![host(2)], response.arbiters);

    Ok(())
}

#[test]
fn test_freeze_response() -> anyhow::Result<()> {
    let t0 = Instant::now();

    // --- a primary refuses to freeze
    {
        let mut topo = leader(3, 0, 1, t0);
        let err = topo.prepare_freeze_response(t0, 30).unwrap_err();
        assert!(matches!(err, CommandError::NotSecondary(_)), "{:?}", err);
    }

    // --- freezing a follower suppresses candidacy
    {
        let mut topo = coordinator(3, 0, t0);
        let (response, result) = topo.prepare_freeze_response(t0, 120)?;
        assert_eq!(None, response.info);
        assert_eq!(PrepareFreezeResponseResult::NoAction, result);
        assert_eq!(Some(t0 + Duration::from_secs(120)), topo.election_sleep_until());

        // A one-second freeze earns a warning.
        let (response, _) = topo.prepare_freeze_response(t0, 1)?;
        assert!(response.warning.is_some());
    }

    // --- unfreezing the lone electable voter elects it
    {
        let mut topo = coordinator(1, 0, t0);
        topo.process_win_election(ElectionId(1), Timestamp(1));
        topo.complete_transition_to_primary(op(1, 0));
        topo.prepare_for_step_down_attempt()?;
        topo.attempt_step_down(
            0,
            t0 + Duration::from_secs(6),
            t0 + Duration::from_secs(5),
            t0 + Duration::from_secs(60),
            true,
        )?;

        let (response, result) = topo.prepare_freeze_response(t0 + Duration::from_secs(10), 0)?;
        assert_eq!(Some("unfreezing".to_string()), response.info);
        assert_eq!(PrepareFreezeResponseResult::ElectSelf, result);
        assert_eq!(None, topo.election_sleep_until());
    }

    Ok(())
}

#[test]
fn test_sync_from_response() -> anyhow::Result<()> {
    let t0 = Instant::now();

    // --- primaries don't sync
    {
        let mut topo = leader(3, 0, 1, t0);
        let err = topo.prepare_sync_from_response(&host(1)).unwrap_err();
        assert!(matches!(err, CommandError::NotSecondary(_)), "{:?}", err);
    }

    let mut topo = coordinator(3, 0, t0);
    topo.set_my_last_applied_op_time(op(50, 0), t0);
    ack_heartbeat(&mut topo, t0, 1, secondary_response(0, op(10, 0)));

    // --- cannot sync from ourselves or from unknowns
    assert!(matches!(
        topo.prepare_sync_from_response(&host(0)),
        Err(CommandError::BadValue(_))
    ));
    assert!(matches!(
        topo.prepare_sync_from_response(&host(9)),
        Err(CommandError::NodeNotFound(_))
    ));

    // --- an unreachable target is refused
    assert!(matches!(
        topo.prepare_sync_from_response(&host(2)),
        Err(CommandError::BadValue(_))
    ));

    // --- success warns when the target is behind us and forces the choice
    let response = topo.prepare_sync_from_response(&host(1))?;
    assert!(response.warning.is_some());
    assert_eq!(Some(host(1)), response.sync_from_requested);

    let chosen = topo.choose_new_sync_source(t0, op(0, 0), crate::coordinator::ChainingPreference::AllowChaining);
    assert_eq!(Some(host(1)), chosen);

    Ok(())
}

#[test]
fn test_replset_metadata() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = leader(3, 0, 2, t0);
    topo.set_my_last_applied_op_time(op(9, 2), t0);
    topo.advance_last_committed_op_time(op(8, 2));

    let metadata = topo.prepare_replset_metadata(op(7, 2));

    assert_eq!(2, metadata.term);
    assert_eq!(op(8, 2), metadata.last_op_committed);
    assert_eq!(op(7, 2), metadata.last_op_visible);
    assert_eq!(1, metadata.config_version);
    assert_eq!(Some(0), metadata.primary_index);

    let oq = topo.prepare_oplog_query_metadata(5);
    assert_eq!(5, oq.rbid);
    assert_eq!(op(9, 2), oq.last_op_applied);
    assert_eq!(op(8, 2), oq.last_op_committed);

    Ok(())
}

#[test]
fn test_update_position_command_styles() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);
    topo.set_my_last_applied_op_time(op(9, 0), t0);
    topo.set_my_last_durable_op_time(op(8, 0), t0);

    let new_style = topo.prepare_replset_update_position_command(UpdatePositionCommandStyle::NewStyle, None)?;
    assert_eq!(3, new_style.positions.len());
    assert_eq!(op(9, 0), new_style.positions[0].applied_op_time);
    assert_eq!(Some(op(8, 0)), new_style.positions[0].durable_op_time);

    let old_style =
        topo.prepare_replset_update_position_command(UpdatePositionCommandStyle::OldStyle, Some(op(7, 0)))?;
    assert_eq!(op(7, 0), old_style.positions[0].applied_op_time);
    assert_eq!(None, old_style.positions[0].durable_op_time);

    // A removed node has no position to report.
    topo.update_config(crate::config::ReplSetConfig::new("rs0", 2, vec![member(1), member(2)]), None, t0);
    let err = topo
        .prepare_replset_update_position_command(UpdatePositionCommandStyle::NewStyle, None)
        .unwrap_err();
    assert!(matches!(err, CommandError::NodeNotFound(_)), "{:?}", err);

    Ok(())
}

#[test]
fn test_member_health_reports_and_html_summary() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut topo = coordinator(3, 0, t0);
    topo.set_my_heartbeat_message(t0, "syncing");
    ack_heartbeat(&mut topo, t0, 1, secondary_response(0, op(3, 0)));

    let reports = topo.fill_member_data(t0 + Duration::from_secs(1));
    assert_eq!(3, reports.len());
    assert_eq!(MemberId(1), reports[1].id);
    assert_eq!(HealthStatus::Up, reports[1].health);

    let summary = topo.summarize_as_html(t0 + Duration::from_secs(1));
    assert_eq!("syncing", summary.self_heartbeat_message);
    let rendered = summary.render();
    assert!(rendered.contains("rs0"), "{}", rendered);
    assert!(rendered.contains("node-1"), "{}", rendered);

    Ok(())
}
