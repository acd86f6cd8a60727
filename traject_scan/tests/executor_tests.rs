//! MoveExecutor integration tests against a recording controller double.

mod common;

use common::{Call, MockController, RecordingMover, pointwise_executor};
use std::sync::Arc;
use std::time::{Duration, Instant};
use traject_common::controller::config::ConstantVelocityConfig;
use traject_common::controller::{ControllerError, ControllerHandle};
use traject_scan::{
    AxisOrderMapping, MoveExecutor, MoveState, ProfileCompiler, ScanError, TrapezoidPathGenerator,
};

#[test]
fn test_two_axis_pointwise_profile_is_pushed() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 2);

    executor.set_trigger_period(0.5).unwrap();
    executor.add_point(vec![1.0, 2.0]).unwrap();
    executor.add_point(vec![3.0, 4.0]).unwrap();
    executor.add_point(vec![5.0, 6.0]).unwrap();
    executor.prepare_for_move().unwrap();

    assert_eq!(executor.state(), MoveState::Prepared);
    assert_eq!(
        mock.calls(),
        vec![
            Call::SetMTraj(1, vec![1.0, 3.0, 5.0]),
            Call::SetMTraj(2, vec![2.0, 4.0, 6.0]),
            Call::SetElements(3),
            Call::SetPulses(3),
            Call::SetStartPulse(1),
            Call::SetStopPulse(3),
            Call::SetTime(1.0),
            Call::SetAccelerationTime(0.0),
            Call::SetMMove(1, true),
            Call::SetMMove(2, true),
            Call::Build,
        ]
    );

    let profile = executor.compiled_profile().unwrap();
    assert_eq!(profile.number_of_pulses, 3);
    assert_eq!(profile.trajectory_time_s, 1.0);
}

#[test]
fn test_axis_without_values_is_disabled() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 2);

    executor.set_trigger_period(0.1).unwrap();
    executor.add_point(vec![Some(1.0), None]).unwrap();
    executor.add_point(vec![Some(2.0), None]).unwrap();
    executor.prepare_for_move().unwrap();

    let profile = executor.compiled_profile().unwrap();
    assert!(profile.is_enabled(0));
    assert!(profile.path(1).is_empty());
    assert_eq!(mock.count(&Call::SetMMove(1, true)), 1);
    assert_eq!(mock.count(&Call::SetMMove(2, false)), 1);
    assert!(
        !mock
            .calls()
            .iter()
            .any(|c| matches!(c, Call::SetMTraj(2, _)))
    );
}

#[test]
fn test_second_start_is_rejected() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();

    mock.hold_execute();
    executor.start_move().unwrap();
    assert_eq!(executor.start_move(), Err(ScanError::AlreadyMoving));
    assert!(executor.is_moving());

    mock.release();
    executor.wait_while_moving().unwrap();
    assert_eq!(mock.count(&Call::Execute), 1);
}

#[test]
fn test_second_start_rejected_even_after_fast_finish() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();

    executor.start_move().unwrap();
    mock.wait_for_execute();
    assert_eq!(executor.start_move(), Err(ScanError::AlreadyMoving));
    executor.wait_while_moving().unwrap();
}

#[test]
fn test_execute_error_surfaces_on_wait() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();

    let source = ControllerError::communication("execute", "channel access timeout");
    mock.fail_execute_with(source.clone());
    executor.start_move().unwrap();

    let err = executor.wait_while_moving().unwrap_err();
    assert_eq!(
        err,
        ScanError::HardwareCommunication {
            operation: "execute",
            source
        }
    );
    assert!(err.to_string().contains("channel access timeout"));
    assert!(!executor.is_moving());
    assert_eq!(executor.state(), MoveState::Failed);
}

#[test]
fn test_execute_status_failure_surfaces_on_wait() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();
    mock.reject_execute("following error on motor 1");

    executor.start_move().unwrap();
    assert_eq!(
        executor.wait_while_moving(),
        Err(ScanError::ExecuteRejected(
            "following error on motor 1".to_string()
        ))
    );
}

#[test]
fn test_wait_without_move_returns_immediately() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    assert!(!executor.is_moving());
    assert_eq!(executor.wait_while_moving(), Ok(()));
}

#[test]
fn test_bounded_wait_times_out_and_move_continues() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();

    mock.hold_execute();
    executor.start_move().unwrap();
    assert!(matches!(
        executor.wait_while_moving_timeout(Duration::from_millis(20)),
        Err(ScanError::ExecuteTimeout(_))
    ));
    assert!(executor.is_moving());
    assert_eq!(executor.state(), MoveState::Executing);

    mock.release();
    assert_eq!(executor.wait_while_moving(), Ok(()));
    assert_eq!(executor.state(), MoveState::Completed);
}

#[test]
fn test_reset_after_prepare_disables_every_motor() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 2);
    executor.set_trigger_period(0.2).unwrap();
    executor.add_point(vec![1.0, 2.0]).unwrap();
    executor.add_point(vec![2.0, 3.0]).unwrap();
    executor.prepare_for_move().unwrap();
    mock.clear_calls();

    executor.stop_and_reset().unwrap();

    let mut expected = vec![Call::Stop];
    expected.extend((1..=8).map(|m| Call::SetMMove(m, false)));
    assert_eq!(mock.calls(), expected);
    assert_eq!(executor.point_count(), 0);
    assert_eq!(executor.trigger_period(), None);
    assert!(executor.compiled_profile().is_none());
    assert_eq!(executor.state(), MoveState::Idle);
}

#[test]
fn test_reset_while_executing_stops_worker() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();

    mock.hold_execute();
    executor.start_move().unwrap();
    mock.wait_for_execute();

    executor.stop_and_reset().unwrap();
    assert!(!executor.is_moving());
    assert!(executor.last_point_added().is_none());
    assert_eq!(executor.state(), MoveState::Idle);
    assert_eq!(executor.wait_while_moving(), Ok(()));
}

#[test]
fn test_reset_detaches_worker_that_ignores_stop() {
    let mock = MockController::new(8);
    let executor =
        pointwise_executor(&mock, 1).with_stop_grace_period(Duration::from_millis(20));
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();

    mock.ignore_stop();
    mock.hold_execute();
    executor.start_move().unwrap();
    mock.wait_for_execute();

    let started = Instant::now();
    executor.stop_and_reset().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!executor.is_moving());
    assert_eq!(executor.state(), MoveState::Idle);

    mock.release();
}

#[test]
fn test_waiter_sees_interrupted_when_reset_detaches_worker() {
    let mock = MockController::new(8);
    let executor = Arc::new(
        pointwise_executor(&mock, 1).with_stop_grace_period(Duration::from_millis(20)),
    );
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();

    mock.ignore_stop();
    mock.hold_execute();
    executor.start_move().unwrap();
    mock.wait_for_execute();

    let waiter = {
        let executor = Arc::clone(&executor);
        std::thread::spawn(move || executor.wait_while_moving())
    };
    // let the waiter block on the running move
    std::thread::sleep(Duration::from_millis(100));

    executor.stop_and_reset().unwrap();
    assert_eq!(waiter.join().unwrap(), Err(ScanError::Interrupted));
    assert!(!executor.is_moving());
    assert_eq!(executor.state(), MoveState::Idle);

    mock.release();
}

#[test]
fn test_reset_from_any_state_leaves_empty_idle_executor() {
    let mock = MockController::new(4);
    let executor = pointwise_executor(&mock, 2);

    executor.stop_and_reset().unwrap();
    assert_eq!(executor.point_count(), 0);
    assert!(!executor.is_moving());

    executor.add_point(vec![1.0, 1.0]).unwrap();
    executor.prepare_for_move().unwrap();
    executor.start_move().unwrap();
    executor.wait_while_moving().unwrap();
    executor.stop_and_reset().unwrap();
    assert_eq!(executor.point_count(), 0);
    assert!(!executor.is_moving());
    assert_eq!(mock.count(&Call::SetMMove(4, false)), 2);
}

#[test]
fn test_custom_axis_order_routes_paths() {
    let mock = MockController::new(8);
    let executor = MoveExecutor::new(
        mock.handle(),
        AxisOrderMapping::new(3, Some(vec![3, 1, 2])).unwrap(),
        ProfileCompiler::pointwise(),
    );
    executor.add_point(vec![10.0, 20.0, 30.0]).unwrap();
    executor.prepare_for_move().unwrap();

    let calls = mock.calls();
    assert!(calls.contains(&Call::SetMTraj(3, vec![10.0])));
    assert!(calls.contains(&Call::SetMTraj(1, vec![20.0])));
    assert!(calls.contains(&Call::SetMTraj(2, vec![30.0])));
}

#[test]
fn test_wrong_dimension_point_rejected() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 2);
    executor.add_point(vec![1.0, 2.0]).unwrap();
    assert_eq!(
        executor.add_point(vec![1.0, 2.0, 3.0]),
        Err(ScanError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    );
    assert_eq!(executor.point_count(), 1);
}

#[test]
fn test_empty_buffer_prepare_is_out_of_range() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 2);
    assert!(matches!(
        executor.prepare_for_move(),
        Err(ScanError::OutOfRange(_))
    ));
    assert_eq!(executor.state(), MoveState::Idle);
    assert!(!mock.calls().contains(&Call::Build));
}

#[test]
fn test_build_rejection_returns_to_idle() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    mock.reject_build("motor 1 soft limit");

    assert_eq!(
        executor.prepare_for_move(),
        Err(ScanError::BuildRejected("motor 1 soft limit".to_string()))
    );
    assert_eq!(executor.state(), MoveState::Idle);
    assert!(executor.compiled_profile().is_none());
    assert_eq!(executor.start_move(), Err(ScanError::NotPrepared));
}

#[test]
fn test_mixed_axis_pattern_rejected_before_push() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 2);
    executor.set_trigger_period(0.1).unwrap();
    executor.add_point(vec![Some(1.0), Some(1.0)]).unwrap();
    executor.add_point(vec![Some(2.0), None]).unwrap();

    assert_eq!(
        executor.prepare_for_move(),
        Err(ScanError::InconsistentAxisPattern { point: 0, axis: 1 })
    );
    assert!(mock.calls().is_empty());
}

#[test]
fn test_missing_trigger_period_rejected() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    executor.add_point(vec![2.0]).unwrap();
    assert_eq!(
        executor.prepare_for_move(),
        Err(ScanError::TriggerPeriodNotSet)
    );
    assert_eq!(
        executor.set_trigger_period(-0.5),
        Err(ScanError::InvalidTriggerPeriod(-0.5))
    );
}

#[test]
fn test_start_without_prepare_rejected() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    assert_eq!(executor.start_move(), Err(ScanError::NotPrepared));
    assert!(!mock.calls().contains(&Call::Execute));
}

#[test]
fn test_pre_position_moves_enabled_axes_to_first_point() {
    let mock = MockController::new(8);
    let mover = Arc::new(RecordingMover::default());
    let handle = ControllerHandle {
        controller: mock.clone(),
        pre_positioner: Some(mover.clone()),
    };
    let executor = MoveExecutor::new(
        handle,
        AxisOrderMapping::identity(2),
        ProfileCompiler::pointwise(),
    )
    .with_pre_positioning(true);

    executor.set_trigger_period(0.1).unwrap();
    executor.add_point(vec![Some(4.0), None]).unwrap();
    executor.add_point(vec![Some(5.0), None]).unwrap();
    executor.prepare_for_move().unwrap();

    assert_eq!(*mover.targets.lock().unwrap(), vec![vec![Some(4.0), None]]);
}

#[test]
fn test_pre_position_failure_aborts_prepare() {
    let mock = MockController::new(8);
    let mover = Arc::new(RecordingMover::default());
    *mover.fail.lock().unwrap() = true;
    let handle = ControllerHandle {
        controller: mock.clone(),
        pre_positioner: Some(mover),
    };
    let executor = MoveExecutor::new(
        handle,
        AxisOrderMapping::identity(1),
        ProfileCompiler::pointwise(),
    )
    .with_pre_positioning(true);

    executor.add_point(vec![1.0]).unwrap();
    assert!(matches!(
        executor.prepare_for_move(),
        Err(ScanError::PrePosition(_))
    ));
    assert!(mock.calls().is_empty());
    assert_eq!(executor.state(), MoveState::Idle);
}

#[test]
fn test_read_back_after_completed_move() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 2);
    executor.set_trigger_period(0.5).unwrap();
    executor.add_point(vec![Some(1.0), None]).unwrap();
    executor.add_point(vec![Some(2.0), None]).unwrap();

    assert_eq!(executor.read_back(), Err(ScanError::NotPrepared));

    executor.prepare_for_move().unwrap();
    executor.start_move().unwrap();
    executor.wait_while_moving().unwrap();

    let readback = executor.read_back().unwrap();
    assert_eq!(readback.actual_pulses, 2);
    assert_eq!(readback.axes.len(), 1);
    assert_eq!(readback.axes[0].axis, 0);
    assert_eq!(readback.axes[0].motor, 1);
    assert_eq!(readback.axes[0].name, "mock1");
    assert_eq!(readback.axes[0].positions, vec![1.0, 2.0]);
    assert!(mock.calls().contains(&Call::Read));
}

#[test]
fn test_reprepare_after_completed_move() {
    let mock = MockController::new(8);
    let executor = pointwise_executor(&mock, 1);
    executor.add_point(vec![1.0]).unwrap();
    executor.prepare_for_move().unwrap();
    executor.start_move().unwrap();
    executor.wait_while_moving().unwrap();

    assert_eq!(executor.start_move(), Err(ScanError::NotPrepared));
    executor.prepare_for_move().unwrap();
    executor.start_move().unwrap();
    executor.wait_while_moving().unwrap();
    assert_eq!(mock.count(&Call::Execute), 2);
}

#[test]
fn test_huge_trigger_period_rejected_for_constant_velocity() {
    let mock = MockController::new(8);
    let executor = MoveExecutor::new(
        mock.handle(),
        AxisOrderMapping::identity(1),
        ProfileCompiler::constant_velocity(Box::new(TrapezoidPathGenerator::new(
            &ConstantVelocityConfig::default(),
            1500,
        ))),
    );
    executor.set_trigger_period(1e300).unwrap();
    executor.add_point(vec![0.0]).unwrap();
    executor.add_point(vec![1.0]).unwrap();

    assert!(matches!(
        executor.prepare_for_move(),
        Err(ScanError::OutOfRange(_))
    ));
    assert_eq!(executor.state(), MoveState::Idle);
    assert!(!mock.calls().contains(&Call::Build));
}
