//! Recording controller double shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use traject_common::controller::driver::{check_count, check_motor};
use traject_common::controller::{
    ControllerError, ControllerHandle, PrePositioner, TrajectoryController,
};
use traject_scan::{AxisOrderMapping, MoveExecutor, ProfileCompiler};

/// One controller call, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetMTraj(u32, Vec<f64>),
    SetMMove(u32, bool),
    SetElements(u32),
    SetPulses(u32),
    SetStartPulse(u32),
    SetStopPulse(u32),
    SetTime(f64),
    SetAccelerationTime(f64),
    Build,
    Execute,
    Read,
    Stop,
}

/// Controller double: records calls, fails on demand, can hold `execute()` open.
pub struct MockController {
    max_motors: u32,
    calls: Mutex<Vec<Call>>,
    paths: Mutex<HashMap<u32, Vec<f64>>>,
    moving: Mutex<HashMap<u32, bool>>,
    execute_error: Mutex<Option<ControllerError>>,
    build_problem: Mutex<Option<String>>,
    execute_problem: Mutex<Option<String>>,
    ignore_stop: Mutex<bool>,
    gate_open: Mutex<bool>,
    gate: Condvar,
}

impl MockController {
    pub fn new(max_motors: u32) -> Arc<Self> {
        Arc::new(Self {
            max_motors,
            calls: Mutex::new(Vec::new()),
            paths: Mutex::new(HashMap::new()),
            moving: Mutex::new(HashMap::new()),
            execute_error: Mutex::new(None),
            build_problem: Mutex::new(None),
            execute_problem: Mutex::new(None),
            ignore_stop: Mutex::new(false),
            gate_open: Mutex::new(true),
            gate: Condvar::new(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn fail_execute_with(&self, err: ControllerError) {
        *self.execute_error.lock().unwrap() = Some(err);
    }

    pub fn reject_build(&self, reason: &str) {
        *self.build_problem.lock().unwrap() = Some(reason.to_string());
    }

    pub fn reject_execute(&self, reason: &str) {
        *self.execute_problem.lock().unwrap() = Some(reason.to_string());
    }

    /// `stop()` no longer releases a held `execute()`.
    pub fn ignore_stop(&self) {
        *self.ignore_stop.lock().unwrap() = true;
    }

    /// Make the next `execute()` block until [`release`](Self::release) or `stop()`.
    pub fn hold_execute(&self) {
        *self.gate_open.lock().unwrap() = false;
    }

    pub fn release(&self) {
        *self.gate_open.lock().unwrap() = true;
        self.gate.notify_all();
    }

    /// Spin until `execute()` has been entered.
    pub fn wait_for_execute(&self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.calls().contains(&Call::Execute) {
            assert!(Instant::now() < deadline, "execute() never called");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn handle(self: &Arc<Self>) -> ControllerHandle {
        ControllerHandle {
            controller: self.clone(),
            pre_positioner: None,
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl TrajectoryController for MockController {
    fn name(&self) -> &str {
        "mock"
    }

    fn maximum_number_motors(&self) -> u32 {
        self.max_motors
    }

    fn maximum_number_elements(&self) -> u32 {
        1500
    }

    fn maximum_number_pulses(&self) -> u32 {
        60_000
    }

    fn set_m_traj(&self, motor: u32, path: &[f64]) -> Result<(), ControllerError> {
        check_motor(motor, self.max_motors)?;
        self.record(Call::SetMTraj(motor, path.to_vec()));
        self.paths.lock().unwrap().insert(motor, path.to_vec());
        Ok(())
    }

    fn m_traj(&self, motor: u32) -> Result<Vec<f64>, ControllerError> {
        Ok(self.paths.lock().unwrap().get(&motor).cloned().unwrap_or_default())
    }

    fn set_m_move(&self, motor: u32, enabled: bool) -> Result<(), ControllerError> {
        check_motor(motor, self.max_motors)?;
        self.record(Call::SetMMove(motor, enabled));
        self.moving.lock().unwrap().insert(motor, enabled);
        Ok(())
    }

    fn is_m_move(&self, motor: u32) -> Result<bool, ControllerError> {
        Ok(self.moving.lock().unwrap().get(&motor).copied().unwrap_or(false))
    }

    fn set_number_of_elements(&self, elements: u32) -> Result<(), ControllerError> {
        check_count("number of elements", elements, 1500)?;
        self.record(Call::SetElements(elements));
        Ok(())
    }

    fn number_of_elements(&self) -> Result<u32, ControllerError> {
        Ok(0)
    }

    fn set_number_of_pulses(&self, pulses: u32) -> Result<(), ControllerError> {
        check_count("number of pulses", pulses, 60_000)?;
        self.record(Call::SetPulses(pulses));
        Ok(())
    }

    fn number_of_pulses(&self) -> Result<u32, ControllerError> {
        Ok(0)
    }

    fn set_start_pulse_element(&self, element: u32) -> Result<(), ControllerError> {
        self.record(Call::SetStartPulse(element));
        Ok(())
    }

    fn start_pulse_element(&self) -> Result<u32, ControllerError> {
        Ok(0)
    }

    fn set_stop_pulse_element(&self, element: u32) -> Result<(), ControllerError> {
        self.record(Call::SetStopPulse(element));
        Ok(())
    }

    fn stop_pulse_element(&self) -> Result<u32, ControllerError> {
        Ok(0)
    }

    fn set_trajectory_time(&self, seconds: f64) -> Result<(), ControllerError> {
        self.record(Call::SetTime(seconds));
        Ok(())
    }

    fn trajectory_time(&self) -> Result<f64, ControllerError> {
        Ok(0.0)
    }

    fn set_acceleration_time(&self, seconds: f64) -> Result<(), ControllerError> {
        self.record(Call::SetAccelerationTime(seconds));
        Ok(())
    }

    fn acceleration_time(&self) -> Result<f64, ControllerError> {
        Ok(0.0)
    }

    fn build(&self) -> Result<(), ControllerError> {
        self.record(Call::Build);
        Ok(())
    }

    fn check_build_okay(&self) -> Option<String> {
        self.build_problem.lock().unwrap().clone()
    }

    fn execute(&self) -> Result<(), ControllerError> {
        self.record(Call::Execute);
        let open = self.gate_open.lock().unwrap();
        let _open = self.gate.wait_while(open, |open| !*open).unwrap();
        match self.execute_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn check_execute_okay(&self) -> Option<String> {
        self.execute_problem.lock().unwrap().clone()
    }

    fn read(&self) -> Result<(), ControllerError> {
        self.record(Call::Read);
        Ok(())
    }

    fn check_read_okay(&self) -> Option<String> {
        None
    }

    fn m_actual(&self, motor: u32) -> Result<Vec<f64>, ControllerError> {
        self.m_traj(motor)
    }

    fn m_name(&self, motor: u32) -> Result<String, ControllerError> {
        Ok(format!("mock{motor}"))
    }

    fn actual_pulses(&self) -> Result<u32, ControllerError> {
        Ok(self
            .calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::SetPulses(n) => Some(*n),
                _ => None,
            })
            .unwrap_or(0))
    }

    fn stop(&self) -> Result<(), ControllerError> {
        self.record(Call::Stop);
        if !*self.ignore_stop.lock().unwrap() {
            self.release();
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }
}

/// Pre-positioner double recording every target.
#[derive(Default)]
pub struct RecordingMover {
    pub targets: Mutex<Vec<Vec<Option<f64>>>>,
    pub fail: Mutex<bool>,
}

impl PrePositioner for RecordingMover {
    fn move_to(&self, point: &[Option<f64>]) -> Result<(), ControllerError> {
        if *self.fail.lock().unwrap() {
            return Err(ControllerError::communication("moveTo", "axis in fault"));
        }
        self.targets.lock().unwrap().push(point.to_vec());
        Ok(())
    }
}

/// Pointwise executor over `mock` with identity axis order.
pub fn pointwise_executor(mock: &Arc<MockController>, axes: usize) -> MoveExecutor {
    MoveExecutor::new(
        mock.handle(),
        AxisOrderMapping::identity(axes),
        ProfileCompiler::pointwise(),
    )
}
