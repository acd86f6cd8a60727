//! Simulated trajectory controller.
//!
//! Mirrors the behaviour of a trajectory-capable motion controller:
//! - setters are range-checked against the configured limits
//! - `build()` checks the pushed profile and reports soft failures through
//!   the build status instead of an error
//! - `execute()` blocks for the scaled trajectory time and can be cut short by `stop()`
//! - `read()` publishes the positions recorded at each pulse

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use traject_common::controller::config::ControllerConfig;
use traject_common::controller::driver::{check_count, check_motor};
use traject_common::controller::{
    ControllerError, ProcessPhase, ProcessStatus, TrajectoryController,
};

/// Longest trajectory the simulated controller accepts.
pub const MAX_TRAJECTORY_TIME_S: f64 = 24.0 * 3600.0;

#[derive(Debug, Clone, Default)]
struct Motor {
    path: Vec<f64>,
    enabled: bool,
    recorded: Vec<f64>,
    actual: Vec<f64>,
}

#[derive(Debug, Clone)]
struct PhaseReport {
    status: ProcessStatus,
    message: String,
}

impl PhaseReport {
    fn undefined(phase: ProcessPhase) -> Self {
        Self {
            status: ProcessStatus::Undefined,
            message: format!("{phase} not run"),
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self {
            status: ProcessStatus::Success,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ProcessStatus::Failure,
            message: message.into(),
        }
    }

    fn problem(&self) -> Option<String> {
        match self.status {
            ProcessStatus::Success => None,
            _ => Some(self.message.clone()),
        }
    }
}

#[derive(Debug)]
struct SimState {
    motors: Vec<Motor>,
    elements: u32,
    pulses: u32,
    start_pulse: u32,
    stop_pulse: u32,
    time_s: f64,
    accel_time_s: f64,
    build: PhaseReport,
    execute: PhaseReport,
    read: PhaseReport,
    built: bool,
    busy: bool,
    stop_requested: bool,
    actual_pulses: u32,
}

impl SimState {
    fn report_mut(&mut self, phase: ProcessPhase) -> &mut PhaseReport {
        match phase {
            ProcessPhase::Build => &mut self.build,
            ProcessPhase::Execute => &mut self.execute,
            ProcessPhase::Read => &mut self.read,
        }
    }

    fn report(&self, phase: ProcessPhase) -> &PhaseReport {
        match phase {
            ProcessPhase::Build => &self.build,
            ProcessPhase::Execute => &self.execute,
            ProcessPhase::Read => &self.read,
        }
    }

    /// Any change to the profile invalidates the last build.
    fn invalidate(&mut self) {
        self.built = false;
    }

    /// Reason the pushed profile cannot be built, if any.
    fn build_problem(&self) -> Option<String> {
        let enabled: Vec<usize> = (0..self.motors.len())
            .filter(|&i| self.motors[i].enabled)
            .collect();
        if enabled.is_empty() {
            return Some("no motor enabled".to_string());
        }
        if self.elements == 0 {
            return Some("number of elements not set".to_string());
        }
        for i in enabled {
            let len = self.motors[i].path.len();
            if len < self.elements as usize {
                return Some(format!(
                    "motor {} path has {len} elements, {} required",
                    i + 1,
                    self.elements
                ));
            }
        }
        if self.start_pulse == 0 || self.start_pulse > self.stop_pulse {
            return Some(format!(
                "pulse window {}..{} is empty",
                self.start_pulse, self.stop_pulse
            ));
        }
        if self.stop_pulse > self.elements {
            return Some(format!(
                "stop pulse element {} beyond {} elements",
                self.stop_pulse, self.elements
            ));
        }
        if self.elements > 1 && self.time_s <= 0.0 {
            return Some("trajectory time must be > 0".to_string());
        }
        if 2.0 * self.accel_time_s > self.time_s + 1e-9 {
            return Some(format!(
                "acceleration time {} s exceeds half of trajectory time {} s",
                self.accel_time_s, self.time_s
            ));
        }
        None
    }

    /// Pulses emitted over the whole pulse window.
    fn pulse_window(&self) -> u32 {
        (self.stop_pulse + 1)
            .saturating_sub(self.start_pulse)
            .min(self.pulses)
    }

    /// Record the commanded position at each of the first `emitted` pulses.
    fn record(&mut self, emitted: u32) {
        let first = self.start_pulse.saturating_sub(1) as usize;
        for motor in self.motors.iter_mut().filter(|m| m.enabled) {
            let end = (first + emitted as usize).min(motor.path.len());
            motor.recorded = motor.path[first.min(end)..end].to_vec();
        }
        self.actual_pulses = emitted;
    }
}

/// Simulated trajectory controller implementing the full controller contract.
pub struct SimulatedTrajectoryController {
    config: ControllerConfig,
    state: Mutex<SimState>,
    stop_signal: Condvar,
}

impl SimulatedTrajectoryController {
    /// Create a controller with the limits and motor names of `config`.
    pub fn new(config: ControllerConfig) -> Self {
        let motors = vec![Motor::default(); config.max_motors as usize];
        Self {
            config,
            state: Mutex::new(SimState {
                motors,
                elements: 0,
                pulses: 0,
                start_pulse: 0,
                stop_pulse: 0,
                time_s: 0.0,
                accel_time_s: 0.0,
                build: PhaseReport::undefined(ProcessPhase::Build),
                execute: PhaseReport::undefined(ProcessPhase::Execute),
                read: PhaseReport::undefined(ProcessPhase::Read),
                built: false,
                busy: false,
                stop_requested: false,
                actual_pulses: 0,
            }),
            stop_signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn motor_index(&self, motor: u32) -> Result<usize, ControllerError> {
        check_motor(motor, self.config.max_motors)?;
        Ok(motor as usize - 1)
    }

    fn ensure_idle(state: &SimState, operation: &str) -> Result<(), ControllerError> {
        if state.busy {
            return Err(ControllerError::Busy(format!(
                "{operation} while a trajectory is running"
            )));
        }
        Ok(())
    }

    /// Status and message of the last run of `phase`.
    pub fn status(&self, phase: ProcessPhase) -> (ProcessStatus, String) {
        let state = self.lock();
        let report = state.report(phase);
        (report.status, report.message.clone())
    }
}

impl TrajectoryController for SimulatedTrajectoryController {
    fn name(&self) -> &str {
        "simulation"
    }

    fn maximum_number_motors(&self) -> u32 {
        self.config.max_motors
    }

    fn maximum_number_elements(&self) -> u32 {
        self.config.max_elements
    }

    fn maximum_number_pulses(&self) -> u32 {
        self.config.max_pulses
    }

    fn set_m_traj(&self, motor: u32, path: &[f64]) -> Result<(), ControllerError> {
        let index = self.motor_index(motor)?;
        if path.len() > self.config.max_elements as usize {
            return Err(ControllerError::OutOfRange {
                what: "path length",
                value: path.len() as f64,
                max: self.config.max_elements as f64,
            });
        }
        if path.iter().any(|p| !p.is_finite()) {
            return Err(ControllerError::Rejected(format!(
                "motor {motor} path contains a non-finite position"
            )));
        }
        let mut state = self.lock();
        Self::ensure_idle(&state, "setMTraj")?;
        state.motors[index].path = path.to_vec();
        state.invalidate();
        Ok(())
    }

    fn m_traj(&self, motor: u32) -> Result<Vec<f64>, ControllerError> {
        let index = self.motor_index(motor)?;
        Ok(self.lock().motors[index].path.clone())
    }

    /// Disabling is accepted while executing so a reset can release every motor.
    fn set_m_move(&self, motor: u32, enabled: bool) -> Result<(), ControllerError> {
        let index = self.motor_index(motor)?;
        let mut state = self.lock();
        if enabled {
            Self::ensure_idle(&state, "setMMove")?;
        }
        state.motors[index].enabled = enabled;
        state.invalidate();
        Ok(())
    }

    fn is_m_move(&self, motor: u32) -> Result<bool, ControllerError> {
        let index = self.motor_index(motor)?;
        Ok(self.lock().motors[index].enabled)
    }

    fn set_number_of_elements(&self, elements: u32) -> Result<(), ControllerError> {
        check_count("number of elements", elements, self.config.max_elements)?;
        let mut state = self.lock();
        Self::ensure_idle(&state, "setNumberOfElements")?;
        state.elements = elements;
        state.invalidate();
        Ok(())
    }

    fn number_of_elements(&self) -> Result<u32, ControllerError> {
        Ok(self.lock().elements)
    }

    fn set_number_of_pulses(&self, pulses: u32) -> Result<(), ControllerError> {
        check_count("number of pulses", pulses, self.config.max_pulses)?;
        let mut state = self.lock();
        Self::ensure_idle(&state, "setNumberOfPulses")?;
        state.pulses = pulses;
        state.invalidate();
        Ok(())
    }

    fn number_of_pulses(&self) -> Result<u32, ControllerError> {
        Ok(self.lock().pulses)
    }

    fn set_start_pulse_element(&self, element: u32) -> Result<(), ControllerError> {
        check_count("start pulse element", element, self.config.max_elements)?;
        let mut state = self.lock();
        Self::ensure_idle(&state, "setStartPulseElement")?;
        state.start_pulse = element;
        state.invalidate();
        Ok(())
    }

    fn start_pulse_element(&self) -> Result<u32, ControllerError> {
        Ok(self.lock().start_pulse)
    }

    fn set_stop_pulse_element(&self, element: u32) -> Result<(), ControllerError> {
        check_count("stop pulse element", element, self.config.max_elements)?;
        let mut state = self.lock();
        Self::ensure_idle(&state, "setStopPulseElement")?;
        state.stop_pulse = element;
        state.invalidate();
        Ok(())
    }

    fn stop_pulse_element(&self) -> Result<u32, ControllerError> {
        Ok(self.lock().stop_pulse)
    }

    fn set_trajectory_time(&self, seconds: f64) -> Result<(), ControllerError> {
        if !seconds.is_finite() || !(0.0..=MAX_TRAJECTORY_TIME_S).contains(&seconds) {
            return Err(ControllerError::OutOfRange {
                what: "trajectory time",
                value: seconds,
                max: MAX_TRAJECTORY_TIME_S,
            });
        }
        let mut state = self.lock();
        Self::ensure_idle(&state, "setTrajectoryTime")?;
        state.time_s = seconds;
        state.invalidate();
        Ok(())
    }

    fn trajectory_time(&self) -> Result<f64, ControllerError> {
        Ok(self.lock().time_s)
    }

    fn set_acceleration_time(&self, seconds: f64) -> Result<(), ControllerError> {
        if !seconds.is_finite() || !(0.0..=MAX_TRAJECTORY_TIME_S).contains(&seconds) {
            return Err(ControllerError::OutOfRange {
                what: "acceleration time",
                value: seconds,
                max: MAX_TRAJECTORY_TIME_S,
            });
        }
        let mut state = self.lock();
        Self::ensure_idle(&state, "setAccelerationTime")?;
        state.accel_time_s = seconds;
        state.invalidate();
        Ok(())
    }

    fn acceleration_time(&self) -> Result<f64, ControllerError> {
        Ok(self.lock().accel_time_s)
    }

    fn build(&self) -> Result<(), ControllerError> {
        let mut state = self.lock();
        Self::ensure_idle(&state, "build")?;

        state.stop_requested = false;
        state.execute = PhaseReport::undefined(ProcessPhase::Execute);
        state.read = PhaseReport::undefined(ProcessPhase::Read);

        match state.build_problem() {
            Some(problem) => {
                warn!("Simulated build failed: {problem}");
                state.built = false;
                *state.report_mut(ProcessPhase::Build) = PhaseReport::failure(problem);
            }
            None => {
                info!(
                    "Simulated build: {} elements, {} pulses, {:.3} s",
                    state.elements, state.pulses, state.time_s
                );
                state.built = true;
                *state.report_mut(ProcessPhase::Build) = PhaseReport::success("Build complete");
            }
        }
        Ok(())
    }

    fn check_build_okay(&self) -> Option<String> {
        self.lock().build.problem()
    }

    fn execute(&self) -> Result<(), ControllerError> {
        let mut state = self.lock();
        Self::ensure_idle(&state, "execute")?;
        if !state.built {
            return Err(ControllerError::NotBuilt);
        }

        state.busy = true;
        state.execute = PhaseReport::undefined(ProcessPhase::Execute);
        let duration =
            Duration::try_from_secs_f64(state.time_s * self.config.time_scale).unwrap_or_default();
        debug!("Simulated execute for {:.3} s", duration.as_secs_f64());

        let started = Instant::now();
        let (mut state, _) = self
            .stop_signal
            .wait_timeout_while(state, duration, |s| !s.stop_requested)
            .unwrap_or_else(PoisonError::into_inner);
        state.busy = false;

        let window = state.pulse_window();
        if state.stop_requested {
            let fraction = if duration.is_zero() {
                0.0
            } else {
                (started.elapsed().as_secs_f64() / duration.as_secs_f64()).min(1.0)
            };
            let emitted = (window as f64 * fraction).floor() as u32;
            state.record(emitted);
            state.execute = PhaseReport::failure(format!(
                "Trajectory aborted after {emitted} of {window} pulses"
            ));
            info!("Simulated execute aborted after {emitted} pulses");
        } else {
            state.record(window);
            state.execute = PhaseReport::success("Trajectory complete");
        }
        Ok(())
    }

    fn check_execute_okay(&self) -> Option<String> {
        self.lock().execute.problem()
    }

    fn read(&self) -> Result<(), ControllerError> {
        let mut state = self.lock();
        Self::ensure_idle(&state, "read")?;

        if state.execute.status == ProcessStatus::Undefined {
            state.read = PhaseReport::failure("no trajectory has been executed");
            return Ok(());
        }
        for motor in &mut state.motors {
            motor.actual = motor.recorded.clone();
        }
        state.read = PhaseReport::success("Read complete");
        Ok(())
    }

    fn check_read_okay(&self) -> Option<String> {
        self.lock().read.problem()
    }

    fn m_actual(&self, motor: u32) -> Result<Vec<f64>, ControllerError> {
        let index = self.motor_index(motor)?;
        Ok(self.lock().motors[index].actual.clone())
    }

    fn m_name(&self, motor: u32) -> Result<String, ControllerError> {
        check_motor(motor, self.config.max_motors)?;
        Ok(self.config.motor_name(motor))
    }

    fn actual_pulses(&self) -> Result<u32, ControllerError> {
        Ok(self.lock().actual_pulses)
    }

    fn stop(&self) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.stop_requested = true;
        drop(state);
        self.stop_signal.notify_all();
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.lock().busy
    }
}
