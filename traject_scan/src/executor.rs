//! Move executor.
//!
//! `MoveExecutor` owns the point buffer, the compiled profile and the single
//! in-flight execution task for one controller. Every public operation goes
//! through one mutex, so `prepare_for_move`, `start_move` and `stop_and_reset`
//! never interleave. `wait_while_moving` blocks on the task's completion
//! without holding that mutex, which keeps `stop_and_reset` usable from another
//! thread (e.g. a signal handler) while a caller is waiting.
//!
//! Errors raised by the controller while executing are captured by the worker
//! and handed to the first `wait_while_moving` call.

use crate::axis_order::AxisOrderMapping;
use crate::error::{ControllerResultExt, ScanError};
use crate::path::TrapezoidPathGenerator;
use crate::points::{Point, TrajectoryPointBuffer};
use crate::profile::{CompiledProfile, ProfileCompiler};
use crate::state::{MoveEvent, MoveState, MoveStateMachine, TransitionResult};
use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use traject_common::controller::config::TrajectoryScanConfig;
use traject_common::controller::{
    ControllerError, ControllerHandle, PrePositioner, TrajectoryController,
};
use traject_common::prelude::DEFAULT_STOP_GRACE_PERIOD;

// ─── Completion ─────────────────────────────────────────────────────

#[derive(Debug)]
enum Outcome {
    Running,
    Finished(Result<(), ScanError>),
    Consumed,
}

/// Single-use result slot shared between the worker and the waiters.
#[derive(Debug)]
struct Completion {
    outcome: Mutex<Outcome>,
    done: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(Outcome::Running),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Outcome> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `result` unless a result is already present. First writer wins.
    fn finish(&self, result: Result<(), ScanError>) {
        let mut outcome = self.lock();
        if matches!(*outcome, Outcome::Running) {
            *outcome = Outcome::Finished(result);
        }
        drop(outcome);
        self.done.notify_all();
    }

    fn is_done(&self) -> bool {
        !matches!(*self.lock(), Outcome::Running)
    }

    /// `Some(true)` finished Ok, `Some(false)` finished with an error, `None` running or consumed.
    fn peek(&self) -> Option<bool> {
        match &*self.lock() {
            Outcome::Finished(result) => Some(result.is_ok()),
            _ => None,
        }
    }

    /// Block until finished; `false` if `timeout` elapsed first.
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let outcome = self.lock();
        let running = |o: &mut Outcome| matches!(o, Outcome::Running);
        match timeout {
            None => {
                let _outcome = self
                    .done
                    .wait_while(outcome, running)
                    .unwrap_or_else(PoisonError::into_inner);
                true
            }
            Some(timeout) => {
                let (outcome, _) = self
                    .done
                    .wait_timeout_while(outcome, timeout, running)
                    .unwrap_or_else(PoisonError::into_inner);
                !matches!(*outcome, Outcome::Running)
            }
        }
    }

    /// Hand out the result exactly once.
    fn take(&self) -> Option<Result<(), ScanError>> {
        let mut outcome = self.lock();
        match std::mem::replace(&mut *outcome, Outcome::Consumed) {
            Outcome::Finished(result) => Some(result),
            Outcome::Running => {
                *outcome = Outcome::Running;
                None
            }
            Outcome::Consumed => None,
        }
    }
}

/// Marks the completion interrupted if the worker unwinds before finishing.
struct FinishOnDrop(Arc<Completion>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish(Err(ScanError::Interrupted));
    }
}

/// The single in-flight execution.
struct MoveTask {
    handle: JoinHandle<()>,
    completion: Arc<Completion>,
}

impl MoveTask {
    fn join(self) {
        if self.handle.join().is_err() {
            warn!("Execute worker panicked");
        }
    }
}

// ─── Readback ───────────────────────────────────────────────────────

/// Actual positions of one enabled axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisReadback {
    /// Logical axis index.
    pub axis: usize,
    /// Hardware motor number.
    pub motor: u32,
    /// Hardware motor name.
    pub name: String,
    /// Position at each pulse.
    pub positions: Vec<f64>,
}

/// Positions recorded by the controller during the last execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readback {
    /// One entry per enabled axis, ascending logical index.
    pub axes: Vec<AxisReadback>,
    /// Pulses actually emitted.
    pub actual_pulses: u32,
}

// ─── Executor ───────────────────────────────────────────────────────

struct Inner {
    machine: MoveStateMachine,
    buffer: TrajectoryPointBuffer,
    trigger_period_s: Option<f64>,
    profile: Option<CompiledProfile>,
    task: Option<MoveTask>,
}

impl Inner {
    /// Fold a finished worker into the state machine without consuming its result.
    fn refresh(&mut self) {
        if self.machine.state() != MoveState::Executing {
            return;
        }
        let finished = self.task.as_ref().and_then(|task| task.completion.peek());
        match finished {
            Some(true) => transition(&mut self.machine, MoveEvent::ExecuteSucceeded),
            Some(false) => transition(&mut self.machine, MoveEvent::ExecuteFailed),
            None => {}
        }
    }
}

fn transition(machine: &mut MoveStateMachine, event: MoveEvent) {
    let from = machine.state();
    match machine.handle_event(event) {
        TransitionResult::Ok(to) if to != from => info!("Move state {from} -> {to}"),
        TransitionResult::Ok(_) => {}
        TransitionResult::Rejected(reason) => debug!("{event:?} ignored in {from}: {reason}"),
    }
}

/// Coordinates one trajectory-capable controller through prepare, execute, wait and reset.
pub struct MoveExecutor {
    controller: Arc<dyn TrajectoryController>,
    pre_positioner: Option<Arc<dyn PrePositioner>>,
    pre_position: bool,
    mapping: AxisOrderMapping,
    compiler: ProfileCompiler,
    execute_timeout: Option<Duration>,
    stop_grace_period: Duration,
    inner: Mutex<Inner>,
}

impl MoveExecutor {
    /// Executor with pre-positioning off, no execute timeout and the default stop grace period.
    pub fn new(handle: ControllerHandle, mapping: AxisOrderMapping, compiler: ProfileCompiler) -> Self {
        let buffer = TrajectoryPointBuffer::new(mapping.axis_count());
        Self {
            controller: handle.controller,
            pre_positioner: handle.pre_positioner,
            pre_position: false,
            mapping,
            compiler,
            execute_timeout: None,
            stop_grace_period: DEFAULT_STOP_GRACE_PERIOD,
            inner: Mutex::new(Inner {
                machine: MoveStateMachine::new(),
                buffer,
                trigger_period_s: None,
                profile: None,
                task: None,
            }),
        }
    }

    /// Executor set up from a validated configuration file.
    ///
    /// # Errors
    /// `ScanError::Configuration` if the axes do not fit on the controller.
    pub fn from_config(
        handle: ControllerHandle,
        config: &TrajectoryScanConfig,
    ) -> Result<Self, ScanError> {
        config.validate()?;
        let scan = &config.scan;
        let mapping = AxisOrderMapping::new(scan.axis_count(), scan.axis_order.clone())?;

        let motors = handle.controller.maximum_number_motors();
        if let Some((axis, motor)) = mapping.iter().find(|&(_, motor)| motor > motors) {
            return Err(ScanError::Configuration(format!(
                "axis {axis} maps to motor {motor} but controller '{}' has {motors} motors",
                handle.controller.name()
            )));
        }

        let compiler = if scan.use_alternate_method {
            ProfileCompiler::constant_velocity(Box::new(TrapezoidPathGenerator::new(
                &config.constant_velocity,
                handle.controller.maximum_number_elements(),
            )))
        } else {
            ProfileCompiler::pointwise()
        };

        let executor = Self::new(handle, mapping, compiler)
            .with_pre_positioning(scan.pre_position)
            .with_execute_timeout(scan.execute_timeout())
            .with_stop_grace_period(scan.stop_grace_period());
        if let Some(period) = scan.trigger_period_s {
            executor.set_trigger_period(period)?;
        }
        Ok(executor)
    }

    /// Move enabled axes to the first point before each build.
    pub fn with_pre_positioning(mut self, enabled: bool) -> Self {
        if enabled && self.pre_positioner.is_none() {
            warn!(
                "Pre-positioning requested but driver '{}' provides no pre-positioner",
                self.controller.name()
            );
        }
        self.pre_position = enabled;
        self
    }

    /// Upper bound for `wait_while_moving`.
    pub fn with_execute_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.execute_timeout = timeout;
        self
    }

    /// Time `stop_and_reset` grants the worker to observe the stop.
    pub fn with_stop_grace_period(mut self, grace: Duration) -> Self {
        self.stop_grace_period = grace;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of logical axes.
    pub fn axis_count(&self) -> usize {
        self.mapping.axis_count()
    }

    /// Axis mapping in use.
    pub fn mapping(&self) -> &AxisOrderMapping {
        &self.mapping
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MoveState {
        let mut inner = self.lock();
        inner.refresh();
        inner.machine.state()
    }

    /// Set the time between trigger pulses.
    ///
    /// # Errors
    /// `ScanError::InvalidTriggerPeriod` unless finite and > 0.
    pub fn set_trigger_period(&self, seconds: f64) -> Result<(), ScanError> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(ScanError::InvalidTriggerPeriod(seconds));
        }
        self.lock().trigger_period_s = Some(seconds);
        debug!("Trigger period set to {seconds} s");
        Ok(())
    }

    /// Trigger period, `None` when unset.
    pub fn trigger_period(&self) -> Option<f64> {
        self.lock().trigger_period_s
    }

    /// Append a point to the buffer.
    pub fn add_point(&self, point: impl Into<Point>) -> Result<(), ScanError> {
        self.lock().buffer.add_point(point.into())
    }

    /// Most recently added point.
    pub fn last_point_added(&self) -> Option<Point> {
        let point = self.lock().buffer.last_point_added().cloned();
        if point.is_none() {
            info!("No point has been added yet");
        }
        point
    }

    /// Number of buffered points.
    pub fn point_count(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Profile pushed by the last successful prepare.
    pub fn compiled_profile(&self) -> Option<CompiledProfile> {
        self.lock().profile.clone()
    }

    /// Compile the buffer, optionally pre-position, push the profile and build.
    ///
    /// Any failure leaves the executor `Idle` with no profile.
    ///
    /// # Errors
    /// - `AlreadyMoving` while an execution is running
    /// - compile errors (see [`ProfileCompiler::compile`])
    /// - `PrePosition`, `OutOfRange`, `HardwareCommunication` from the hardware
    /// - `BuildRejected` if the controller reports a failed build
    pub fn prepare_for_move(&self) -> Result<(), ScanError> {
        let mut inner = self.lock();
        inner.refresh();

        if let Some(task) = inner.task.take_if(|task| task.completion.is_done()) {
            if let Some(Err(e)) = task.completion.take() {
                warn!("Discarding unwaited result of previous move: {e}");
            }
            task.join();
        }
        if inner.task.is_some() {
            return Err(ScanError::AlreadyMoving);
        }

        match self.prepare_locked(&inner) {
            Ok(profile) => {
                info!(
                    "Trajectory prepared: {} elements, {} pulses, {:.3} s, motors {:?}",
                    profile.number_of_elements,
                    profile.number_of_pulses,
                    profile.trajectory_time_s,
                    profile.motor_mask(&self.mapping).motors().collect::<Vec<_>>()
                );
                inner.profile = Some(profile);
                transition(&mut inner.machine, MoveEvent::PrepareSucceeded);
                Ok(())
            }
            Err(e) => {
                warn!("Prepare failed: {e}");
                inner.profile = None;
                transition(&mut inner.machine, MoveEvent::PrepareFailed);
                Err(e)
            }
        }
    }

    fn prepare_locked(&self, inner: &Inner) -> Result<CompiledProfile, ScanError> {
        let profile = self.compiler.compile(&inner.buffer, inner.trigger_period_s)?;

        if self.pre_position {
            self.pre_position_to_first(inner.buffer.first(), &profile)?;
        }

        self.push_profile(&profile)?;

        self.controller.build().during("build")?;
        if let Some(reason) = self.controller.check_build_okay() {
            return Err(ScanError::BuildRejected(reason));
        }
        Ok(profile)
    }

    fn pre_position_to_first(
        &self,
        first: Option<&Point>,
        profile: &CompiledProfile,
    ) -> Result<(), ScanError> {
        let (Some(mover), Some(first)) = (&self.pre_positioner, first) else {
            return Ok(());
        };
        let target: Vec<Option<f64>> = (0..self.axis_count())
            .map(|axis| first.get(axis).filter(|_| profile.is_enabled(axis)))
            .collect();
        info!("Pre-positioning to {target:?}");
        mover.move_to(&target).map_err(ScanError::PrePosition)
    }

    fn push_profile(&self, profile: &CompiledProfile) -> Result<(), ScanError> {
        let controller = self.controller.as_ref();

        for &axis in &profile.enabled_axes {
            let motor = self.mapping.motor_from_index(axis);
            debug!(
                "Axis {axis} -> motor {motor}: {} elements",
                profile.path(axis).len()
            );
            controller
                .set_m_traj(motor, profile.path(axis))
                .during("setMTraj")?;
        }

        controller
            .set_number_of_elements(profile.number_of_elements)
            .during("setNumberOfElements")?;
        controller
            .set_number_of_pulses(profile.number_of_pulses)
            .during("setNumberOfPulses")?;
        controller
            .set_start_pulse_element(profile.start_pulse_element)
            .during("setStartPulseElement")?;
        controller
            .set_stop_pulse_element(profile.stop_pulse_element)
            .during("setStopPulseElement")?;
        controller
            .set_trajectory_time(profile.trajectory_time_s)
            .during("setTrajectoryTime")?;
        controller
            .set_acceleration_time(profile.acceleration_time_s)
            .during("setAccelerationTime")?;

        for (axis, motor) in self.mapping.iter() {
            controller
                .set_m_move(motor, profile.is_enabled(axis))
                .during("setMMove")?;
        }
        Ok(())
    }

    /// Spawn the execution worker and return immediately.
    ///
    /// # Errors
    /// - `AlreadyMoving` if a previous execution has not been waited for or reset
    /// - `NotPrepared` unless the last prepare succeeded
    pub fn start_move(&self) -> Result<(), ScanError> {
        let mut inner = self.lock();
        inner.refresh();

        if inner.task.is_some() {
            return Err(ScanError::AlreadyMoving);
        }
        if inner.machine.state() != MoveState::Prepared {
            return Err(ScanError::NotPrepared);
        }

        let completion = Arc::new(Completion::new());
        let controller = Arc::clone(&self.controller);
        let worker_completion = Arc::clone(&completion);
        let handle = thread::Builder::new()
            .name("traject-execute".to_string())
            .spawn(move || {
                let guard = FinishOnDrop(worker_completion);
                let result = run_execute(controller.as_ref());
                match &result {
                    Ok(()) => info!("Trajectory execution finished"),
                    Err(e) => warn!("Trajectory execution failed: {e}"),
                }
                guard.0.finish(result);
            })
            .map_err(|e| {
                ScanError::from_controller(
                    "execute",
                    ControllerError::Rejected(format!("cannot spawn execute worker: {e}")),
                )
            })?;

        inner.task = Some(MoveTask { handle, completion });
        transition(&mut inner.machine, MoveEvent::Start);
        Ok(())
    }

    /// True while an execution task exists and has not finished.
    pub fn is_moving(&self) -> bool {
        self.lock()
            .task
            .as_ref()
            .is_some_and(|task| !task.completion.is_done())
    }

    /// Block until the running execution finishes and return its result.
    ///
    /// Bounded by the configured execute timeout, if any. Returns `Ok(())`
    /// immediately when nothing is running.
    pub fn wait_while_moving(&self) -> Result<(), ScanError> {
        self.wait_for_completion(self.execute_timeout)
    }

    /// Like [`wait_while_moving`](Self::wait_while_moving) with an explicit bound.
    ///
    /// # Errors
    /// `ExecuteTimeout` if the execution is still running after `timeout`; the
    /// task keeps running and can be waited for again.
    pub fn wait_while_moving_timeout(&self, timeout: Duration) -> Result<(), ScanError> {
        self.wait_for_completion(Some(timeout))
    }

    fn wait_for_completion(&self, timeout: Option<Duration>) -> Result<(), ScanError> {
        let Some(completion) = self
            .lock()
            .task
            .as_ref()
            .map(|task| Arc::clone(&task.completion))
        else {
            return Ok(());
        };

        if !completion.wait(timeout) {
            let seconds = timeout.map_or(0.0, |t| t.as_secs_f64());
            return Err(ScanError::ExecuteTimeout(seconds));
        }

        let mut inner = self.lock();
        inner.refresh();
        if let Some(task) =
            inner.task.take_if(|task| Arc::ptr_eq(&task.completion, &completion))
        {
            task.join();
        }
        drop(inner);

        completion.take().unwrap_or(Ok(()))
    }

    /// Stop the hardware and return to `Idle`.
    ///
    /// Clears the buffer, unsets the trigger period and disables every motor
    /// the controller exposes. Every step runs even if an earlier one failed;
    /// the first failure is returned.
    pub fn stop_and_reset(&self) -> Result<(), ScanError> {
        let mut inner = self.lock();
        inner.refresh();
        transition(&mut inner.machine, MoveEvent::Stop);

        let mut first_error: Option<ScanError> = None;
        let mut record = |result: Result<(), ScanError>| {
            if let Err(e) = result {
                warn!("Reset step failed: {e}");
                first_error.get_or_insert(e);
            }
        };

        record(self.controller.stop().during("stop"));

        inner.buffer.clear();
        inner.trigger_period_s = None;
        inner.profile = None;

        for motor in 1..=self.controller.maximum_number_motors() {
            record(self.controller.set_m_move(motor, false).during("setMMove"));
        }

        if let Some(task) = inner.task.take() {
            let completion = Arc::clone(&task.completion);
            if completion.wait(Some(self.stop_grace_period)) {
                task.join();
                // nobody else is waiting for this result
                if Arc::strong_count(&completion) == 1
                    && let Some(Err(e)) = completion.take()
                {
                    warn!("Stopped execution ended with: {e}");
                }
            } else {
                warn!(
                    "Execute worker still running {:.3} s after stop, detaching",
                    self.stop_grace_period.as_secs_f64()
                );
                completion.finish(Err(ScanError::Interrupted));
            }
        }

        transition(&mut inner.machine, MoveEvent::ResetComplete);
        info!("Trajectory scan reset");

        first_error.map_or(Ok(()), Err)
    }

    /// Read back the positions recorded during the last execution.
    ///
    /// # Errors
    /// - `AlreadyMoving` while executing
    /// - `NotPrepared` if there is no prepared profile
    /// - `ReadRejected` if the controller reports a failed read
    pub fn read_back(&self) -> Result<Readback, ScanError> {
        let inner = self.lock();
        if inner
            .task
            .as_ref()
            .is_some_and(|task| !task.completion.is_done())
        {
            return Err(ScanError::AlreadyMoving);
        }
        let Some(profile) = &inner.profile else {
            return Err(ScanError::NotPrepared);
        };

        let controller = self.controller.as_ref();
        controller.read().during("read")?;
        if let Some(reason) = controller.check_read_okay() {
            return Err(ScanError::ReadRejected(reason));
        }

        let mut axes = Vec::with_capacity(profile.enabled_axes.len());
        for &axis in &profile.enabled_axes {
            let motor = self.mapping.motor_from_index(axis);
            axes.push(AxisReadback {
                axis,
                motor,
                name: controller.m_name(motor).during("getMName")?,
                positions: controller.m_actual(motor).during("getMActual")?,
            });
        }
        let actual_pulses = controller.actual_pulses().during("getActualPulses")?;
        debug!("Read back {} axes, {actual_pulses} pulses", axes.len());

        Ok(Readback {
            axes,
            actual_pulses,
        })
    }
}

fn run_execute(controller: &dyn TrajectoryController) -> Result<(), ScanError> {
    controller.execute().during("execute")?;
    if let Some(reason) = controller.check_execute_okay() {
        return Err(ScanError::ExecuteRejected(reason));
    }
    Ok(())
}
