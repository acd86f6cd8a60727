//! Trajectory controller trait and error types.
//!
//! This module defines:
//! - `TrajectoryController` trait - Interface to a trajectory-capable motion controller
//! - `PrePositioner` trait - Moves axes to the start point before a build
//! - `ControllerError` enum - Error types for controller operations
//! - `ControllerFactory` / `ControllerHandle` - Driver construction

use crate::controller::config::ControllerConfig;
use std::sync::Arc;
use thiserror::Error;

/// Error types for controller operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    /// Transport or protocol failure while talking to the controller.
    #[error("{operation} failed: {reason}")]
    Communication {
        /// Controller operation that failed (e.g. "build")
        operation: &'static str,
        /// Transport-level reason
        reason: String,
    },

    /// A count or time was outside the range the controller supports.
    #[error("{what} {value} is out of range (max {max})")]
    OutOfRange {
        /// Quantity that was rejected
        what: &'static str,
        /// Rejected value
        value: f64,
        /// Largest accepted value
        max: f64,
    },

    /// Motor number outside `1..=max`.
    #[error("motor {motor} does not exist (controller has {max} motors)")]
    InvalidMotor {
        /// Requested one-based motor number
        motor: u32,
        /// Number of motors on the controller
        max: u32,
    },

    /// The controller refused the request in its current state.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Execute or read requested without a successful build.
    #[error("trajectory has not been built")]
    NotBuilt,

    /// Another build, execute or read is still in progress.
    #[error("controller busy: {0}")]
    Busy(String),
}

impl ControllerError {
    /// Shorthand for a [`ControllerError::Communication`] error.
    pub fn communication(operation: &'static str, reason: impl Into<String>) -> Self {
        ControllerError::Communication {
            operation,
            reason: reason.into(),
        }
    }
}

/// Reject motor numbers outside `1..=max`.
pub fn check_motor(motor: u32, max: u32) -> Result<(), ControllerError> {
    if motor == 0 || motor > max {
        return Err(ControllerError::InvalidMotor { motor, max });
    }
    Ok(())
}

/// Reject counts of zero or above `max`.
pub fn check_count(what: &'static str, value: u32, max: u32) -> Result<(), ControllerError> {
    if value == 0 || value > max {
        return Err(ControllerError::OutOfRange {
            what,
            value: value as f64,
            max: max as f64,
        });
    }
    Ok(())
}

/// Trait defining the interface to a trajectory-capable motion controller.
///
/// The coordinator pushes a compiled profile through the setters, calls
/// `build()`, then `execute()` from a worker thread while other threads may
/// still call `stop()` or `is_busy()`. Implementations therefore take `&self`
/// and synchronise internally.
///
/// Motors are addressed by one-based number (`1..=maximum_number_motors()`).
///
/// # Lifecycle
///
/// 1. Setters (`set_m_traj`, `set_m_move`, counts, time)
/// 2. `build()` then `check_build_okay()`
/// 3. `execute()` (blocks for the duration of the motion) then `check_execute_okay()`
/// 4. `read()` then `check_read_okay()`, `m_actual()` per motor
///
/// `stop()` may be called at any point and must make a running `execute()` return.
pub trait TrajectoryController: Send + Sync {
    /// Returns the driver's identifier (e.g., "simulation", "epics").
    fn name(&self) -> &str;

    /// Number of motors the controller exposes.
    fn maximum_number_motors(&self) -> u32;

    /// Largest number of elements per motor path.
    fn maximum_number_elements(&self) -> u32;

    /// Largest number of output pulses per trajectory.
    fn maximum_number_pulses(&self) -> u32;

    /// Push the full path array for one motor.
    fn set_m_traj(&self, motor: u32, path: &[f64]) -> Result<(), ControllerError>;

    /// Read back the path array for one motor.
    fn m_traj(&self, motor: u32) -> Result<Vec<f64>, ControllerError>;

    /// Enable or disable a motor for the next trajectory.
    fn set_m_move(&self, motor: u32, enabled: bool) -> Result<(), ControllerError>;

    /// Whether a motor is enabled for the next trajectory.
    fn is_m_move(&self, motor: u32) -> Result<bool, ControllerError>;

    /// Set the number of path elements used by every enabled motor.
    ///
    /// # Errors
    /// `ControllerError::OutOfRange` for `0` or values above `maximum_number_elements()`.
    fn set_number_of_elements(&self, elements: u32) -> Result<(), ControllerError>;

    /// Number of path elements currently configured.
    fn number_of_elements(&self) -> Result<u32, ControllerError>;

    /// Set the number of trigger pulses emitted during the trajectory.
    ///
    /// # Errors
    /// `ControllerError::OutOfRange` for `0` or values above `maximum_number_pulses()`.
    fn set_number_of_pulses(&self, pulses: u32) -> Result<(), ControllerError>;

    /// Number of trigger pulses currently configured.
    fn number_of_pulses(&self) -> Result<u32, ControllerError>;

    /// Element at which pulse output starts (one-based).
    fn set_start_pulse_element(&self, element: u32) -> Result<(), ControllerError>;

    /// Element at which pulse output starts.
    fn start_pulse_element(&self) -> Result<u32, ControllerError>;

    /// Element at which pulse output stops (one-based, inclusive).
    fn set_stop_pulse_element(&self, element: u32) -> Result<(), ControllerError>;

    /// Element at which pulse output stops.
    fn stop_pulse_element(&self) -> Result<u32, ControllerError>;

    /// Total time of the trajectory in seconds.
    fn set_trajectory_time(&self, seconds: f64) -> Result<(), ControllerError>;

    /// Total time of the trajectory in seconds.
    fn trajectory_time(&self) -> Result<f64, ControllerError>;

    /// Time spent ramping up to, and down from, cruise velocity, in seconds.
    fn set_acceleration_time(&self, seconds: f64) -> Result<(), ControllerError>;

    /// Time spent ramping up to, and down from, cruise velocity, in seconds.
    fn acceleration_time(&self) -> Result<f64, ControllerError>;

    /// Build and check the trajectory from the pushed profile.
    fn build(&self) -> Result<(), ControllerError>;

    /// `None` if the last build succeeded, otherwise a human-readable reason.
    fn check_build_okay(&self) -> Option<String>;

    /// Run the built trajectory. Blocks until the motion has finished or was stopped.
    fn execute(&self) -> Result<(), ControllerError>;

    /// `None` if the last execution succeeded, otherwise a human-readable reason.
    fn check_execute_okay(&self) -> Option<String>;

    /// Read back the actual positions recorded during the last execution.
    fn read(&self) -> Result<(), ControllerError>;

    /// `None` if the last read succeeded, otherwise a human-readable reason.
    fn check_read_okay(&self) -> Option<String>;

    /// Actual positions of one motor at each pulse of the last execution.
    fn m_actual(&self, motor: u32) -> Result<Vec<f64>, ControllerError>;

    /// Hardware name of one motor.
    fn m_name(&self, motor: u32) -> Result<String, ControllerError>;

    /// Number of pulses actually emitted during the last execution.
    fn actual_pulses(&self) -> Result<u32, ControllerError>;

    /// Abort any motion in progress.
    fn stop(&self) -> Result<(), ControllerError>;

    /// True while a build, execute or read is in progress.
    fn is_busy(&self) -> bool;
}

/// Moves the participating axes to the first point of a trajectory.
///
/// Called once per prepare cycle, before the controller builds. The call
/// blocks until the axes are at the requested coordinates; `None` entries
/// are left where they are.
pub trait PrePositioner: Send + Sync {
    /// Move to `point` (indexed by logical axis).
    fn move_to(&self, point: &[Option<f64>]) -> Result<(), ControllerError>;
}

/// A constructed driver: the controller plus its optional pre-positioner.
#[derive(Clone)]
pub struct ControllerHandle {
    /// Trajectory controller shared between the coordinator and its worker.
    pub controller: Arc<dyn TrajectoryController>,
    /// Pre-positioning collaborator, if the driver provides one.
    pub pre_positioner: Option<Arc<dyn PrePositioner>>,
}

/// Factory function type for creating driver instances.
pub type ControllerFactory = fn(&ControllerConfig) -> ControllerHandle;
