//! Coordinator error type.

use traject_common::config::ConfigError;
use traject_common::controller::ControllerError;
use thiserror::Error;

/// Errors raised by the trajectory scan coordinator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    /// A point did not have one coordinate per logical axis.
    #[error("point has {actual} coordinates, expected {expected}")]
    DimensionMismatch {
        /// Configured axis count
        expected: usize,
        /// Length of the rejected point
        actual: usize,
    },

    /// A count, time or ramp was outside what the hardware supports.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Constant-velocity compile found no axis that moves.
    #[error("no moving axis between first and last point")]
    NoMovingAxis,

    /// Constant-velocity compile found more than one moving axis.
    #[error("more than one axis moves between first and last point: {axes:?}")]
    AmbiguousMovingAxis {
        /// Logical indices of the moving axes
        axes: Vec<usize>,
    },

    /// A point enables a different set of axes than the rest of the buffer.
    #[error("point {point} disagrees with the enabled-axis pattern on axis {axis}")]
    InconsistentAxisPattern {
        /// Zero-based index of the offending point
        point: usize,
        /// Zero-based logical axis
        axis: usize,
    },

    /// Controller call failed.
    #[error("hardware {operation} failed: {source}")]
    HardwareCommunication {
        /// Operation that was being performed
        operation: &'static str,
        /// Underlying controller error
        source: ControllerError,
    },

    /// A move is already in flight.
    #[error("a trajectory is already moving")]
    AlreadyMoving,

    /// The wait was interrupted before the move finished.
    #[error("interrupted while waiting for the trajectory")]
    Interrupted,

    /// `start_move` without a successful `prepare_for_move`.
    #[error("trajectory has not been prepared")]
    NotPrepared,

    /// More than one point buffered but no trigger period set.
    #[error("trigger period has not been set")]
    TriggerPeriodNotSet,

    /// Trigger period not finite or not positive.
    #[error("invalid trigger period {0} s")]
    InvalidTriggerPeriod(f64),

    /// The controller built the trajectory but reported a failure.
    #[error("trajectory build rejected: {0}")]
    BuildRejected(String),

    /// The controller executed the trajectory but reported a failure.
    #[error("trajectory execution rejected: {0}")]
    ExecuteRejected(String),

    /// The controller read back the trajectory but reported a failure.
    #[error("trajectory read rejected: {0}")]
    ReadRejected(String),

    /// Bounded wait elapsed while the trajectory was still moving.
    #[error("trajectory still moving after {0:.3} s")]
    ExecuteTimeout(f64),

    /// Pre-positioning to the first point failed.
    #[error("pre-position failed: {0}")]
    PrePosition(ControllerError),

    /// Invalid coordinator setup.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ScanError {
    /// Wrap a controller error raised by `operation`.
    ///
    /// Range rejections become [`ScanError::OutOfRange`]; everything else keeps
    /// the operation name and the original error.
    pub fn from_controller(operation: &'static str, err: ControllerError) -> Self {
        match err {
            ControllerError::OutOfRange { .. } => ScanError::OutOfRange(err.to_string()),
            source => ScanError::HardwareCommunication { operation, source },
        }
    }
}

impl From<ConfigError> for ScanError {
    fn from(err: ConfigError) -> Self {
        ScanError::Configuration(err.to_string())
    }
}

/// Extension for tagging controller results with the operation name.
pub(crate) trait ControllerResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T, ScanError>;
}

impl<T> ControllerResultExt<T> for Result<T, ControllerError> {
    fn during(self, operation: &'static str) -> Result<T, ScanError> {
        self.map_err(|e| ScanError::from_controller(operation, e))
    }
}
