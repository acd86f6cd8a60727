//! Prelude module for common re-exports.
//!
//! ```rust
//! use traject_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::controller::config::{
    ConstantVelocityConfig, ControllerConfig, ScanConfig, TrajectoryScanConfig,
};

// ─── Limits ─────────────────────────────────────────────────────────
pub use crate::consts::{MAX_ELEMENTS, MAX_MOTORS, MAX_PULSES};

// ─── Controller contract ────────────────────────────────────────────
pub use crate::controller::{
    ControllerError, ControllerHandle, MotorMask, PrePositioner, ProcessStatus,
    TrajectoryController,
};

/// Default grace period granted to an executing trajectory after a stop request.
pub const DEFAULT_STOP_GRACE_PERIOD: Duration = Duration::from_secs(2);
