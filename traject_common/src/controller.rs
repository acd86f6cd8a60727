//! Trajectory controller contract, status types and scan configuration.
//!
//! This module contains everything a driver needs to plug a
//! trajectory-capable motion controller into the scan coordinator.

pub mod config;
pub mod driver;
pub mod types;

pub use driver::{
    ControllerError, ControllerFactory, ControllerHandle, PrePositioner, TrajectoryController,
};
pub use types::{MotorMask, ProcessPhase, ProcessStatus};
