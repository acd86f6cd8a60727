//! Simulation driver module.
//!
//! In-process trajectory controller for development and testing without
//! physical hardware. Execution sleeps for the trajectory time (scaled by
//! `controller.time_scale`) and records the commanded positions as the actual
//! positions.

mod controller;
mod positioner;

pub use controller::SimulatedTrajectoryController;
pub use positioner::SimulatedPrePositioner;

use std::sync::Arc;
use traject_common::controller::ControllerHandle;
use traject_common::controller::config::ControllerConfig;

/// Factory function to create a simulation driver instance.
pub fn create_driver(config: &ControllerConfig) -> ControllerHandle {
    ControllerHandle {
        controller: Arc::new(SimulatedTrajectoryController::new(config.clone())),
        pre_positioner: Some(Arc::new(SimulatedPrePositioner::new())),
    }
}
