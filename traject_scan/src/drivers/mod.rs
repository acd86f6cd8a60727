//! Trajectory controller driver implementations.
//!
//! - [`simulation`] - In-process controller for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `TrajectoryController` (and optionally `PrePositioner`)
//! 3. Expose a `create_driver(&ControllerConfig) -> ControllerHandle` factory
//! 4. Register it in [`register_all_drivers`]

pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register every built-in driver.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);
}
