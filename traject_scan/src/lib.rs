//! # Traject Scan Library
//!
//! Coordinator for hardware trajectory scans: several motor axes follow a
//! precomputed path while the controller emits trigger pulses at each element.
//! Drivers implement the `TrajectoryController` trait defined in
//! `traject_common::controller`.
//!
//! # Module Structure
//!
//! - [`axis_order`] - Logical axis to hardware motor mapping
//! - [`points`] - Trajectory points and the point buffer
//! - [`profile`] - Pointwise and constant-velocity profile compilation
//! - [`path`] - Constant-velocity ramp generation
//! - [`state`] - Move lifecycle state machine
//! - [`executor`] - `MoveExecutor`: prepare, execute, wait, reset
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Controller driver implementations
//! - [`error`] - `ScanError`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        traject_scan                              │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌─────────────────┐   │
//! │  │ PointBuffer  │──►│ ProfileCompiler  │──►│  MoveExecutor   │   │
//! │  └──────────────┘   └──────────────────┘   └────────┬────────┘   │
//! │                                                     │            │
//! │                                  worker thread      ▼            │
//! │                               ┌────────────────────────────┐     │
//! │                               │ TrajectoryController trait │     │
//! │                               └────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use traject_common::controller::config::ControllerConfig;
//! use traject_scan::{AxisOrderMapping, MoveExecutor, ProfileCompiler};
//! use traject_scan::drivers::simulation;
//!
//! let handle = simulation::create_driver(&ControllerConfig {
//!     time_scale: 0.0,
//!     ..Default::default()
//! });
//! let executor = MoveExecutor::new(
//!     handle,
//!     AxisOrderMapping::identity(2),
//!     ProfileCompiler::pointwise(),
//! );
//!
//! executor.set_trigger_period(0.5).unwrap();
//! executor.add_point(vec![1.0, 2.0]).unwrap();
//! executor.add_point(vec![3.0, 4.0]).unwrap();
//! executor.prepare_for_move().unwrap();
//! executor.start_move().unwrap();
//! executor.wait_while_moving().unwrap();
//! assert!(!executor.is_moving());
//! executor.stop_and_reset().unwrap();
//! ```

#![deny(missing_docs)]

pub mod axis_order;
pub mod driver_registry;
pub mod drivers;
pub mod error;
pub mod executor;
pub mod path;
pub mod points;
pub mod profile;
pub mod state;

// Re-export key types for convenience
pub use crate::axis_order::AxisOrderMapping;
pub use crate::driver_registry::DriverRegistry;
pub use crate::error::ScanError;
pub use crate::executor::{AxisReadback, MoveExecutor, Readback};
pub use crate::path::{ConstantVelocityPathGenerator, TrapezoidPathGenerator};
pub use crate::points::{Point, TrajectoryPointBuffer};
pub use crate::profile::{CompileStrategy, CompiledProfile, ProfileCompiler};
pub use crate::state::MoveState;
