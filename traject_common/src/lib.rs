//! Traject Common Library
//!
//! Shared constants, configuration loading and the hardware controller contract
//! used by the trajectory scan coordinator and its drivers.
//!
//! # Module Structure
//!
//! - [`consts`] - Controller limits (motors, elements, pulses)
//! - [`config`] - Configuration loading traits and types
//! - [`controller`] - `TrajectoryController` trait, errors, status types and scan configuration
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use traject_common::prelude::*;
//!
//! assert_eq!(MAX_MOTORS, 8);
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod consts;
pub mod controller;
pub mod prelude;
