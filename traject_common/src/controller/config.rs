//! Trajectory scan configuration types.
//!
//! - `TrajectoryScanConfig` - Whole configuration file (`scan.toml`)
//! - `ControllerConfig` - Which driver to load and its limits
//! - `ScanConfig` - Logical axes, strategy and timing of the coordinator
//! - `ConstantVelocityConfig` - Limits of the constant-velocity ramp generator

use crate::config::{ConfigError, ConfigLoader, SharedConfig};
use crate::consts::{MAX_ELEMENTS, MAX_MOTORS, MAX_PULSES};
use crate::prelude::DEFAULT_STOP_GRACE_PERIOD;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

fn default_driver() -> String {
    "simulation".to_string()
}

fn default_max_motors() -> u32 {
    MAX_MOTORS as u32
}

fn default_max_elements() -> u32 {
    MAX_ELEMENTS
}

fn default_max_pulses() -> u32 {
    MAX_PULSES
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_stop_grace_period_s() -> f64 {
    DEFAULT_STOP_GRACE_PERIOD.as_secs_f64()
}

fn default_sample_period_s() -> f64 {
    0.05
}

/// Controller section (`[controller]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Driver name looked up in the driver registry.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Motors exposed by the controller.
    #[serde(default = "default_max_motors")]
    pub max_motors: u32,

    /// Largest path length per motor.
    #[serde(default = "default_max_elements")]
    pub max_elements: u32,

    /// Largest pulse count per trajectory.
    #[serde(default = "default_max_pulses")]
    pub max_pulses: u32,

    /// Simulated drivers sleep `trajectory_time * time_scale` during execute.
    /// `0.0` makes execution instantaneous.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Hardware motor names, index 0 is motor 1. Missing entries fall back to `m<n>`.
    #[serde(default)]
    pub motor_names: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            max_motors: default_max_motors(),
            max_elements: default_max_elements(),
            max_pulses: default_max_pulses(),
            time_scale: default_time_scale(),
            motor_names: Vec::new(),
        }
    }
}

impl ControllerConfig {
    /// Validate the controller section.
    ///
    /// # Validation Rules
    /// 1. `driver` not empty
    /// 2. `1 <= max_motors <= MAX_MOTORS`
    /// 3. `1 <= max_elements <= MAX_ELEMENTS`, `1 <= max_pulses <= MAX_PULSES`
    /// 4. `time_scale` finite and >= 0
    /// 5. `motor_names.len() <= max_motors`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "controller.driver cannot be empty".to_string(),
            ));
        }

        if self.max_motors == 0 || self.max_motors as usize > MAX_MOTORS {
            return Err(ConfigError::ValidationError(format!(
                "controller.max_motors must be in 1..={MAX_MOTORS}, got {}",
                self.max_motors
            )));
        }

        if self.max_elements == 0 || self.max_elements > MAX_ELEMENTS {
            return Err(ConfigError::ValidationError(format!(
                "controller.max_elements must be in 1..={MAX_ELEMENTS}, got {}",
                self.max_elements
            )));
        }

        if self.max_pulses == 0 || self.max_pulses > MAX_PULSES {
            return Err(ConfigError::ValidationError(format!(
                "controller.max_pulses must be in 1..={MAX_PULSES}, got {}",
                self.max_pulses
            )));
        }

        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "controller.time_scale must be >= 0, got {}",
                self.time_scale
            )));
        }

        if self.motor_names.len() > self.max_motors as usize {
            return Err(ConfigError::ValidationError(format!(
                "Too many motor names: {} (max {})",
                self.motor_names.len(),
                self.max_motors
            )));
        }

        Ok(())
    }

    /// Name of one-based `motor`, falling back to `m<motor>`.
    pub fn motor_name(&self, motor: u32) -> String {
        motor
            .checked_sub(1)
            .and_then(|i| self.motor_names.get(i as usize))
            .cloned()
            .unwrap_or_else(|| format!("m{motor}"))
    }
}

/// Coordinator section (`[scan]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Logical axis names; their count is the point dimension.
    pub axis_names: Vec<String>,

    /// Hardware motor (one-based) per logical axis. Identity when omitted.
    #[serde(default)]
    pub axis_order: Option<Vec<u32>>,

    /// Compile with the constant-velocity strategy instead of pointwise.
    #[serde(default)]
    pub use_alternate_method: bool,

    /// Trigger period applied at startup, in seconds.
    #[serde(default)]
    pub trigger_period_s: Option<f64>,

    /// Upper bound for `wait_while_moving`, in seconds. Unbounded when omitted.
    #[serde(default)]
    pub execute_timeout_s: Option<f64>,

    /// Time granted to a running execution to observe a stop.
    #[serde(default = "default_stop_grace_period_s")]
    pub stop_grace_period_s: f64,

    /// Move enabled axes to the first point before building.
    #[serde(default)]
    pub pre_position: bool,
}

impl ScanConfig {
    /// Scan section for `axis_names` with every other field at its default.
    pub fn with_axes<I, S>(axis_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            axis_names: axis_names.into_iter().map(Into::into).collect(),
            axis_order: None,
            use_alternate_method: false,
            trigger_period_s: None,
            execute_timeout_s: None,
            stop_grace_period_s: default_stop_grace_period_s(),
            pre_position: false,
        }
    }

    /// Number of logical axes.
    pub fn axis_count(&self) -> usize {
        self.axis_names.len()
    }

    /// `execute_timeout_s` as a `Duration`, `None` when unset or not representable.
    pub fn execute_timeout(&self) -> Option<Duration> {
        self.execute_timeout_s
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }

    /// `stop_grace_period_s` as a `Duration`, the default when not representable.
    pub fn stop_grace_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.stop_grace_period_s).unwrap_or(DEFAULT_STOP_GRACE_PERIOD)
    }

    /// Validate the scan section on its own.
    ///
    /// # Validation Rules
    /// 1. At least one axis, at most `MAX_MOTORS`, names unique and not empty
    /// 2. `axis_order` (if set) same length as `axis_names`, entries unique and >= 1
    /// 3. `trigger_period_s` (if set) > 0
    /// 4. `execute_timeout_s` (if set) > 0 and representable as a `Duration`
    /// 5. `stop_grace_period_s` >= 0 and representable as a `Duration`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.axis_names.is_empty() {
            return Err(ConfigError::ValidationError(
                "scan.axis_names cannot be empty".to_string(),
            ));
        }

        if self.axis_names.len() > MAX_MOTORS {
            return Err(ConfigError::ValidationError(format!(
                "Too many axes: {} (max {})",
                self.axis_names.len(),
                MAX_MOTORS
            )));
        }

        let mut names = HashSet::new();
        for name in &self.axis_names {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "scan.axis_names entries cannot be empty".to_string(),
                ));
            }
            if !names.insert(name) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate axis name: {name}"
                )));
            }
        }

        if let Some(order) = &self.axis_order {
            if order.len() != self.axis_names.len() {
                return Err(ConfigError::ValidationError(format!(
                    "scan.axis_order has {} entries but there are {} axes",
                    order.len(),
                    self.axis_names.len()
                )));
            }
            let mut motors = HashSet::new();
            for &motor in order {
                if motor == 0 {
                    return Err(ConfigError::ValidationError(
                        "scan.axis_order motors are one-based".to_string(),
                    ));
                }
                if !motors.insert(motor) {
                    return Err(ConfigError::ValidationError(format!(
                        "Motor {motor} appears twice in scan.axis_order"
                    )));
                }
            }
        }

        if let Some(period) = self.trigger_period_s
            && !(period.is_finite() && period > 0.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "scan.trigger_period_s must be > 0, got {period}"
            )));
        }

        if let Some(timeout) = self.execute_timeout_s
            && (timeout <= 0.0 || Duration::try_from_secs_f64(timeout).is_err())
        {
            return Err(ConfigError::ValidationError(format!(
                "scan.execute_timeout_s must be a positive duration, got {timeout}"
            )));
        }

        if Duration::try_from_secs_f64(self.stop_grace_period_s).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "scan.stop_grace_period_s must be a duration >= 0, got {}",
                self.stop_grace_period_s
            )));
        }

        Ok(())
    }
}

/// Constant-velocity ramp section (`[constant_velocity]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantVelocityConfig {
    /// Cruise velocity limit in axis units per second.
    pub max_velocity: f64,

    /// Acceleration and deceleration in axis units per second squared.
    pub acceleration: f64,

    /// Time between path samples in seconds.
    #[serde(default = "default_sample_period_s")]
    pub sample_period_s: f64,
}

impl Default for ConstantVelocityConfig {
    fn default() -> Self {
        Self {
            max_velocity: 10.0,
            acceleration: 100.0,
            sample_period_s: default_sample_period_s(),
        }
    }
}

impl ConstantVelocityConfig {
    /// Validate: every field finite and > 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_velocity", self.max_velocity),
            ("acceleration", self.acceleration),
            ("sample_period_s", self.sample_period_s),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "constant_velocity.{field} must be > 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Whole trajectory scan configuration file.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "traject-scan-sim"
///
/// [controller]
/// driver = "simulation"
///
/// [scan]
/// axis_names = ["x", "y"]
/// trigger_period_s = 0.5
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryScanConfig {
    /// Logging and identity.
    pub shared: SharedConfig,

    /// Controller driver and limits.
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Coordinator settings.
    pub scan: ScanConfig,

    /// Constant-velocity ramp limits.
    #[serde(default)]
    pub constant_velocity: ConstantVelocityConfig,
}

impl TrajectoryScanConfig {
    /// Load from `path` and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section, then the constraints between them.
    ///
    /// Logical axes and `axis_order` entries must fit on the controller's motors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.controller.validate()?;
        self.scan.validate()?;
        self.constant_velocity.validate()?;

        if self.scan.axis_count() > self.controller.max_motors as usize {
            return Err(ConfigError::ValidationError(format!(
                "{} axes configured but the controller has {} motors",
                self.scan.axis_count(),
                self.controller.max_motors
            )));
        }

        if let Some(order) = &self.scan.axis_order
            && let Some(&motor) = order.iter().find(|&&m| m > self.controller.max_motors)
        {
            return Err(ConfigError::ValidationError(format!(
                "scan.axis_order references motor {motor} but the controller has {} motors",
                self.controller.max_motors
            )));
        }

        if self.scan.use_alternate_method && self.scan.trigger_period_s.is_none() {
            warn!("Constant-velocity strategy selected without a default trigger period");
        }

        Ok(())
    }
}
