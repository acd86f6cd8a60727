//! Profile compilation.
//!
//! Turns the buffered points into what the controller needs: one path per
//! enabled axis, the element and pulse counts, the pulse window and the total
//! trajectory time.
//!
//! Two strategies:
//! - **Pointwise** - one path element and one pulse per buffered point.
//! - **Constant velocity** - a single ramp between the first and last
//!   coordinate of the one axis that moves, sampled by a
//!   [`ConstantVelocityPathGenerator`].

use crate::axis_order::AxisOrderMapping;
use crate::error::ScanError;
use crate::path::ConstantVelocityPathGenerator;
use crate::points::{Point, TrajectoryPointBuffer};
use serde::Serialize;
use std::collections::BTreeSet;
use traject_common::controller::MotorMask;

/// Compilation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileStrategy {
    /// One element per buffered point.
    #[default]
    Pointwise,
    /// Single-axis ramp from the first to the last point.
    ConstantVelocity,
}

/// Hardware-ready trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledProfile {
    /// Path per logical axis; empty for axes that are not enabled.
    pub paths: Vec<Vec<f64>>,
    /// Logical axes that take part in the trajectory.
    pub enabled_axes: BTreeSet<usize>,
    /// Path length pushed to the controller.
    pub number_of_elements: u32,
    /// Trigger pulses emitted during the trajectory.
    pub number_of_pulses: u32,
    /// First element that emits a pulse (one-based).
    pub start_pulse_element: u32,
    /// Last element that emits a pulse (one-based, inclusive).
    pub stop_pulse_element: u32,
    /// Total trajectory time in seconds.
    pub trajectory_time_s: f64,
    /// Ramp time at each end, `0.0` for pointwise profiles.
    pub acceleration_time_s: f64,
}

impl CompiledProfile {
    /// Path of logical `axis`, empty if not enabled.
    pub fn path(&self, axis: usize) -> &[f64] {
        self.paths.get(axis).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether logical `axis` takes part.
    pub fn is_enabled(&self, axis: usize) -> bool {
        self.enabled_axes.contains(&axis)
    }

    /// Enabled axes as a hardware move-enable mask.
    pub fn motor_mask(&self, mapping: &AxisOrderMapping) -> MotorMask {
        self.enabled_axes
            .iter()
            .filter_map(|&axis| MotorMask::for_motor(mapping.motor_from_index(axis)))
            .fold(MotorMask::empty(), |mask, bit| mask | bit)
    }
}

/// Compiles a point buffer with one of the two strategies.
pub struct ProfileCompiler {
    strategy: CompileStrategy,
    path_generator: Option<Box<dyn ConstantVelocityPathGenerator>>,
}

impl ProfileCompiler {
    /// Pointwise compiler.
    pub fn pointwise() -> Self {
        Self {
            strategy: CompileStrategy::Pointwise,
            path_generator: None,
        }
    }

    /// Constant-velocity compiler sampling ramps from `generator`.
    pub fn constant_velocity(generator: Box<dyn ConstantVelocityPathGenerator>) -> Self {
        Self {
            strategy: CompileStrategy::ConstantVelocity,
            path_generator: Some(generator),
        }
    }

    /// Strategy in use.
    pub fn strategy(&self) -> CompileStrategy {
        self.strategy
    }

    /// Compile `buffer` with trigger period `trigger_period_s`.
    ///
    /// # Errors
    /// - `TriggerPeriodNotSet` when more than one point is buffered without a period
    /// - `InconsistentAxisPattern` (pointwise) when points enable different axes
    /// - `NoMovingAxis` / `AmbiguousMovingAxis` (constant velocity)
    /// - `OutOfRange` from the path generator
    pub fn compile(
        &self,
        buffer: &TrajectoryPointBuffer,
        trigger_period_s: Option<f64>,
    ) -> Result<CompiledProfile, ScanError> {
        match (&self.strategy, &self.path_generator) {
            (CompileStrategy::ConstantVelocity, Some(generator)) => {
                compile_constant_velocity(buffer, trigger_period_s, generator.as_ref())
            }
            (CompileStrategy::ConstantVelocity, None) => Err(ScanError::Configuration(
                "constant-velocity strategy without a path generator".to_string(),
            )),
            (CompileStrategy::Pointwise, _) => compile_pointwise(buffer, trigger_period_s),
        }
    }
}

fn require_period(trigger_period_s: Option<f64>) -> Result<f64, ScanError> {
    trigger_period_s.ok_or(ScanError::TriggerPeriodNotSet)
}

fn compile_pointwise(
    buffer: &TrajectoryPointBuffer,
    trigger_period_s: Option<f64>,
) -> Result<CompiledProfile, ScanError> {
    let axis_count = buffer.axis_count();
    let points = buffer.points();
    let count = points.len();

    let representative = buffer
        .last_point_added()
        .cloned()
        .unwrap_or_else(|| Point::empty(axis_count));
    let enabled_axes: BTreeSet<usize> = representative.present_axes().collect();

    for (index, point) in points.iter().enumerate() {
        for axis in 0..axis_count {
            if point[axis].is_some() != enabled_axes.contains(&axis) {
                return Err(ScanError::InconsistentAxisPattern { point: index, axis });
            }
        }
    }

    let paths = (0..axis_count)
        .map(|axis| {
            if enabled_axes.contains(&axis) {
                points.iter().filter_map(|p| p[axis]).collect()
            } else {
                Vec::new()
            }
        })
        .collect();

    let trajectory_time_s = if count > 1 {
        require_period(trigger_period_s)? * (count - 1) as f64
    } else {
        0.0
    };

    let count = count as u32;
    Ok(CompiledProfile {
        paths,
        enabled_axes,
        number_of_elements: count,
        number_of_pulses: count,
        start_pulse_element: 1,
        stop_pulse_element: count,
        trajectory_time_s,
        acceleration_time_s: 0.0,
    })
}

fn compile_constant_velocity(
    buffer: &TrajectoryPointBuffer,
    trigger_period_s: Option<f64>,
    generator: &dyn ConstantVelocityPathGenerator,
) -> Result<CompiledProfile, ScanError> {
    let (Some(first), Some(last)) = (buffer.first(), buffer.last_point_added()) else {
        return Err(ScanError::NoMovingAxis);
    };
    if buffer.len() < 2 {
        return Err(ScanError::NoMovingAxis);
    }

    let moving: Vec<usize> = first
        .present_axes()
        .filter(|&axis| matches!(last[axis], Some(end) if first[axis] != Some(end)))
        .collect();
    let axis = match moving.as_slice() {
        [] => return Err(ScanError::NoMovingAxis),
        [axis] => *axis,
        _ => return Err(ScanError::AmbiguousMovingAxis { axes: moving }),
    };

    let duration = require_period(trigger_period_s)? * (buffer.len() - 1) as f64;
    let (start, stop) = (first.get(axis), last.get(axis));
    let (Some(start), Some(stop)) = (start, stop) else {
        return Err(ScanError::NoMovingAxis);
    };
    let ramp = generator.define_constant_velocity_path(start, stop, duration)?;
    let acceleration_time_s = generator.acceleration_time(start, stop, duration)?;
    let elements = ramp.len() as u32;

    let mut paths = vec![Vec::new(); buffer.axis_count()];
    paths[axis] = ramp;

    Ok(CompiledProfile {
        paths,
        enabled_axes: BTreeSet::from([axis]),
        number_of_elements: elements,
        number_of_pulses: elements,
        start_pulse_element: 1,
        stop_pulse_element: elements,
        trajectory_time_s: duration,
        acceleration_time_s,
    })
}
