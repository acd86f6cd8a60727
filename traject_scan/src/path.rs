//! Constant-velocity path generation.
//!
//! The constant-velocity strategy needs one smooth ramp between the first and
//! last coordinate of the moving axis. `TrapezoidPathGenerator` produces a
//! symmetric trapezoid (accelerate, cruise, decelerate) that lasts exactly the
//! requested duration, sampled at a fixed period.

use crate::error::ScanError;
use traject_common::controller::config::ConstantVelocityConfig;

/// Source of constant-velocity ramps for a single axis.
pub trait ConstantVelocityPathGenerator: Send + Sync {
    /// Sampled positions from `start` to `stop` lasting `duration_s`.
    ///
    /// # Errors
    /// `ScanError::OutOfRange` if the move cannot be done within the generator's limits.
    fn define_constant_velocity_path(
        &self,
        start: f64,
        stop: f64,
        duration_s: f64,
    ) -> Result<Vec<f64>, ScanError>;

    /// Ramp time at each end of the same move; `0.0` for generators without ramps.
    fn acceleration_time(
        &self,
        _start: f64,
        _stop: f64,
        _duration_s: f64,
    ) -> Result<f64, ScanError> {
        Ok(0.0)
    }
}

/// Symmetric trapezoidal ramp generator.
#[derive(Debug, Clone)]
pub struct TrapezoidPathGenerator {
    max_velocity: f64,
    acceleration: f64,
    sample_period_s: f64,
    max_elements: u32,
}

/// Phase boundaries of one trapezoid.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Trapezoid {
    distance: f64,
    duration: f64,
    cruise_velocity: f64,
    accel_time: f64,
    acceleration: f64,
}

impl Trapezoid {
    /// Distance covered after `t` seconds.
    fn travelled(&self, t: f64) -> f64 {
        let a = self.acceleration;
        let ta = self.accel_time;
        if t <= 0.0 {
            0.0
        } else if t < ta {
            0.5 * a * t * t
        } else if t <= self.duration - ta {
            0.5 * a * ta * ta + self.cruise_velocity * (t - ta)
        } else if t < self.duration {
            let remaining = self.duration - t;
            self.distance - 0.5 * a * remaining * remaining
        } else {
            self.distance
        }
    }
}

impl TrapezoidPathGenerator {
    /// Generator bounded by `config` and a controller path length of `max_elements`.
    pub fn new(config: &ConstantVelocityConfig, max_elements: u32) -> Self {
        Self {
            max_velocity: config.max_velocity,
            acceleration: config.acceleration,
            sample_period_s: config.sample_period_s,
            max_elements,
        }
    }

    /// Cruise velocity for covering `distance` in `duration` with symmetric ramps.
    ///
    /// `v = (a*T - sqrt(a^2*T^2 - 4*a*d)) / 2`
    fn plan(&self, distance: f64, duration: f64) -> Result<Trapezoid, ScanError> {
        let a = self.acceleration;
        let discriminant = a * a * duration * duration - 4.0 * a * distance;
        if discriminant < 0.0 {
            return Err(ScanError::OutOfRange(format!(
                "distance {distance} cannot be covered in {duration} s at acceleration {a}"
            )));
        }

        let cruise_velocity = (a * duration - discriminant.sqrt()) / 2.0;
        if cruise_velocity > self.max_velocity {
            return Err(ScanError::OutOfRange(format!(
                "cruise velocity {cruise_velocity:.6} exceeds maximum {}",
                self.max_velocity
            )));
        }

        Ok(Trapezoid {
            distance,
            duration,
            cruise_velocity,
            accel_time: cruise_velocity / a,
            acceleration: a,
        })
    }

    /// Number of samples strictly before `duration`; the end point is added separately.
    ///
    /// Kept as `f64` so a huge duration is compared against the limit before any cast.
    fn interior_samples(&self, duration: f64) -> f64 {
        ((duration / self.sample_period_s) - 1e-9).ceil().max(0.0)
    }
}

impl ConstantVelocityPathGenerator for TrapezoidPathGenerator {
    fn define_constant_velocity_path(
        &self,
        start: f64,
        stop: f64,
        duration_s: f64,
    ) -> Result<Vec<f64>, ScanError> {
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(ScanError::OutOfRange(format!(
                "trajectory duration must be > 0, got {duration_s}"
            )));
        }

        let samples = self.interior_samples(duration_s) + 1.0;
        if samples > f64::from(self.max_elements) {
            return Err(ScanError::OutOfRange(format!(
                "{samples} path elements exceed maximum {}",
                self.max_elements
            )));
        }
        let elements = samples as usize;

        let distance = (stop - start).abs();
        let direction = if stop >= start { 1.0 } else { -1.0 };
        let trapezoid = self.plan(distance, duration_s)?;

        let mut path: Vec<f64> = (0..elements - 1)
            .map(|k| start + direction * trapezoid.travelled(k as f64 * self.sample_period_s))
            .collect();
        path.push(stop);
        Ok(path)
    }

    fn acceleration_time(
        &self,
        start: f64,
        stop: f64,
        duration_s: f64,
    ) -> Result<f64, ScanError> {
        Ok(self.plan((stop - start).abs(), duration_s)?.accel_time)
    }
}
