//! Simulated pre-positioning mover.

use std::sync::{Mutex, PoisonError};
use tracing::debug;
use traject_common::controller::{ControllerError, PrePositioner};

/// Remembers the last commanded position of every logical axis.
#[derive(Debug, Default)]
pub struct SimulatedPrePositioner {
    positions: Mutex<Vec<Option<f64>>>,
}

impl SimulatedPrePositioner {
    /// Mover with no axis positioned yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last commanded position of `axis`, `None` if never moved.
    pub fn position(&self, axis: usize) -> Option<f64> {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(axis)
            .copied()
            .flatten()
    }
}

impl PrePositioner for SimulatedPrePositioner {
    fn move_to(&self, point: &[Option<f64>]) -> Result<(), ControllerError> {
        if let Some(axis) = point.iter().position(|c| c.is_some_and(|v| !v.is_finite())) {
            return Err(ControllerError::Rejected(format!(
                "axis {axis} target is not a finite position"
            )));
        }

        let mut positions = self.positions.lock().unwrap_or_else(PoisonError::into_inner);
        if positions.len() < point.len() {
            positions.resize(point.len(), None);
        }
        for (axis, target) in point.iter().enumerate() {
            if let Some(target) = target {
                debug!("Pre-position axis {axis} -> {target}");
                positions[axis] = Some(*target);
            }
        }
        Ok(())
    }
}
