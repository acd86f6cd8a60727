//! Controller status types.
//!
//! - `ProcessStatus` - Outcome of a build, execute or read
//! - `ProcessPhase` - Which of the three the status belongs to
//! - `MotorMask` - One move-enable bit per hardware motor

use crate::consts::MAX_MOTORS;
use bitflags::bitflags;
use std::fmt;

/// Outcome reported by the controller for the last build, execute or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessStatus {
    /// Not run yet, or reset since.
    #[default]
    Undefined,
    /// Completed successfully.
    Success,
    /// Completed with an error or was aborted.
    Failure,
}

/// The three controller processes that report a status and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessPhase {
    /// Trajectory build and check.
    Build,
    /// Trajectory motion.
    Execute,
    /// Read back of actual positions.
    Read,
}

impl fmt::Display for ProcessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessPhase::Build => "build",
            ProcessPhase::Execute => "execute",
            ProcessPhase::Read => "read",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Move-enable mask, bit `n - 1` set when motor `n` takes part in the trajectory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MotorMask: u8 {
        /// Motor 1
        const M1 = 1 << 0;
        /// Motor 2
        const M2 = 1 << 1;
        /// Motor 3
        const M3 = 1 << 2;
        /// Motor 4
        const M4 = 1 << 3;
        /// Motor 5
        const M5 = 1 << 4;
        /// Motor 6
        const M6 = 1 << 5;
        /// Motor 7
        const M7 = 1 << 6;
        /// Motor 8
        const M8 = 1 << 7;
    }
}

impl MotorMask {
    /// Mask holding the single one-based `motor`, or `None` if out of range.
    pub fn for_motor(motor: u32) -> Option<Self> {
        if motor == 0 || motor as usize > MAX_MOTORS {
            return None;
        }
        Self::from_bits(1u8 << (motor - 1))
    }

    /// One-based motor numbers present in the mask, ascending.
    pub fn motors(self) -> impl Iterator<Item = u32> {
        (1..=MAX_MOTORS as u32).filter(move |&m| {
            Self::for_motor(m).is_some_and(|bit| self.contains(bit))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_mask_for_motor() {
        assert_eq!(MotorMask::for_motor(1), Some(MotorMask::M1));
        assert_eq!(MotorMask::for_motor(8), Some(MotorMask::M8));
        assert_eq!(MotorMask::for_motor(0), None);
        assert_eq!(MotorMask::for_motor(9), None);
    }

    #[test]
    fn test_motor_mask_lists_motors_ascending() {
        let mask = MotorMask::M3 | MotorMask::M1 | MotorMask::M8;
        assert_eq!(mask.motors().collect::<Vec<_>>(), vec![1, 3, 8]);
        assert_eq!(MotorMask::empty().motors().count(), 0);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ProcessPhase::Build.to_string(), "build");
        assert_eq!(ProcessPhase::Execute.to_string(), "execute");
        assert_eq!(ProcessPhase::Read.to_string(), "read");
    }
}
