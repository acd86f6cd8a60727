//! Controller limits for trajectory scans.
//!
//! Single source of truth for the numeric limits of a trajectory-capable
//! motion controller. Drivers may report tighter limits at runtime.

use static_assertions::const_assert;

/// Maximum number of motors that can take part in one trajectory.
pub const MAX_MOTORS: usize = 8;

/// Maximum number of elements (samples) in a per-motor trajectory path.
pub const MAX_ELEMENTS: u32 = 1500;

/// Maximum number of trigger pulses emitted during one trajectory.
pub const MAX_PULSES: u32 = 60_000;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/traject/scan.toml";

// The move-enable mask packs one bit per motor into a u8.
const_assert!(MAX_MOTORS <= 8);
const_assert!(MAX_ELEMENTS <= MAX_PULSES);
