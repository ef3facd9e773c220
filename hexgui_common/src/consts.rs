//! System-wide constants for the hexgui workspace.
//!
//! Single source of truth for hexapod geometry, motion limits and
//! connection defaults. Imported by all crates; no duplication permitted.

use static_assertions::const_assert_eq;

/// Number of struts (actuators).
pub const NUM_STRUT: usize = 6;

/// Number of drives. Each drive powers two struts.
pub const NUM_DRIVE: usize = 3;

/// Degrees of freedom of the hexapod pose (x, y, z, rx, ry, rz).
pub const NUM_DEGREE_OF_FREEDOM: usize = 6;

const_assert_eq!(NUM_STRUT, 2 * NUM_DRIVE);

/// Linear range of one actuator [µm].
pub const MAX_ACTUATOR_RANGE_MIC: f64 = 14100.0;

/// Limit for the strut acceleration [µm/s²].
pub const MAX_ACCEL_LIMIT: f64 = 500.0;

/// Limit for the hexapod linear velocity [µm/s].
pub const MAX_LINEAR_VEL_LIMIT: f64 = 2000.0;

/// Limit for the hexapod angular velocity [deg/s].
pub const MAX_ANGULAR_VEL_LIMIT: f64 = 0.1146;

// ─── Camera hexapod pose limits ─────────────────────────────────────

pub const CAM_XY_MAX_MIC: f64 = 11400.0;
pub const CAM_Z_MIN_MIC: f64 = -13100.0;
pub const CAM_Z_MAX_MIC: f64 = 13100.0;
pub const CAM_UV_MAX_DEG: f64 = 0.36;
pub const CAM_W_MIN_DEG: f64 = -0.1;
pub const CAM_W_MAX_DEG: f64 = 0.1;

// ─── M2 hexapod pose limits ─────────────────────────────────────────

pub const M2_XY_MAX_MIC: f64 = 10500.0;
pub const M2_Z_MIN_MIC: f64 = -8900.0;
pub const M2_Z_MAX_MIC: f64 = 8900.0;
pub const M2_UV_MAX_DEG: f64 = 0.175;
pub const M2_W_MIN_DEG: f64 = -0.05;
pub const M2_W_MAX_DEG: f64 = 0.05;

// ─── Pivot limits ───────────────────────────────────────────────────

/// Maximum |x| of the pivot [µm].
pub const MAX_PIVOT_X_MIC: f64 = 500_000.0;
/// Maximum |y| of the pivot [µm].
pub const MAX_PIVOT_Y_MIC: f64 = 500_000.0;
/// Maximum |z| of the pivot [µm].
pub const MAX_PIVOT_Z_MIC: f64 = 3_500_000.0;

// ─── Connection defaults ────────────────────────────────────────────

/// Default controller host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default controller command/telemetry port.
pub const DEFAULT_PORT: u16 = 5560;

/// Default connection timeout [s].
pub const DEFAULT_CONNECTION_TIMEOUT: f64 = 10.0;

/// Default command acknowledgement/confirmation timeout [s].
pub const DEFAULT_COMMAND_TIMEOUT: f64 = 5.0;

/// Longest accepted connection, command or telemetry timeout [s].
pub const MAX_TIMEOUT: f64 = 86_400.0;

/// Nominal telemetry rate of the controller [Hz].
pub const TELEMETRY_RATE_HZ: f64 = 20.0;

/// Default time without telemetry before the link is declared lost [s].
pub const DEFAULT_TELEMETRY_STALE_TIMEOUT: f64 = 2.0;

/// Largest accepted wire frame [bytes].
pub const MAX_FRAME_BYTES: usize = 1 << 20;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hexgui/hexgui.toml";
