#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Cart-pole controller core (hardware-agnostic).
//!
//! The four components of the control loop, wired over the hardware traits
//! in `cartpole_traits`:
//!
//! - **AngleEstimator** (`encoder`): raw sensor counts to unwrapped angle
//!   and windowed, smoothed angular velocity, with spike rejection.
//! - **MotionController** (`stepper`): kinematic readback, target moves,
//!   the homing state machine, and the safety interlocks.
//! - **FieldRegistry** (`registry`): typed, validated, readonly-aware
//!   access to the plant state over three groups (config/state/target).
//! - **RequestDispatcher** (`protocol`): the line protocol mapping
//!   get/set/reset onto the registry and motion controller.
//!
//! `runner` composes them into a single-threaded cooperative tick loop.

// Module declarations
pub mod conversions;
pub mod encoder;
pub mod error;
pub mod mocks;
pub mod protocol;
pub mod registry;
pub mod runner;
pub mod state;
pub mod stepper;
pub mod util;

pub use encoder::{AngleChannel, AngleEstimator};
pub use error::{BuildError, Fault, ValidationError};
pub use protocol::{MotionControl, RequestDispatcher};
pub use registry::{FieldRegistry, Group, MotionHooks, Value};
pub use runner::{Controller, build_controller};
pub use state::PlantState;
pub use stepper::MotionController;

/// Drive geometry and homing profile for the motion controller.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    /// Microsteps per meter of cart travel (full steps x microstepping).
    pub steps_per_meter: u32,
    /// [m/s] Homing cruise speed.
    pub homing_speed: f32,
    /// [m/s^2] Homing acceleration.
    pub homing_accel: f32,
    /// Pause after each endstop hit before reversing, in ms.
    pub settle_ms: u64,
    /// Tolerance added to the soft limits before declaring an overflow.
    pub limits_eps: f32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            steps_per_meter: 1666 * 16,
            homing_speed: 0.1,
            homing_accel: 0.5,
            settle_ms: 50,
            limits_eps: 1e-3,
        }
    }
}

/// Angle conversion and filtering for an estimator instance.
#[derive(Debug, Clone)]
pub struct EncoderCfg {
    /// Sensor resolution per revolution (12 bit).
    pub counts_per_rev: u32,
    /// [rad] Mechanical zero offset, subtracted from the raw angle.
    pub zero_angle: f32,
    /// Mirror the angle for a reversed sensor mount.
    pub reverse: bool,
    /// Sliding window for the delayed-difference velocity, in microseconds.
    pub velocity_window_us: u64,
    /// Exponential smoothing factor on the new velocity estimate.
    pub smoothing_alpha: f32,
    /// [rad/s] Samples implying faster rotation are dropped as spikes.
    pub max_velocity: f32,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            counts_per_rev: 4096,
            zero_angle: 0.0,
            reverse: false,
            velocity_window_us: 20_000,
            smoothing_alpha: 0.85,
            max_velocity: 5.0 * std::f32::consts::TAU,
        }
    }
}

/// Request/response pacing and limits.
#[derive(Debug, Clone)]
pub struct ProtocolCfg {
    /// Keep-alive interval while a reset request is homing, in ms.
    pub keepalive_ms: u64,
    /// Longest accepted request line, in bytes.
    pub max_line_len: usize,
}

impl Default for ProtocolCfg {
    fn default() -> Self {
        Self {
            keepalive_ms: 250,
            max_line_len: 256,
        }
    }
}
