#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and validation for the cart-pole controller.
//!
//! Every tunable of the controller lives here: drive geometry, homing
//! profile, encoder conversion, soft/hardware limits, protocol pacing, and
//! logging. All sections are optional in the TOML; omitted sections fall
//! back to compiled-in defaults, so an empty file is a valid config.
use serde::Deserialize;

/// Stepper drive geometry and homing profile.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Stepper {
    /// Full steps of the motor per meter of cart travel.
    pub full_steps_per_meter: u32,
    /// Microstepping factor configured on the driver IC.
    pub microsteps: u32,
    /// Homing cruise speed in m/s.
    pub homing_speed: f32,
    /// Homing acceleration in m/s^2.
    pub homing_accel: f32,
    /// Pause after each endstop hit before reversing, in ms.
    pub settle_ms: u64,
}

impl Default for Stepper {
    fn default() -> Self {
        Self {
            full_steps_per_meter: 1666,
            microsteps: 16,
            homing_speed: 0.1,
            homing_accel: 0.5,
            settle_ms: 50,
        }
    }
}

/// Pole angle sensor conversion and filtering.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Encoder {
    /// Mechanical zero offset in radians, subtracted from the raw angle.
    pub zero_angle: f32,
    /// Mirror the angle when the sensor is mounted facing the other way.
    pub reverse: bool,
    /// Sliding window for the delayed-difference velocity estimate, in ms.
    pub velocity_window_ms: u64,
    /// Exponential smoothing factor applied to the new velocity estimate.
    /// Range: (0.0, 1.0].
    pub smoothing_alpha: f32,
    /// Samples implying a faster rotation than this are dropped as spikes,
    /// in rad/s.
    pub max_velocity: f32,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            zero_angle: 2.9406,
            reverse: true,
            velocity_window_ms: 20,
            smoothing_alpha: 0.85,
            max_velocity: 5.0 * std::f32::consts::TAU,
        }
    }
}

/// Soft limit defaults and hardware ceilings.
///
/// `hw_max_x` is not configurable; it is measured by homing each session.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Limits {
    /// Default soft velocity limit in m/s.
    pub max_v: f32,
    /// Default soft acceleration limit in m/s^2.
    pub max_a: f32,
    /// Hardware velocity ceiling in m/s.
    pub hw_max_v: f32,
    /// Hardware acceleration ceiling in m/s^2.
    pub hw_max_a: f32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_v: 0.5,
            max_a: 1.0,
            hw_max_v: 10.0,
            hw_max_a: 10.0,
        }
    }
}

/// Request/response pacing.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Protocol {
    /// Keep-alive frame interval while a reset request is homing, in ms.
    pub keepalive_ms: u64,
}

impl Default for Protocol {
    fn default() -> Self {
        Self { keepalive_ms: 250 }
    }
}

/// Tick loop pacing.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Runner {
    /// Control loop rate in Hz.
    pub tick_rate_hz: u32,
}

impl Default for Runner {
    fn default() -> Self {
        Self { tick_rate_hz: 200 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub stepper: Stepper,
    pub encoder: Encoder,
    pub limits: Limits,
    pub protocol: Protocol,
    pub runner: Runner,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stepper
        if self.stepper.full_steps_per_meter == 0 {
            eyre::bail!("stepper.full_steps_per_meter must be > 0");
        }
        if self.stepper.microsteps == 0 {
            eyre::bail!("stepper.microsteps must be >= 1");
        }
        if !(self.stepper.homing_speed > 0.0) {
            eyre::bail!("stepper.homing_speed must be > 0");
        }
        if !(self.stepper.homing_accel > 0.0) {
            eyre::bail!("stepper.homing_accel must be > 0");
        }

        // Encoder
        if !self.encoder.zero_angle.is_finite() {
            eyre::bail!("encoder.zero_angle must be finite");
        }
        if self.encoder.velocity_window_ms == 0 {
            eyre::bail!("encoder.velocity_window_ms must be >= 1");
        }
        if !(self.encoder.smoothing_alpha > 0.0 && self.encoder.smoothing_alpha <= 1.0) {
            eyre::bail!("encoder.smoothing_alpha must be in (0.0, 1.0]");
        }
        if !(self.encoder.max_velocity > 0.0) {
            eyre::bail!("encoder.max_velocity must be > 0");
        }

        // Limits
        if self.limits.max_v < 0.0 || self.limits.max_a < 0.0 {
            eyre::bail!("limits.max_v and limits.max_a must be >= 0");
        }
        if !(self.limits.hw_max_v > 0.0) || !(self.limits.hw_max_a > 0.0) {
            eyre::bail!("limits.hw_max_v and limits.hw_max_a must be > 0");
        }
        if self.limits.max_v > self.limits.hw_max_v {
            eyre::bail!("limits.max_v must not exceed limits.hw_max_v");
        }
        if self.limits.max_a > self.limits.hw_max_a {
            eyre::bail!("limits.max_a must not exceed limits.hw_max_a");
        }

        // Protocol
        if self.protocol.keepalive_ms == 0 {
            eyre::bail!("protocol.keepalive_ms must be >= 1");
        }

        // Runner
        if self.runner.tick_rate_hz == 0 {
            eyre::bail!("runner.tick_rate_hz must be > 0");
        }
        if self.runner.tick_rate_hz > 10_000 {
            eyre::bail!("runner.tick_rate_hz is unreasonably large (>10kHz)");
        }

        // Logging: rotation is checked here; level is parsed by the CLI.
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
