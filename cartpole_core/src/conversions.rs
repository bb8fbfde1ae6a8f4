//! Mappings from the TOML-facing schema in `cartpole_config` into the core
//! config structs.

use crate::state::PlantState;
use crate::{EncoderCfg, MotionCfg, ProtocolCfg};

impl From<&cartpole_config::Stepper> for MotionCfg {
    fn from(s: &cartpole_config::Stepper) -> Self {
        Self {
            steps_per_meter: crate::util::steps_per_meter(s.full_steps_per_meter, s.microsteps),
            homing_speed: s.homing_speed,
            homing_accel: s.homing_accel,
            settle_ms: s.settle_ms,
            ..Self::default()
        }
    }
}

impl From<&cartpole_config::Encoder> for EncoderCfg {
    fn from(e: &cartpole_config::Encoder) -> Self {
        Self {
            zero_angle: e.zero_angle,
            reverse: e.reverse,
            velocity_window_us: e.velocity_window_ms.saturating_mul(1000),
            smoothing_alpha: e.smoothing_alpha,
            max_velocity: e.max_velocity,
            ..Self::default()
        }
    }
}

impl From<&cartpole_config::Protocol> for ProtocolCfg {
    fn from(p: &cartpole_config::Protocol) -> Self {
        Self {
            keepalive_ms: p.keepalive_ms,
            ..Self::default()
        }
    }
}

/// Boot-time plant state with the configured limit defaults applied.
pub fn initial_state(limits: &cartpole_config::Limits) -> PlantState {
    PlantState::with_limits(limits.max_v, limits.max_a, limits.hw_max_v, limits.hw_max_a)
}
