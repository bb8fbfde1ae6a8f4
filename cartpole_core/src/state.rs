//! Shared plant state.
//!
//! One instance per process, owned by the controller and passed by reference
//! into each component per tick. Writers are partitioned by field ownership:
//! the motion controller owns `curr_*` and `errcode`, the angle estimators
//! own `pole_*`/`motor_*`/`imu_a`, and the protocol side (through the field
//! registry) owns config and target fields.

use crate::error::Fault;

#[derive(Debug, Clone)]
pub struct PlantState {
    /// [m] Absolute max cart position (soft limit).
    pub max_x: f32,
    /// [m/s] Absolute max cart velocity (soft limit).
    pub max_v: f32,
    /// [m/s^2] Absolute max cart acceleration (soft limit).
    pub max_a: f32,
    /// [m] Hardware-allowed position ceiling; measured by homing.
    pub hw_max_x: f32,
    /// [m/s] Hardware-allowed velocity ceiling.
    pub hw_max_v: f32,
    /// [m/s^2] Hardware-allowed acceleration ceiling.
    pub hw_max_a: f32,
    /// Clamp X targets to the allowed range instead of raising an error.
    pub clamp_x: bool,
    /// Clamp V targets to the allowed range instead of raising an error.
    pub clamp_v: bool,
    /// Clamp A targets to the allowed range instead of raising an error.
    pub clamp_a: bool,
    /// Debug LED output; side-effecting on commit.
    pub debug_led: bool,

    /// [m] Current cart position.
    pub curr_x: f32,
    /// [m/s] Current cart velocity.
    pub curr_v: f32,
    /// [m/s^2] Current cart acceleration.
    pub curr_a: f32,
    /// [rad] Current pole angle.
    pub pole_x: f32,
    /// [rad/s] Current pole angular velocity.
    pub pole_v: f32,
    /// Current fault code.
    pub errcode: Fault,
    /// [m/s^2] Auxiliary accelerometer channel.
    pub imu_a: f32,
    /// [rad] Motor-shaft encoder angle.
    pub motor_x: f32,
    /// [rad/s] Motor-shaft encoder angular velocity.
    pub motor_v: f32,

    /// [m] Target cart position.
    pub trgt_x: f32,
    /// [m/s] Target cart velocity.
    pub trgt_v: f32,
    /// [m/s^2] Target cart acceleration.
    pub trgt_a: f32,

    /// [m] Total travel as measured during homing. Not exposed through the
    /// protocol groups; `hw_max_x` derives from it.
    pub full_length_meters: f32,
}

impl Default for PlantState {
    fn default() -> Self {
        Self {
            // The position ceiling is unknown until homing has measured the
            // rail, so both max_x and hw_max_x start at zero.
            max_x: 0.0,
            max_v: 0.5,
            max_a: 1.0,
            hw_max_x: 0.0,
            hw_max_v: 10.0,
            hw_max_a: 10.0,
            clamp_x: false,
            clamp_v: false,
            clamp_a: false,
            debug_led: false,
            curr_x: 0.0,
            curr_v: 0.0,
            curr_a: 0.0,
            pole_x: 0.0,
            pole_v: 0.0,
            errcode: Fault::NeedReset,
            imu_a: 0.0,
            motor_x: 0.0,
            motor_v: 0.0,
            trgt_x: 0.0,
            trgt_v: 0.0,
            trgt_a: 0.0,
            full_length_meters: 0.0,
        }
    }
}

impl PlantState {
    /// State with the given soft/hardware limit defaults applied, used when
    /// a config file overrides the compiled-in values.
    pub fn with_limits(max_v: f32, max_a: f32, hw_max_v: f32, hw_max_a: f32) -> Self {
        Self {
            max_v,
            max_a,
            hw_max_v,
            hw_max_a,
            ..Self::default()
        }
    }
}
