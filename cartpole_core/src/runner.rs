//! Controller assembly and the cooperative tick loop.
//!
//! A single thread drives everything: motion poll (kinematic refresh, homing
//! progression, fault detection) first, then the angle estimators and the
//! optional accelerometer, then command dispatch. A command landing mid-tick
//! therefore always sees post-polling state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cartpole_traits::clock::MonotonicClock;
use cartpole_traits::{Accelerometer, AngleSensor, Clock, LimitSwitches, StepperDriver, Transport};

use crate::encoder::{AngleChannel, AngleEstimator};
use crate::error::{BuildError, Result};
use crate::protocol::RequestDispatcher;
use crate::registry::FieldRegistry;
use crate::state::PlantState;
use crate::stepper::MotionController;
use crate::{EncoderCfg, MotionCfg, ProtocolCfg};

pub struct Controller<D, L, S, T>
where
    D: StepperDriver,
    L: LimitSwitches,
    S: AngleSensor,
    T: Transport,
{
    state: PlantState,
    registry: FieldRegistry,
    motion: MotionController<D, L>,
    pole: AngleEstimator<S>,
    motor_shaft: Option<AngleEstimator<Box<dyn AngleSensor>>>,
    imu: Option<Box<dyn Accelerometer>>,
    dispatcher: RequestDispatcher<T>,
    clock: Arc<dyn Clock + Send + Sync>,
    period_us: u64,
}

/// Validate configs and assemble a controller from its hardware seams.
#[allow(clippy::too_many_arguments)]
pub fn build_controller<D, L, S, T>(
    driver: D,
    switches: L,
    pole_sensor: S,
    transport: T,
    motion_cfg: MotionCfg,
    encoder_cfg: EncoderCfg,
    protocol_cfg: ProtocolCfg,
    tick_rate_hz: u32,
    state: PlantState,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<Controller<D, L, S, T>>
where
    D: StepperDriver,
    L: LimitSwitches,
    S: AngleSensor,
    T: Transport,
{
    if motion_cfg.steps_per_meter == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "steps_per_meter must be > 0",
        )));
    }
    if !(motion_cfg.homing_speed > 0.0) || !(motion_cfg.homing_accel > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "homing speed and acceleration must be > 0",
        )));
    }
    if encoder_cfg.counts_per_rev == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "counts_per_rev must be > 0",
        )));
    }
    if !(encoder_cfg.smoothing_alpha > 0.0 && encoder_cfg.smoothing_alpha <= 1.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "smoothing_alpha must be in (0.0, 1.0]",
        )));
    }
    if encoder_cfg.velocity_window_us == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "velocity_window_us must be >= 1",
        )));
    }
    if protocol_cfg.keepalive_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "keepalive_ms must be >= 1",
        )));
    }
    if tick_rate_hz == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "tick_rate_hz must be > 0",
        )));
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };

    // Snapshot defaults before anything can mutate the state.
    let registry = FieldRegistry::new(&state);
    let motion = MotionController::new(driver, switches, motion_cfg, clock.clone());
    let pole = AngleEstimator::new(pole_sensor, AngleChannel::Pole, encoder_cfg, clock.clone());
    let mut dispatcher = RequestDispatcher::new(transport, protocol_cfg, clock.clone());
    dispatcher.register_sensor_fault(pole.fault_latch());

    let period_us = crate::util::period_us(tick_rate_hz);

    Ok(Controller {
        state,
        registry,
        motion,
        pole,
        motor_shaft: None,
        imu: None,
        dispatcher,
        clock,
        period_us,
    })
}

impl<D, L, S, T> Controller<D, L, S, T>
where
    D: StepperDriver,
    L: LimitSwitches,
    S: AngleSensor,
    T: Transport,
{
    /// Attach a second estimator on the motor shaft, feeding `motor_x`/`motor_v`.
    pub fn with_motor_encoder(mut self, sensor: Box<dyn AngleSensor>, cfg: EncoderCfg) -> Self {
        let estimator =
            AngleEstimator::new(sensor, AngleChannel::Motor, cfg, self.clock.clone());
        self.dispatcher.register_sensor_fault(estimator.fault_latch());
        self.motor_shaft = Some(estimator);
        self
    }

    /// Attach an accelerometer feeding `imu_a`.
    pub fn with_accelerometer(mut self, imu: Box<dyn Accelerometer>) -> Self {
        self.imu = Some(imu);
        self
    }

    pub fn state(&self) -> &PlantState {
        &self.state
    }

    /// True when no deferred request is waiting on homing; an embedding
    /// loop should not stop while this is false.
    pub fn idle(&self) -> bool {
        !self.dispatcher.reset_in_flight()
    }

    pub fn motion(&mut self) -> &mut MotionController<D, L> {
        &mut self.motion
    }

    /// One cycle of sensor poll, fault check, and command service.
    pub fn tick(&mut self) {
        let Self {
            state,
            registry,
            motion,
            pole,
            motor_shaft,
            imu,
            dispatcher,
            ..
        } = self;

        motion.poll(state);
        pole.poll(state);
        if let Some(estimator) = motor_shaft {
            estimator.poll(state);
        }
        if let Some(imu) = imu {
            match imu.read_accel() {
                Ok(a) => state.imu_a = a,
                Err(e) => tracing::warn!(error = %e, "accelerometer read failed"),
            }
        }
        dispatcher.poll(state, registry, motion);
    }

    /// Drive the tick loop until the shutdown flag is raised.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        tracing::info!(period_us = self.period_us, "control loop started");
        while !shutdown.load(Ordering::Relaxed) {
            self.tick();
            self.clock.sleep(Duration::from_micros(self.period_us));
        }
        tracing::info!("control loop stopped");
    }
}
