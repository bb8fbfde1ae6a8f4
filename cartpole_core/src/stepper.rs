//! Cart motion control: kinematic readback, target moves, homing, and the
//! safety interlocks that gate everything else.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use cartpole_traits::{Clock, LimitSwitches, StepperDriver};

use crate::MotionCfg;
use crate::error::Fault;
use crate::registry::MotionHooks;
use crate::state::PlantState;

/// Values of the shared endstop latch. An interrupt-style source stores a
/// side; the tick loop consumes it with a single atomic swap so the two never
/// observe a torn update.
pub const LATCH_NONE: u8 = 0;
pub const LATCH_LEFT: u8 = 1;
pub const LATCH_RIGHT: u8 = 2;

#[derive(Debug, Clone, Copy)]
enum HomingPhase {
    Idle,
    SeekLeft,
    SettleLeft { until_ms: u64 },
    SeekRight,
    SettleRight { until_ms: u64, span: i32 },
    Centering { span: i32 },
}

pub struct MotionController<D: StepperDriver, L: LimitSwitches> {
    driver: D,
    switches: L,
    cfg: MotionCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    enabled: bool,
    phase: HomingPhase,
    /// [m] Travel span measured by the last successful homing run.
    full_length_m: f32,
    endstop_latch: Arc<AtomicU8>,
    debug_led: bool,
}

impl<D: StepperDriver, L: LimitSwitches> MotionController<D, L> {
    pub fn new(
        driver: D,
        switches: L,
        cfg: MotionCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            driver,
            switches,
            cfg,
            clock,
            epoch,
            enabled: false,
            phase: HomingPhase::Idle,
            full_length_m: 0.0,
            endstop_latch: Arc::new(AtomicU8::new(LATCH_NONE)),
            debug_led: false,
        }
    }

    /// Handle for interrupt-style endstop sources. Store `LATCH_LEFT` or
    /// `LATCH_RIGHT`; never run further logic in the interrupt context.
    pub fn endstop_latch(&self) -> Arc<AtomicU8> {
        self.endstop_latch.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    fn steps_per_meter(&self) -> f32 {
        self.cfg.steps_per_meter as f32
    }

    /// [m] Cart position, centered on the rail.
    pub fn position(&mut self) -> f32 {
        let pos_steps = self.driver.current_position();
        pos_steps as f32 / self.steps_per_meter() - self.full_length_m / 2.0
    }

    /// [m/s] Cart velocity from the driver's ramp generator.
    pub fn velocity(&mut self) -> f32 {
        let vel_millihz = self.driver.current_speed_millihz();
        vel_millihz as f32 / 1000.0 / self.steps_per_meter()
    }

    /// [m/s^2] Cart acceleration from the driver's ramp generator.
    pub fn acceleration(&mut self) -> f32 {
        let steps_per_ss = self.driver.current_acceleration();
        steps_per_ss as f32 / self.steps_per_meter()
    }

    /// Reconfigure the speed ceiling; effective for subsequent moves.
    pub fn set_max_speed(&mut self, value: f32) {
        let speed_hz = (value * self.steps_per_meter()) as u32;
        self.driver.set_speed_hz(speed_hz);
    }

    /// Reconfigure the ramp acceleration; effective for subsequent moves.
    pub fn set_max_accel(&mut self, value: f32) {
        let steps_per_ss = (value * self.steps_per_meter()) as u32;
        self.driver.set_acceleration(steps_per_ss);
        tracing::debug!(accel_m_s2 = value, steps_per_ss, "set stepper acceleration");
    }

    /// Issue a move to an absolute cart position. Ignored unless enabled.
    pub fn set_target_position(&mut self, value: f32) {
        if !self.enabled {
            tracing::debug!(target = value, "target position ignored while disabled");
            return;
        }
        let pos_steps = ((value + self.full_length_m / 2.0) * self.steps_per_meter()) as i32;
        self.driver.move_to(pos_steps);
    }

    pub fn set_debug_led(&mut self, on: bool) {
        self.debug_led = on;
        tracing::debug!(on, "debug led");
    }

    pub fn debug_led(&self) -> bool {
        self.debug_led
    }

    pub fn enable(&mut self) {
        self.driver.enable_outputs();
        self.enabled = true;
        tracing::info!("stepper enabled");
    }

    /// Immediate forced stop and output-stage shutdown. No-op while homing
    /// is in progress; homing must finish or fault out first.
    pub fn disable(&mut self) {
        if self.homing_active() {
            return;
        }
        self.driver.force_stop();
        self.driver.disable_outputs();
        self.enabled = false;
        tracing::info!("stepper disabled");
    }

    pub fn homing_active(&self) -> bool {
        !matches!(self.phase, HomingPhase::Idle)
    }

    /// Start the homing sequence. No-op while a run is already in progress.
    pub fn begin_homing(&mut self) {
        if self.homing_active() {
            return;
        }
        self.driver.force_stop();
        self.driver.enable_outputs();
        self.enabled = false;
        self.set_max_speed(self.cfg.homing_speed);
        self.set_max_accel(self.cfg.homing_accel);
        self.endstop_latch.store(LATCH_NONE, Ordering::Release);
        self.driver.run_backward();
        self.phase = HomingPhase::SeekLeft;
        tracing::info!("homing started");
    }

    /// Synchronous homing: drives the state machine to completion, blocking
    /// the caller for the travel duration.
    pub fn home_blocking(&mut self, state: &mut PlantState) {
        self.begin_homing();
        while self.homing_active() {
            self.poll(state);
            self.clock.sleep(std::time::Duration::from_millis(1));
        }
    }

    /// Per-tick refresh: kinematic readback, homing progression, and fault
    /// detection, in that order.
    pub fn poll(&mut self, state: &mut PlantState) {
        state.curr_x = self.position();
        state.curr_v = self.velocity();
        state.curr_a = self.acceleration();

        if self.homing_active() {
            self.advance_homing(state);
            return;
        }
        if state.errcode == Fault::NoError {
            self.check_faults(state);
        }
    }

    fn check_faults(&mut self, state: &mut PlantState) {
        if self.driver.stall_detected() {
            return self.set_fault(state, Fault::MotorStalled, "motor stall detected");
        }
        let latched = self.endstop_latch.swap(LATCH_NONE, Ordering::AcqRel);
        if latched != LATCH_NONE || self.switches.left() || self.switches.right() {
            return self.set_fault(state, Fault::EndstopHit, "endstop hit detected");
        }
        let eps = self.cfg.limits_eps;
        if state.curr_x.abs() > state.max_x + eps {
            return self.set_fault(state, Fault::XOverflow, "x overflow detected");
        }
        if state.curr_v.abs() > state.max_v + eps {
            return self.set_fault(state, Fault::VOverflow, "v overflow detected");
        }
        if state.curr_a.abs() > state.max_a + eps {
            return self.set_fault(state, Fault::AOverflow, "a overflow detected");
        }
    }

    fn set_fault(&mut self, state: &mut PlantState, fault: Fault, what: &str) {
        state.errcode = fault;
        self.driver.force_stop();
        self.driver.disable_outputs();
        self.enabled = false;
        tracing::error!(
            errcode = fault.code(),
            curr_x = state.curr_x,
            curr_v = state.curr_v,
            curr_a = state.curr_a,
            "{what}"
        );
    }

    fn advance_homing(&mut self, state: &mut PlantState) {
        let now_ms = self.clock.ms_since(self.epoch);
        match self.phase {
            HomingPhase::Idle => {}
            HomingPhase::SeekLeft => {
                if self.switches.left() {
                    self.driver.force_stop();
                    self.driver.set_current_position(0);
                    self.phase = HomingPhase::SettleLeft {
                        until_ms: now_ms + self.cfg.settle_ms,
                    };
                }
            }
            HomingPhase::SettleLeft { until_ms } => {
                if now_ms >= until_ms {
                    self.driver.run_forward();
                    self.phase = HomingPhase::SeekRight;
                }
            }
            HomingPhase::SeekRight => {
                if self.switches.right() {
                    self.driver.force_stop();
                    let span = self.driver.current_position();
                    self.phase = HomingPhase::SettleRight {
                        until_ms: now_ms + self.cfg.settle_ms,
                        span,
                    };
                }
            }
            HomingPhase::SettleRight { until_ms, span } => {
                if now_ms >= until_ms {
                    self.driver.move_to(span / 2);
                    self.phase = HomingPhase::Centering { span };
                }
            }
            HomingPhase::Centering { span } => {
                // The right switch is still pressed when centering starts;
                // only the left one re-triggering means the move ran away.
                if self.switches.left() {
                    self.driver.force_stop();
                    self.driver.disable_outputs();
                    self.enabled = false;
                    state.errcode = Fault::HomingFailed;
                    self.phase = HomingPhase::Idle;
                    tracing::error!("homing failed: left endstop re-triggered while centering");
                    return;
                }
                if !self.driver.is_running() {
                    let full_length = span as f32 / self.steps_per_meter();
                    self.full_length_m = full_length;
                    state.full_length_meters = full_length;
                    state.hw_max_x = full_length / 2.0;
                    state.errcode = Fault::NoError;
                    self.enabled = true;
                    self.phase = HomingPhase::Idle;
                    tracing::info!(
                        span_steps = span,
                        full_length_m = full_length,
                        "homing complete"
                    );
                }
            }
        }
    }
}

impl<D: StepperDriver, L: LimitSwitches> MotionHooks for MotionController<D, L> {
    fn set_max_speed(&mut self, v: f32) {
        MotionController::set_max_speed(self, v);
    }
    fn set_max_accel(&mut self, a: f32) {
        MotionController::set_max_accel(self, a);
    }
    fn set_target_position(&mut self, x: f32) {
        MotionController::set_target_position(self, x);
    }
    fn set_debug_led(&mut self, on: bool) {
        MotionController::set_debug_led(self, on);
    }
}

impl<D: StepperDriver, L: LimitSwitches> crate::protocol::MotionControl
    for MotionController<D, L>
{
    fn begin_homing(&mut self) {
        MotionController::begin_homing(self);
    }
    fn homing_active(&self) -> bool {
        MotionController::homing_active(self)
    }
}
