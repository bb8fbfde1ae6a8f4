//! Simulated rig: a kinematic cart model with endstops at both ends, plus a
//! scripted pendulum angle sensor.
//!
//! The cart model integrates lazily against the injected clock, so tests
//! driven by a manually-advanced clock are fully deterministic: advance the
//! clock, poll the controller, and the cart has moved exactly
//! `speed * elapsed` steps. Ramps are not modeled; the cart moves at the
//! commanded speed and reports zero ramp acceleration.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use cartpole_traits::{AngleSensor, Clock, LimitSwitches, StepperDriver};

/// Physical parameters of the simulated rig.
#[derive(Debug, Clone)]
pub struct RigCfg {
    /// Distance between the endstops, in steps.
    pub span_steps: i32,
    /// Initial cart position as a fraction of the span (0.0 = left stop).
    pub start_frac: f64,
}

impl Default for RigCfg {
    fn default() -> Self {
        Self {
            span_steps: 4000,
            start_frac: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DriveMode {
    Idle,
    /// Absolute target in the physical frame (steps from the left stop).
    To(f64),
    Forward,
    Backward,
}

struct RigState {
    /// Cart position in the physical frame: 0 = left stop.
    phys_pos: f64,
    /// Driver counter = phys_pos - counter_offset.
    counter_offset: f64,
    span_steps: f64,
    speed_hz: u32,
    accel: u32,
    mode: DriveMode,
    enabled: bool,
    stalled: bool,
    /// Forces the left switch closed regardless of cart position, for
    /// spurious-trigger scenarios.
    left_override: bool,
    last_update: Instant,
}

impl RigState {
    /// Integrate motion up to `now`.
    fn sync(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        if dt <= 0.0 {
            return;
        }
        let travel = self.speed_hz as f64 * dt;
        match self.mode {
            DriveMode::Idle => {}
            DriveMode::Forward => self.phys_pos += travel,
            DriveMode::Backward => self.phys_pos -= travel,
            DriveMode::To(target) => {
                let delta = target - self.phys_pos;
                if delta.abs() <= travel {
                    self.phys_pos = target;
                    self.mode = DriveMode::Idle;
                } else {
                    self.phys_pos += travel * delta.signum();
                }
            }
        }
        // Hard stops at both ends of the rail.
        self.phys_pos = self.phys_pos.clamp(0.0, self.span_steps);
    }

    fn signed_speed_hz(&self) -> f64 {
        match self.mode {
            DriveMode::Idle => 0.0,
            DriveMode::Forward => self.speed_hz as f64,
            DriveMode::Backward => -(self.speed_hz as f64),
            DriveMode::To(target) => {
                let delta = target - self.phys_pos;
                if delta.abs() < 0.5 {
                    0.0
                } else {
                    self.speed_hz as f64 * delta.signum()
                }
            }
        }
    }
}

/// Shared simulated rig; hands out the driver and switch views over the same
/// cart.
pub struct SimRig {
    inner: Arc<Mutex<RigState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimRig {
    pub fn new(cfg: RigCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let state = RigState {
            phys_pos: cfg.start_frac.clamp(0.0, 1.0) * cfg.span_steps as f64,
            counter_offset: 0.0,
            span_steps: cfg.span_steps as f64,
            speed_hz: 0,
            accel: 0,
            mode: DriveMode::Idle,
            enabled: false,
            stalled: false,
            left_override: false,
            last_update: clock.now(),
        };
        Self {
            inner: Arc::new(Mutex::new(state)),
            clock,
        }
    }

    pub fn driver(&self) -> SimDriver {
        SimDriver {
            inner: self.inner.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn switches(&self) -> SimSwitches {
        SimSwitches {
            inner: self.inner.clone(),
            clock: self.clock.clone(),
        }
    }

    /// Assert or release the stall-guard signal.
    pub fn set_stalled(&self, stalled: bool) {
        if let Ok(mut rig) = self.inner.lock() {
            rig.stalled = stalled;
        }
    }

    /// Force the left endstop closed, e.g. to fake a spurious trigger.
    pub fn force_left_switch(&self, on: bool) {
        if let Ok(mut rig) = self.inner.lock() {
            rig.left_override = on;
        }
    }

    /// Teleport the cart, in physical steps from the left stop.
    pub fn place_cart(&self, phys_steps: f64) {
        if let Ok(mut rig) = self.inner.lock() {
            rig.phys_pos = phys_steps.clamp(0.0, rig.span_steps);
        }
    }

    /// Current cart position in physical steps (test introspection).
    pub fn cart_steps(&self) -> f64 {
        let now = self.clock.now();
        match self.inner.lock() {
            Ok(mut rig) => {
                rig.sync(now);
                rig.phys_pos
            }
            Err(_) => 0.0,
        }
    }
}

macro_rules! with_rig {
    ($self:ident, $rig:ident, $body:expr) => {{
        let now = $self.clock.now();
        match $self.inner.lock() {
            Ok(mut guard) => {
                guard.sync(now);
                let $rig = &mut *guard;
                $body
            }
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                guard.sync(now);
                let $rig = &mut *guard;
                $body
            }
        }
    }};
}

/// Driver view of the rig; mirrors a hardware-timer-paced step generator.
pub struct SimDriver {
    inner: Arc<Mutex<RigState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl StepperDriver for SimDriver {
    fn enable_outputs(&mut self) {
        with_rig!(self, rig, rig.enabled = true)
    }

    fn disable_outputs(&mut self) {
        with_rig!(self, rig, rig.enabled = false)
    }

    fn set_speed_hz(&mut self, steps_per_sec: u32) {
        with_rig!(self, rig, rig.speed_hz = steps_per_sec)
    }

    fn set_acceleration(&mut self, steps_per_sec2: u32) {
        with_rig!(self, rig, rig.accel = steps_per_sec2)
    }

    fn move_to(&mut self, steps: i32) {
        with_rig!(self, rig, {
            rig.mode = DriveMode::To(steps as f64 + rig.counter_offset);
        })
    }

    fn run_forward(&mut self) {
        with_rig!(self, rig, rig.mode = DriveMode::Forward)
    }

    fn run_backward(&mut self) {
        with_rig!(self, rig, rig.mode = DriveMode::Backward)
    }

    fn force_stop(&mut self) {
        with_rig!(self, rig, rig.mode = DriveMode::Idle)
    }

    fn set_current_position(&mut self, steps: i32) {
        with_rig!(self, rig, {
            rig.counter_offset = rig.phys_pos - steps as f64;
        })
    }

    fn current_position(&mut self) -> i32 {
        with_rig!(self, rig, (rig.phys_pos - rig.counter_offset).round() as i32)
    }

    fn current_speed_millihz(&mut self) -> i32 {
        with_rig!(self, rig, (rig.signed_speed_hz() * 1000.0) as i32)
    }

    fn current_acceleration(&mut self) -> i32 {
        // Constant-speed model: no ramp in flight.
        0
    }

    fn is_running(&mut self) -> bool {
        with_rig!(self, rig, rig.mode != DriveMode::Idle)
    }

    fn stall_detected(&mut self) -> bool {
        with_rig!(self, rig, rig.stalled)
    }
}

/// Endstop view of the rig.
pub struct SimSwitches {
    inner: Arc<Mutex<RigState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

const SWITCH_TOLERANCE_STEPS: f64 = 0.5;

impl LimitSwitches for SimSwitches {
    fn left(&mut self) -> bool {
        with_rig!(self, rig, {
            rig.left_override || rig.phys_pos <= SWITCH_TOLERANCE_STEPS
        })
    }

    fn right(&mut self) -> bool {
        with_rig!(self, rig, {
            rig.phys_pos >= rig.span_steps - SWITCH_TOLERANCE_STEPS
        })
    }
}

/// Damped pendulum angle source for demo runs: the pole starts displaced
/// from hanging rest and swings down over a few seconds.
pub struct SimAngleSensor {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    amplitude_rad: f64,
    freq_hz: f64,
    damping: f64,
}

impl SimAngleSensor {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            amplitude_rad: 0.6,
            freq_hz: 1.2,
            damping: 0.4,
        }
    }
}

impl AngleSensor for SimAngleSensor {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        let t = self.clock.us_since(self.epoch) as f64 / 1e6;
        let angle = std::f64::consts::PI
            + self.amplitude_rad
                * (-self.damping * t).exp()
                * (std::f64::consts::TAU * self.freq_hz * t).cos();
        let wrapped = angle.rem_euclid(std::f64::consts::TAU);
        let raw = (wrapped / std::f64::consts::TAU * 4096.0) as u16;
        Ok(raw.min(4095))
    }
}

/// Replays a fixed sequence of raw counts, then repeats the last one.
pub struct ScriptedAngleSensor {
    seq: VecDeque<u16>,
    last: u16,
}

impl ScriptedAngleSensor {
    pub fn new(seq: impl Into<VecDeque<u16>>) -> Self {
        Self {
            seq: seq.into(),
            last: 0,
        }
    }
}

impl AngleSensor for ScriptedAngleSensor {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(v) = self.seq.pop_front() {
            self.last = v;
        }
        Ok(self.last)
    }
}
