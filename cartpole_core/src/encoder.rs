//! Pole/motor-shaft angle estimation.
//!
//! Converts raw 12-bit sensor reads into a continuous angle in `[0, 2π)` and
//! a filtered angular velocity. The velocity is a delayed finite difference
//! over a short sliding window rather than an instantaneous derivative; it
//! trades a little latency for noise rejection.

use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use cartpole_traits::{AngleSensor, Clock};

use crate::EncoderCfg;
use crate::state::PlantState;

/// Angle deltas beyond this are a 0/2π seam crossing, not a real jump.
const ROTATION_CARRY_THRESHOLD: f32 = 1.8 * std::f32::consts::PI;

/// Which state slots an estimator instance feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleChannel {
    /// `pole_x` / `pole_v`
    Pole,
    /// `motor_x` / `motor_v`
    Motor,
}

impl AngleChannel {
    fn write(self, state: &mut PlantState, angle: f32, velocity: f32) {
        match self {
            AngleChannel::Pole => {
                state.pole_x = angle;
                state.pole_v = velocity;
            }
            AngleChannel::Motor => {
                state.motor_x = angle;
                state.motor_v = velocity;
            }
        }
    }
}

pub struct AngleEstimator<S: AngleSensor> {
    sensor: S,
    cfg: EncoderCfg,
    channel: AngleChannel,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    prev_angle: f32,
    prev_time_us: u64,
    prev_velocity: f32,
    /// Time-ordered (timestamp_us, angle) samples within the velocity window.
    history: VecDeque<(u64, f32)>,
    /// Latched on sensor bus errors; polling is skipped while set.
    hw_fault: Arc<AtomicBool>,
}

impl<S: AngleSensor> AngleEstimator<S> {
    pub fn new(
        sensor: S,
        channel: AngleChannel,
        cfg: EncoderCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            sensor,
            cfg,
            channel,
            clock,
            epoch,
            prev_angle: 0.0,
            prev_time_us: 0,
            prev_velocity: 0.0,
            history: VecDeque::new(),
            hw_fault: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while the sensor is considered dead (bus error since last reset).
    pub fn hw_error(&self) -> bool {
        self.hw_fault.load(Ordering::Relaxed)
    }

    /// Shared handle to the error latch; the reset path clears it.
    pub fn fault_latch(&self) -> Arc<AtomicBool> {
        self.hw_fault.clone()
    }

    /// Drop accumulated history and clear the error latch.
    pub fn reset(&mut self) {
        self.history.clear();
        self.prev_velocity = 0.0;
        self.hw_fault.store(false, Ordering::Relaxed);
    }

    /// Sample the sensor once and refresh the bound state slots.
    pub fn poll(&mut self, state: &mut PlantState) {
        if self.hw_fault.load(Ordering::Relaxed) {
            return;
        }
        // Clamped to >= 1 so the first-sample fallback below always has a
        // non-zero time base.
        let curr_time_us = self.clock.us_since(self.epoch).max(1);
        if !self.history.is_empty() && curr_time_us <= self.prev_time_us {
            // Same-microsecond re-poll; no time base for a velocity estimate.
            return;
        }

        let raw = match self.sensor.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                self.hw_fault.store(true, Ordering::Relaxed);
                tracing::warn!(error = %e, channel = ?self.channel, "angle sensor read failed");
                return;
            }
        };

        let mut curr_angle =
            f32::from(raw) / self.cfg.counts_per_rev as f32 * TAU - self.cfg.zero_angle;
        if curr_angle < 0.0 {
            curr_angle += TAU;
        }
        if self.cfg.reverse {
            curr_angle = TAU - curr_angle;
        }

        let momentary_delta = carry_correct(curr_angle - self.prev_angle);
        let momentary_dt = (curr_time_us.saturating_sub(self.prev_time_us)) as f32 / 1e6;
        if !self.history.is_empty() {
            let momentary_velocity = momentary_delta / momentary_dt;
            if momentary_velocity.abs() > self.cfg.max_velocity {
                tracing::trace!(
                    velocity = momentary_velocity,
                    limit = self.cfg.max_velocity,
                    "angle spike rejected"
                );
                return;
            }
        }

        // Find the oldest sample still inside the window, evicting the rest.
        let mut hist_time_us = curr_time_us.saturating_sub(1);
        let mut hist_angle = curr_angle;
        while let Some(&(t, a)) = self.history.front() {
            hist_time_us = t;
            hist_angle = a;
            if curr_time_us - t <= self.cfg.velocity_window_us {
                break;
            }
            self.history.pop_front();
        }

        let delta = carry_correct(curr_angle - hist_angle);
        let dt = (curr_time_us - hist_time_us) as f32 / 1e6;
        let curr_velocity = self.cfg.smoothing_alpha * (delta / dt)
            + (1.0 - self.cfg.smoothing_alpha) * self.prev_velocity;

        self.channel.write(state, curr_angle, curr_velocity);
        self.prev_time_us = curr_time_us;
        self.prev_angle = curr_angle;
        self.prev_velocity = curr_velocity;
        self.history.push_back((curr_time_us, curr_angle));
    }
}

/// Fold a 0/2π seam crossing out of an angle delta.
#[inline]
fn carry_correct(delta: f32) -> f32 {
    if delta.abs() > ROTATION_CARRY_THRESHOLD {
        delta - if delta > 0.0 { TAU } else { -TAU }
    } else {
        delta
    }
}
