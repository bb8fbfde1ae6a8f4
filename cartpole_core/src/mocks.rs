//! Test and helper mocks for cartpole_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cartpole_traits::{Clock, Transport};

use crate::protocol::MotionControl;
use crate::registry::MotionHooks;

/// Hooks that swallow every update; useful when exercising the registry or
/// dispatcher without a motion controller behind them.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl MotionHooks for NoopHooks {
    fn set_max_speed(&mut self, _v: f32) {}
    fn set_max_accel(&mut self, _a: f32) {}
    fn set_target_position(&mut self, _x: f32) {}
    fn set_debug_led(&mut self, _on: bool) {}
}

impl MotionControl for NoopHooks {
    fn begin_homing(&mut self) {}
    fn homing_active(&self) -> bool {
        false
    }
}

/// Manually-advanced clock for deterministic control-loop tests.
///
/// now() = origin + offset; sleep(d) advances the offset without sleeping.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
        self.origin + off
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// In-memory transport; the test side keeps a [`PipeHost`] to push request
/// lines in and read response lines back out after the dispatcher has taken
/// ownership of the transport end.
#[derive(Default)]
pub struct PipeTransport {
    input: Arc<Mutex<VecDeque<u8>>>,
    output: Arc<Mutex<Vec<String>>>,
}

/// Host-side view of a [`PipeTransport`].
#[derive(Clone)]
pub struct PipeHost {
    input: Arc<Mutex<VecDeque<u8>>>,
    output: Arc<Mutex<Vec<String>>>,
}

impl PipeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(&self) -> PipeHost {
        PipeHost {
            input: self.input.clone(),
            output: self.output.clone(),
        }
    }
}

impl PipeHost {
    /// Queue one request line; the newline terminator is appended here.
    pub fn push_line(&self, line: &str) {
        if let Ok(mut input) = self.input.lock() {
            input.extend(line.bytes());
            input.push_back(b'\n');
        }
    }

    /// Everything written so far, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        self.output.lock().map(|out| out.clone()).unwrap_or_default()
    }

    /// Drain the captured output, returning what was there.
    pub fn take_lines(&self) -> Vec<String> {
        self.output
            .lock()
            .map(|mut out| std::mem::take(&mut *out))
            .unwrap_or_default()
    }
}

impl Transport for PipeTransport {
    fn poll_byte(&mut self) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.input.lock().ok().and_then(|mut input| input.pop_front()))
    }

    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut out) = self.output.lock() {
            out.push(line.to_string());
        }
        Ok(())
    }
}
