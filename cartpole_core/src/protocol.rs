//! Line-oriented request dispatch.
//!
//! One command per newline-terminated line, lowercased on receipt:
//!
//! ```text
//! get <group> [key]*
//! set <group> (key=value)+
//! reset
//! ```
//!
//! Responses are single lines with a one-character prefix: `+` success,
//! `#` informational, `!` error, and a bare `~` keep-alive while a reset
//! request is homing. Every failure is converted to one `!` line at this
//! boundary; nothing propagates into the tick loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use cartpole_traits::{Clock, Transport};

use crate::ProtocolCfg;
use crate::error::{Fault, ValidationError};
use crate::registry::{FieldRegistry, Group, MotionHooks, Prepared};
use crate::state::PlantState;

/// The slice of the motion controller the dispatcher drives directly.
pub trait MotionControl: MotionHooks {
    fn begin_homing(&mut self);
    fn homing_active(&self) -> bool;
}

pub struct RequestDispatcher<T: Transport> {
    transport: T,
    cfg: ProtocolCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    line: String,
    /// Swallow the rest of an overlong line; one error was already sent.
    discard_line: bool,
    /// A `reset` whose response is deferred until homing resolves.
    reset_pending: bool,
    last_keepalive_ms: u64,
    /// Sensor fault latches cleared when a reset completes.
    sensor_faults: Vec<Arc<AtomicBool>>,
}

impl<T: Transport> RequestDispatcher<T> {
    pub fn new(transport: T, cfg: ProtocolCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        let mut dispatcher = Self {
            transport,
            cfg,
            clock,
            epoch,
            line: String::new(),
            discard_line: false,
            reset_pending: false,
            last_keepalive_ms: 0,
            sensor_faults: Vec::new(),
        };
        dispatcher.log("cartpole controller started");
        dispatcher
    }

    /// Register a sensor fault latch to clear whenever a reset completes.
    pub fn register_sensor_fault(&mut self, latch: Arc<AtomicBool>) {
        self.sensor_faults.push(latch);
    }

    /// True while a reset request is waiting for homing to resolve.
    pub fn reset_in_flight(&self) -> bool {
        self.reset_pending
    }

    /// Service the transport: while a reset is in flight, only emit
    /// keep-alives; otherwise drain bytes and dispatch at most one command.
    /// Commands never observe pre-poll state because the tick loop runs all
    /// sensor polling before this.
    pub fn poll<M: MotionControl>(
        &mut self,
        state: &mut PlantState,
        registry: &FieldRegistry,
        motion: &mut M,
    ) {
        if self.reset_pending {
            if motion.homing_active() {
                let now_ms = self.clock.ms_since(self.epoch);
                if now_ms.saturating_sub(self.last_keepalive_ms) >= self.cfg.keepalive_ms {
                    self.write_frame("~");
                    self.last_keepalive_ms = now_ms;
                }
            } else {
                self.finish_reset(state, registry, motion);
            }
            return;
        }

        loop {
            match self.transport.poll_byte() {
                Ok(Some(b'\n')) => {
                    if std::mem::take(&mut self.discard_line) {
                        break;
                    }
                    let line = std::mem::take(&mut self.line);
                    self.handle_line(&line, state, registry, motion);
                    break;
                }
                Ok(Some(b'\r')) => {}
                Ok(Some(_)) if self.discard_line => {}
                Ok(Some(byte)) => {
                    if self.line.len() >= self.cfg.max_line_len {
                        self.line.clear();
                        self.discard_line = true;
                        self.respond_err(&ValidationError::LineOverflow);
                        continue;
                    }
                    self.line.push(byte.to_ascii_lowercase() as char);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "transport read failed");
                    break;
                }
            }
        }
    }

    fn handle_line<M: MotionControl>(
        &mut self,
        line: &str,
        state: &mut PlantState,
        registry: &FieldRegistry,
        motion: &mut M,
    ) {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");

        let result = match command {
            "get" => self.cmd_get(parts, state, registry),
            "set" => self.cmd_set(parts, state, registry, motion),
            "reset" => {
                self.start_reset(motion);
                return;
            }
            other => Err(ValidationError::UnknownCommand(other.to_string())),
        };

        match result {
            Ok(text) => self.respond_ok(&text),
            Err(e) => self.respond_err(&e),
        }
    }

    fn cmd_get<'a>(
        &mut self,
        mut parts: impl Iterator<Item = &'a str>,
        state: &PlantState,
        registry: &FieldRegistry,
    ) -> Result<String, ValidationError> {
        let group = Group::parse(parts.next().unwrap_or(""))?;

        let keys: Vec<&str> = parts.collect();
        let pairs: Vec<String> = if keys.is_empty() {
            registry
                .get_all(group, state)
                .into_iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect()
        } else {
            keys.into_iter()
                .map(|key| Ok(format!("{key}={}", registry.get(group, key, state)?)))
                .collect::<Result<_, ValidationError>>()?
        };

        Ok(pairs.join(" "))
    }

    /// Atomic multi-key set: every pair is validated before any is
    /// committed, so a late failure leaves earlier pairs untouched.
    fn cmd_set<'a, M: MotionControl>(
        &mut self,
        mut parts: impl Iterator<Item = &'a str>,
        state: &mut PlantState,
        registry: &FieldRegistry,
        motion: &mut M,
    ) -> Result<String, ValidationError> {
        let group = Group::parse(parts.next().unwrap_or(""))?;

        let mut prepared: Vec<(&str, Prepared)> = Vec::new();
        for pair in parts {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(ValidationError::MalformedPair(pair.to_string()));
            };
            prepared.push((key, registry.prepare(group, key, value, state)?));
        }
        if prepared.is_empty() {
            return Err(ValidationError::EmptySet);
        }

        let mut pairs: Vec<String> = Vec::with_capacity(prepared.len());
        for (key, pending) in &prepared {
            registry.commit(pending, state, motion);
            pairs.push(format!("{key}={}", registry.get(group, key, state)?));
        }

        Ok(pairs.join(" "))
    }

    fn start_reset<M: MotionControl>(&mut self, motion: &mut M) {
        // An in-flight homing run is never restarted; the request attaches
        // to it and is answered when it resolves.
        if !motion.homing_active() {
            motion.begin_homing();
        }
        self.reset_pending = true;
        self.last_keepalive_ms = self.clock.ms_since(self.epoch);
    }

    fn finish_reset<M: MotionControl>(
        &mut self,
        state: &mut PlantState,
        registry: &FieldRegistry,
        motion: &mut M,
    ) {
        self.reset_pending = false;

        if state.errcode == Fault::HomingFailed {
            self.write_frame("! homing failed");
            return;
        }

        // Back to defaults, but keep what homing just measured and open the
        // position limit up to the measured ceiling.
        let hw_max_x = state.hw_max_x;
        let full_length = state.full_length_meters;
        registry.reset_all(state, motion);
        state.hw_max_x = hw_max_x;
        state.full_length_meters = full_length;
        state.max_x = hw_max_x;
        state.errcode = Fault::NoError;
        for latch in &self.sensor_faults {
            latch.store(false, Ordering::Relaxed);
        }

        self.log(&format!(
            "full length: {full_length:.5} m, valid x range: {:.5} ... {hw_max_x:.5}",
            -hw_max_x
        ));
        self.respond_ok("");
    }

    fn respond_ok(&mut self, text: &str) {
        if text.is_empty() {
            self.write_frame("+");
        } else {
            self.write_frame(&format!("+ {text}"));
        }
    }

    fn respond_err(&mut self, e: &ValidationError) {
        tracing::debug!(error = %e, "request rejected");
        self.write_frame(&format!("! {e}"));
    }

    fn log(&mut self, text: &str) {
        tracing::info!("{text}");
        self.write_frame(&format!("# {text}"));
    }

    fn write_frame(&mut self, line: &str) {
        if let Err(e) = self.transport.write_line(line) {
            tracing::warn!(error = %e, "transport write failed");
        }
    }
}
