use std::sync::Arc;
use std::time::Duration;

use cartpole_core::mocks::{ManualClock, PipeHost, PipeTransport};
use cartpole_core::protocol::MotionControl;
use cartpole_core::registry::MotionHooks;
use cartpole_core::{Fault, FieldRegistry, PlantState, ProtocolCfg, RequestDispatcher};

/// Motion double whose homing flag the test script flips by hand.
#[derive(Default)]
struct ScriptedMotion {
    homing: bool,
    homing_starts: usize,
    speeds: Vec<f32>,
    positions: Vec<f32>,
}

impl MotionHooks for ScriptedMotion {
    fn set_max_speed(&mut self, v: f32) {
        self.speeds.push(v);
    }
    fn set_max_accel(&mut self, _a: f32) {}
    fn set_target_position(&mut self, x: f32) {
        self.positions.push(x);
    }
    fn set_debug_led(&mut self, _on: bool) {}
}

impl MotionControl for ScriptedMotion {
    fn begin_homing(&mut self) {
        self.homing = true;
        self.homing_starts += 1;
    }
    fn homing_active(&self) -> bool {
        self.homing
    }
}

struct Harness {
    dispatcher: RequestDispatcher<PipeTransport>,
    host: PipeHost,
    clock: ManualClock,
    state: PlantState,
    registry: FieldRegistry,
    motion: ScriptedMotion,
}

impl Harness {
    fn new() -> Self {
        let state = PlantState {
            errcode: Fault::NoError,
            hw_max_x: 0.2,
            max_x: 0.15,
            ..PlantState::default()
        };
        let registry = FieldRegistry::new(&state);

        let clock = ManualClock::new();
        let transport = PipeTransport::new();
        let host = transport.host();
        let dispatcher =
            RequestDispatcher::new(transport, ProtocolCfg::default(), Arc::new(clock.clone()));
        // Construction writes the banner; drop it so tests see only their own
        // traffic.
        host.take_lines();

        Self {
            dispatcher,
            host,
            clock,
            state,
            registry,
            motion: ScriptedMotion::default(),
        }
    }

    /// Send one line and return everything written in response.
    fn request(&mut self, line: &str) -> Vec<String> {
        self.host.push_line(line);
        self.dispatcher
            .poll(&mut self.state, &self.registry, &mut self.motion);
        self.host.take_lines()
    }

    fn poll(&mut self) -> Vec<String> {
        self.dispatcher
            .poll(&mut self.state, &self.registry, &mut self.motion);
        self.host.take_lines()
    }
}

#[test]
fn construction_emits_the_banner() {
    let transport = PipeTransport::new();
    let host = transport.host();
    let _dispatcher = RequestDispatcher::new(
        transport,
        ProtocolCfg::default(),
        Arc::new(ManualClock::new()),
    );
    assert_eq!(host.lines(), ["# cartpole controller started"]);
}

#[test]
fn get_single_key() {
    let mut h = Harness::new();
    assert_eq!(h.request("get state errcode"), ["+ errcode=0"]);
}

#[test]
fn get_without_keys_returns_whole_group() {
    let mut h = Harness::new();
    let lines = h.request("get target");
    assert_eq!(lines, ["+ trgt_x=0.00000 trgt_v=0.00000 trgt_a=0.00000"]);
}

#[test]
fn get_returns_requested_keys_in_request_order() {
    let mut h = Harness::new();
    let lines = h.request("get state pole_v curr_x");
    assert_eq!(lines, ["+ pole_v=0.00000 curr_x=0.00000"]);
}

#[test]
fn input_is_lowercased_on_receipt() {
    let mut h = Harness::new();
    assert_eq!(h.request("GET STATE ERRCODE"), ["+ errcode=0"]);
}

#[test]
fn set_commits_and_echoes_the_committed_value() {
    let mut h = Harness::new();
    let lines = h.request("set config max_v=2.0");
    assert_eq!(lines, ["+ max_v=2.00000"]);
    assert_eq!(h.motion.speeds, [2.0]);
    assert_eq!(h.request("get config max_v"), ["+ max_v=2.00000"]);
}

#[test]
fn set_target_forwards_move_command() {
    let mut h = Harness::new();
    assert_eq!(h.request("set target trgt_x=0.1"), ["+ trgt_x=0.10000"]);
    assert_eq!(h.motion.positions, [0.1]);
}

#[test]
fn multi_key_set_is_all_or_nothing() {
    let mut h = Harness::new();
    // The second pair fails range validation, so the first must not commit.
    let lines = h.request("set target trgt_v=0.1 trgt_x=9.9");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with('!'), "line = {}", lines[0]);
    assert!(h.state.trgt_v.abs() < 1e-6, "partial commit leaked");
    assert!(h.motion.positions.is_empty());
    assert_eq!(h.state.errcode, Fault::XOverflow);
}

#[test]
fn multi_key_set_commits_in_request_order() {
    let mut h = Harness::new();
    let lines = h.request("set config max_v=2.0 max_a=3.0 clamp_x=true");
    assert_eq!(lines, ["+ max_v=2.00000 max_a=3.00000 clamp_x=true"]);
}

#[test]
fn malformed_pair_is_rejected() {
    let mut h = Harness::new();
    let lines = h.request("set config max_v");
    assert_eq!(lines, ["! incorrect key-value pair format: max_v"]);
}

#[test]
fn set_without_pairs_is_rejected() {
    let mut h = Harness::new();
    let lines = h.request("set config");
    assert_eq!(lines, ["! set requires at least one key=value pair"]);
}

#[test]
fn unknown_command_is_rejected() {
    let mut h = Harness::new();
    let lines = h.request("launch config");
    assert_eq!(lines, ["! unknown command: launch"]);
}

#[test]
fn unknown_group_then_next_command_still_works() {
    let mut h = Harness::new();
    assert_eq!(h.request("get bogus foo"), ["! unknown group: bogus"]);
    assert_eq!(h.request("get state errcode"), ["+ errcode=0"]);
}

#[test]
fn readonly_write_is_rejected_with_one_line() {
    let mut h = Harness::new();
    let lines = h.request("set state curr_x=1.0");
    assert_eq!(lines, ["! readonly violation"]);
}

#[test]
fn overlong_line_is_rejected() {
    let mut h = Harness::new();
    let long = "get state ".to_string() + &"x".repeat(300);
    let lines = h.request(&long);
    assert_eq!(lines, ["! request line too long"]);
}

#[test]
fn reset_defers_response_and_emits_keepalives() {
    let mut h = Harness::new();

    assert!(h.request("reset").is_empty(), "no response before homing ends");
    assert_eq!(h.motion.homing_starts, 1);
    assert!(h.dispatcher.reset_in_flight());

    // No keep-alive before the interval has elapsed.
    h.clock.advance(Duration::from_millis(100));
    assert!(h.poll().is_empty());

    h.clock.advance(Duration::from_millis(200));
    assert_eq!(h.poll(), ["~"]);

    h.clock.advance(Duration::from_millis(300));
    assert_eq!(h.poll(), ["~"]);

    // Homing resolves; the deferred response arrives on the next poll.
    h.motion.homing = false;
    h.state.hw_max_x = 0.25;
    h.state.full_length_meters = 0.5;
    h.state.errcode = Fault::NoError;
    let lines = h.poll();
    assert_eq!(lines.len(), 2, "lines = {lines:?}");
    assert!(lines[0].starts_with("# full length: 0.50000"));
    assert_eq!(lines[1], "+");
    assert!(!h.dispatcher.reset_in_flight());

    // Registry defaults are back, except what homing just measured.
    assert!((h.state.max_x - 0.25).abs() < 1e-6, "max_x opens to hw_max_x");
    assert!((h.state.hw_max_x - 0.25).abs() < 1e-6);
    assert_eq!(h.state.errcode, Fault::NoError);
}

#[test]
fn commands_during_reset_are_deferred_until_completion() {
    let mut h = Harness::new();
    h.request("reset");

    // Queued while homing; must not be answered yet.
    h.host.push_line("get state errcode");
    assert!(h.poll().is_empty());

    h.motion.homing = false;
    h.state.errcode = Fault::NoError;
    let lines = h.poll();
    assert_eq!(*lines.last().unwrap(), "+");

    // The queued command is served on the following poll.
    assert_eq!(h.poll(), ["+ errcode=0"]);
}

#[test]
fn reset_attaches_to_homing_already_in_progress() {
    let mut h = Harness::new();
    h.motion.homing = true;

    assert!(h.request("reset").is_empty());
    // The in-flight run is not restarted.
    assert_eq!(h.motion.homing_starts, 0);
    assert!(h.dispatcher.reset_in_flight());

    h.motion.homing = false;
    h.state.errcode = Fault::NoError;
    assert_eq!(*h.poll().last().unwrap(), "+");
}

#[test]
fn failed_homing_reports_error_and_keeps_fault() {
    let mut h = Harness::new();
    h.request("reset");

    h.motion.homing = false;
    h.state.errcode = Fault::HomingFailed;
    assert_eq!(h.poll(), ["! homing failed"]);
    assert_eq!(h.state.errcode, Fault::HomingFailed);
    // Defaults were not restored on the failure path.
    assert!((h.state.max_x - 0.15).abs() < 1e-6);
}

#[test]
fn reset_clears_registered_sensor_fault_latches() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let mut h = Harness::new();
    let latch = Arc::new(AtomicBool::new(true));
    h.dispatcher.register_sensor_fault(latch.clone());

    h.request("reset");
    h.motion.homing = false;
    h.state.errcode = Fault::NoError;
    h.poll();

    assert!(!latch.load(Ordering::Relaxed));
}
