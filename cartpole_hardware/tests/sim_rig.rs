use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cartpole_hardware::{RigCfg, ScriptedAngleSensor, SimRig};
use cartpole_traits::{AngleSensor, Clock, LimitSwitches, StepperDriver};
use rstest::rstest;

/// Manually-advanced clock; the rig integrates motion lazily against it.
#[derive(Clone)]
struct StepClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl StepClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    fn advance_ms(&self, ms: u64) {
        let mut off = self.offset.lock().unwrap();
        *off += Duration::from_millis(ms);
    }
}

impl Clock for StepClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }

    fn sleep(&self, d: Duration) {
        let mut off = self.offset.lock().unwrap();
        *off += d;
    }
}

fn rig_at(start_frac: f64) -> (SimRig, StepClock) {
    let clock = StepClock::new();
    let rig = SimRig::new(
        RigCfg {
            span_steps: 4000,
            start_frac,
        },
        Arc::new(clock.clone()),
    );
    (rig, clock)
}

#[test]
fn cart_travels_at_commanded_speed() {
    let (rig, clock) = rig_at(0.5);
    let mut driver = rig.driver();

    driver.set_speed_hz(1000);
    driver.run_forward();
    clock.advance_ms(500);

    // 1000 steps/s for 0.5 s from the 2000-step midpoint.
    assert!((rig.cart_steps() - 2500.0).abs() < 1.0);
    assert!(driver.is_running());
}

#[test]
fn move_to_stops_exactly_on_target() {
    let (rig, clock) = rig_at(0.5);
    let mut driver = rig.driver();

    driver.set_speed_hz(1000);
    driver.move_to(2300);
    clock.advance_ms(1000);

    assert!((rig.cart_steps() - 2300.0).abs() < 0.5);
    assert!(!driver.is_running());
    assert_eq!(driver.current_speed_millihz(), 0);
}

#[test]
fn motion_clamps_at_the_rail_ends() {
    let (rig, clock) = rig_at(0.9);
    let mut driver = rig.driver();

    driver.set_speed_hz(2000);
    driver.run_forward();
    clock.advance_ms(5000);

    assert!((rig.cart_steps() - 4000.0).abs() < 0.5);
}

#[rstest]
#[case(0.0, true, false)]
#[case(1.0, false, true)]
#[case(0.5, false, false)]
fn switches_trigger_at_the_ends(
    #[case] start_frac: f64,
    #[case] left: bool,
    #[case] right: bool,
) {
    let (rig, _clock) = rig_at(start_frac);
    let mut switches = rig.switches();
    assert_eq!(switches.left(), left);
    assert_eq!(switches.right(), right);
}

#[test]
fn forced_left_switch_overrides_position() {
    let (rig, _clock) = rig_at(0.5);
    let mut switches = rig.switches();

    assert!(!switches.left());
    rig.force_left_switch(true);
    assert!(switches.left());
    rig.force_left_switch(false);
    assert!(!switches.left());
}

#[test]
fn counter_rebase_moves_the_reported_frame_not_the_cart() {
    let (rig, _clock) = rig_at(0.5);
    let mut driver = rig.driver();

    driver.set_current_position(0);
    assert_eq!(driver.current_position(), 0);
    assert!((rig.cart_steps() - 2000.0).abs() < 0.5, "cart did not move");
}

#[test]
fn move_to_is_interpreted_in_the_rebased_frame() {
    let (rig, clock) = rig_at(0.5);
    let mut driver = rig.driver();

    driver.set_current_position(0);
    driver.set_speed_hz(1000);
    driver.move_to(500);
    clock.advance_ms(1000);

    // Counter 500 corresponds to physical step 2500.
    assert_eq!(driver.current_position(), 500);
    assert!((rig.cart_steps() - 2500.0).abs() < 0.5);
}

#[test]
fn speed_readback_is_signed() {
    let (rig, _clock) = rig_at(0.5);
    let mut driver = rig.driver();

    driver.set_speed_hz(1000);
    driver.run_backward();
    assert_eq!(driver.current_speed_millihz(), -1_000_000);

    driver.force_stop();
    assert_eq!(driver.current_speed_millihz(), 0);
}

#[test]
fn stall_flag_is_test_controlled() {
    let (rig, _clock) = rig_at(0.5);
    let mut driver = rig.driver();

    assert!(!driver.stall_detected());
    rig.set_stalled(true);
    assert!(driver.stall_detected());
}

#[test]
fn scripted_sensor_replays_then_repeats_last() {
    let mut sensor = ScriptedAngleSensor::new([10, 20, 30]);
    assert_eq!(sensor.read_raw().unwrap(), 10);
    assert_eq!(sensor.read_raw().unwrap(), 20);
    assert_eq!(sensor.read_raw().unwrap(), 30);
    assert_eq!(sensor.read_raw().unwrap(), 30);
}
