use cartpole_config::load_toml;
use rstest::rstest;

#[test]
fn empty_file_is_a_valid_config() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should pass validation");
    assert_eq!(cfg.stepper.full_steps_per_meter, 1666);
    assert_eq!(cfg.stepper.microsteps, 16);
    assert_eq!(cfg.runner.tick_rate_hz, 200);
}

#[test]
fn omitted_sections_fall_back_to_defaults() {
    let toml = r#"
[stepper]
homing_speed = 0.2
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert!((cfg.stepper.homing_speed - 0.2).abs() < 1e-6);
    // Untouched sections keep the compiled-in defaults.
    assert!((cfg.limits.max_v - 0.5).abs() < 1e-6);
    assert_eq!(cfg.protocol.keepalive_ms, 250);
}

#[rstest]
#[case("[stepper]\nfull_steps_per_meter = 0", "full_steps_per_meter")]
#[case("[stepper]\nmicrosteps = 0", "microsteps")]
#[case("[stepper]\nhoming_speed = 0.0", "homing_speed")]
#[case("[stepper]\nhoming_accel = -1.0", "homing_accel")]
#[case("[encoder]\nvelocity_window_ms = 0", "velocity_window_ms")]
#[case("[encoder]\nsmoothing_alpha = 0.0", "smoothing_alpha")]
#[case("[encoder]\nsmoothing_alpha = 1.5", "smoothing_alpha")]
#[case("[encoder]\nmax_velocity = 0.0", "max_velocity")]
#[case("[limits]\nmax_v = -0.1", "max_v")]
#[case("[limits]\nhw_max_v = 0.0", "hw_max_v")]
#[case("[limits]\nmax_v = 20.0", "hw_max_v")]
#[case("[limits]\nmax_a = 20.0", "hw_max_a")]
#[case("[protocol]\nkeepalive_ms = 0", "keepalive_ms")]
#[case("[runner]\ntick_rate_hz = 0", "tick_rate_hz")]
#[case("[runner]\ntick_rate_hz = 100000", "tick_rate_hz")]
#[case("[logging]\nrotation = \"weekly\"", "rotation")]
fn rejects_bad_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "error {err} does not mention {needle}"
    );
}

#[test]
fn rejects_non_finite_zero_angle() {
    let cfg = load_toml("[encoder]\nzero_angle = inf").expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(format!("{err}").contains("zero_angle"));
}

#[test]
fn logging_section_round_trips() {
    let toml = r#"
[logging]
file = "logs/cartpole.log"
level = "debug"
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.logging.file.as_deref(), Some("logs/cartpole.log"));
    assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}
