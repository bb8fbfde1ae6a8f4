pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Rotary magnetic angle sensor delivering raw counts over a fixed bit width
/// (12 bit for the AS5600: 0..4095 per revolution).
pub trait AngleSensor {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>>;
}

impl<S: AngleSensor + ?Sized> AngleSensor for Box<S> {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_raw()
    }
}

/// Step/direction motion driver with hardware-paced ramps.
///
/// Positions and speeds are in step units; the motion layer owns the
/// conversion to meters. Counter bookkeeping is local and infallible; the
/// fallible seams of the system are the sensor and transport traits.
pub trait StepperDriver {
    /// Energize the output stage.
    fn enable_outputs(&mut self);
    /// De-energize the output stage (freewheel).
    fn disable_outputs(&mut self);

    fn set_speed_hz(&mut self, steps_per_sec: u32);
    fn set_acceleration(&mut self, steps_per_sec2: u32);

    /// Move to an absolute position in steps using the configured ramp.
    fn move_to(&mut self, steps: i32);
    /// Run continuously towards positive positions.
    fn run_forward(&mut self);
    /// Run continuously towards negative positions.
    fn run_backward(&mut self);
    /// Immediate stop, keeping the current step counter value.
    fn force_stop(&mut self);

    /// Rebase the step counter without moving.
    fn set_current_position(&mut self, steps: i32);
    fn current_position(&mut self) -> i32;
    /// Signed speed in milli-steps per second.
    fn current_speed_millihz(&mut self) -> i32;
    /// Signed ramp acceleration in steps per second squared.
    fn current_acceleration(&mut self) -> i32;
    fn is_running(&mut self) -> bool;

    /// Stall-guard output of the driver IC (missed steps).
    fn stall_detected(&mut self) -> bool;
}

/// Travel limit switches at both ends of the rail.
pub trait LimitSwitches {
    fn left(&mut self) -> bool;
    fn right(&mut self) -> bool;
}

/// Optional single-axis accelerometer channel.
pub trait Accelerometer {
    fn read_accel(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Byte-oriented request/response link to the host.
///
/// `poll_byte` must never block; the tick loop calls it once per received
/// byte and moves on when the link is idle.
pub trait Transport {
    fn poll_byte(&mut self) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>>;
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
