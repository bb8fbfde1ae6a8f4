use thiserror::Error;

/// Plant-level fault code, exposed to the host as the `errcode` state field.
///
/// Mutually exclusive; wire format is the integer discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Fault {
    /// Nominal.
    NoError = 0,
    /// Initial/post-disable state; homing is required ("reset" command).
    #[default]
    NeedReset = 1,
    /// X overshoot detected, motion is disabled.
    XOverflow = 2,
    /// V overshoot detected, motion is disabled.
    VOverflow = 3,
    /// A overshoot detected, motion is disabled.
    AOverflow = 4,
    /// Stall guard triggered (stepper missed steps).
    MotorStalled = 5,
    /// An endstop triggered during normal movement.
    EndstopHit = 6,
    /// Homing could not complete; calibration was not applied.
    HomingFailed = 7,
}

impl Fault {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Fault::NoError => "no error",
            Fault::NeedReset => "need reset",
            Fault::XOverflow => "x overflow",
            Fault::VOverflow => "v overflow",
            Fault::AOverflow => "a overflow",
            Fault::MotorStalled => "motor stalled",
            Fault::EndstopHit => "endstop hit",
            Fault::HomingFailed => "homing failed",
        };
        write!(f, "{name}")
    }
}

/// Rejections raised while handling a single request; reported to the host
/// as one `!` line and never crossing the tick loop boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("failed to parse value: {0}")]
    Parse(String),
    #[error("non-finite values are not allowed")]
    NonFinite,
    #[error("out of range: {value:.5} < {min:.5}")]
    BelowRange { value: f32, min: f32 },
    #[error("out of range: {value:.5} > {max:.5}")]
    AboveRange { value: f32, max: f32 },
    #[error("readonly violation")]
    Readonly,
    #[error("motion disabled (errcode {0})")]
    MotionDisabled(u8),
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("unknown key: {0}")]
    UnknownKey(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("incorrect key-value pair format: {0}")]
    MalformedPair(String),
    #[error("set requires at least one key=value pair")]
    EmptySet,
    #[error("request line too long")]
    LineOverflow,
}

/// Controller assembly rejections.
#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
