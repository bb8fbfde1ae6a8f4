//! Common time/unit helpers for cartpole_core.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Compute the period in microseconds for a given tick rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Drive geometry: step resolution per meter of travel.
#[inline]
pub fn steps_per_meter(full_steps_per_meter: u32, microsteps: u32) -> u32 {
    full_steps_per_meter.saturating_mul(microsteps.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_us_handles_extremes() {
        assert_eq!(period_us(1), 1_000_000);
        assert_eq!(period_us(200), 5_000);
        assert_eq!(period_us(0), 1_000_000);
    }

    #[test]
    fn steps_per_meter_multiplies() {
        assert_eq!(steps_per_meter(1666, 16), 26_656);
        // microsteps 0 means full stepping
        assert_eq!(steps_per_meter(1666, 0), 1666);
    }
}
