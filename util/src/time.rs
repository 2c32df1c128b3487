//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a number of seconds into a `std::time::Duration`, clamping negative and non-finite
/// values to zero and values too large for a `Duration` to the largest whole number of seconds.
pub fn seconds_to_std_duration(seconds: f64) -> std::time::Duration {
    if !(seconds.is_finite() && seconds > 0.0) {
        std::time::Duration::from_secs(0)
    } else if seconds >= u64::MAX as f64 {
        std::time::Duration::from_secs(u64::MAX)
    } else {
        std::time::Duration::from_secs_f64(seconds)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(duration_to_seconds(chrono::Duration::seconds(5)), Some(5.0));
        assert_eq!(duration_to_seconds(chrono::Duration::milliseconds(250)), Some(0.25));
        assert_eq!(duration_to_seconds(chrono::Duration::max_value()), None);
    }

    #[test]
    fn test_seconds_to_std_duration() {
        assert_eq!(seconds_to_std_duration(5.0), std::time::Duration::from_secs(5));
        assert_eq!(seconds_to_std_duration(-1.0), std::time::Duration::from_secs(0));
        assert_eq!(seconds_to_std_duration(f64::NAN), std::time::Duration::from_secs(0));
        assert_eq!(seconds_to_std_duration(1e300), std::time::Duration::from_secs(u64::MAX));
    }
}
