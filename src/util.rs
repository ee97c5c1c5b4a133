/// Milliseconds expressed as fractional minutes.
pub fn minutes(ms: u64) -> f64 {
    ms as f64 / 1000.0 / 60.0
}

/// Round to two decimal places, the precision every speed and time readout uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Characters per minute for `chars` typed over `elapsed_ms`.
///
/// Zero elapsed time yields `0.0` rather than infinity.
pub fn chars_per_minute(chars: usize, elapsed_ms: u64) -> f64 {
    let mins = minutes(elapsed_ms);
    if mins == 0.0 {
        0.0
    } else {
        round2(chars as f64 / mins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes() {
        assert_eq!(minutes(0), 0.0);
        assert_eq!(minutes(30_000), 0.5);
        assert_eq!(minutes(90_000), 1.5);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.235_1), 1.24);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn test_cpm_half_minute() {
        assert_eq!(chars_per_minute(50, 30_000), 100.0);
    }

    #[test]
    fn test_cpm_zero_elapsed() {
        assert_eq!(chars_per_minute(50, 0), 0.0);
        assert_eq!(chars_per_minute(0, 0), 0.0);
    }

    #[test]
    fn test_cpm_rounds_to_two_places() {
        // 7 chars in 45s => 9.333... cpm
        assert_eq!(chars_per_minute(7, 45_000), 9.33);
    }
}
