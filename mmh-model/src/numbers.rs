//! Numeric conversion helpers centralizing lossy casts.

use num_traits::cast::cast;

/// Narrow an i64 into the u32 range, saturating at both ends.
#[must_use]
pub fn saturating_u32(value: i64) -> u32 {
    let clamped = value.clamp(0, i64::from(u32::MAX));
    cast::<i64, u32>(clamped).unwrap_or(u32::MAX)
}

/// Convert usize to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(f64::MAX)
}

/// Round to a fixed number of decimal places, half away from zero.
#[must_use]
pub fn round_to_places(value: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_u32_clamps_both_ends() {
        assert_eq!(saturating_u32(-4), 0);
        assert_eq!(saturating_u32(17), 17);
        assert_eq!(saturating_u32(i64::MAX), u32::MAX);
    }

    #[test]
    fn rounding_to_five_places() {
        assert!((round_to_places(0.999_996, 5) - 1.0).abs() < f64::EPSILON);
        assert!((round_to_places(0.999_994, 5) - 0.999_99).abs() < 1e-12);
    }

    #[test]
    fn widening_casts() {
        assert!((usize_to_f64(12) - 12.0).abs() < f64::EPSILON);
    }
}
