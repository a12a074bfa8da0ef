//! Numeric formatting: natural (trimmed) and fixed width/decimals.

/// Decimal places rendered before rounding, enough to see past binary noise
/// (2.995 is stored as 2.99499999999999988...).
const WORKING_PLACES: usize = 10;

/// Shortest decimal rendering with no leading space.
///
/// # Examples
/// ```
/// use shim_core::numfmt::format_natural;
/// assert_eq!(format_natural(3.0), "3");
/// assert_eq!(format_natural(-0.25), "-0.25");
/// ```
pub fn format_natural(value: f64) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-INF" } else { "INF" }.to_string();
    }
    if value == 0.0 {
        // Also folds -0
        return "0".to_string();
    }
    format!("{}", value)
}

/// Render `value` right-aligned in `width` columns with `decimals` places.
///
/// The fraction is rounded half-up on the digit after the last kept place,
/// carrying into the integer part when needed. Whole numbers render without
/// a decimal point. A result wider than `width` becomes `width` asterisks.
///
/// # Examples
/// ```
/// use shim_core::numfmt::format_fixed;
/// assert_eq!(format_fixed(2.995, 6, 2), "  3.00");
/// assert_eq!(format_fixed(12345.0, 3, 0), "***");
/// ```
pub fn format_fixed(value: f64, width: usize, decimals: usize) -> String {
    if !value.is_finite() {
        return overflow(width);
    }

    let magnitude = value.abs();
    let has_fraction = magnitude.fract() != 0.0;
    let text = format!("{:.*}", WORKING_PLACES.max(decimals + 1), magnitude);
    let (int_text, frac_text) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut int_digits: Vec<u8> = int_text.bytes().collect();
    let mut frac_digits: Vec<u8> = frac_text.bytes().collect();

    let round_up = frac_digits.get(decimals).is_some_and(|&d| d >= b'5');
    frac_digits.truncate(decimals);
    if round_up && !increment(&mut frac_digits) && !increment(&mut int_digits) {
        int_digits.insert(0, b'1');
    }

    let shown_fraction: &[u8] = if decimals > 0 && has_fraction {
        &frac_digits
    } else {
        &[]
    };
    let all_zero = int_digits.iter().chain(shown_fraction).all(|&d| d == b'0');

    let mut out = String::with_capacity(width);
    if value < 0.0 && !all_zero {
        out.push('-');
    }
    out.extend(int_digits.iter().map(|&d| d as char));
    if !shown_fraction.is_empty() {
        out.push('.');
        out.extend(shown_fraction.iter().map(|&d| d as char));
    }

    if out.len() > width {
        return overflow(width);
    }
    format!("{:>width$}", out, width = width)
}

/// Add one to a run of ASCII digits. Returns false if the carry falls off the
/// front (every digit was 9, now all 0).
fn increment(digits: &mut [u8]) -> bool {
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return true;
        }
    }
    false
}

fn overflow(width: usize) -> String {
    "*".repeat(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural() {
        assert_eq!(format_natural(0.0), "0");
        assert_eq!(format_natural(-0.0), "0");
        assert_eq!(format_natural(42.0), "42");
        assert_eq!(format_natural(0.1), "0.1");
        assert_eq!(format_natural(-1.5), "-1.5");
        assert_eq!(format_natural(f64::INFINITY), "INF");
    }

    #[test]
    fn test_fixed_carry_propagates() {
        assert_eq!(format_fixed(2.995, 4, 2), "3.00");
        assert_eq!(format_fixed(9.9996, 7, 3), " 10.000");
        assert_eq!(format_fixed(99.95, 5, 1), "100.0");
        assert_eq!(format_fixed(0.5, 1, 0), "1");
    }

    #[test]
    fn test_fixed_round_half_up() {
        assert_eq!(format_fixed(1.25, 4, 1), " 1.3");
        assert_eq!(format_fixed(1.24, 4, 1), " 1.2");
        assert_eq!(format_fixed(-1.25, 5, 1), " -1.3");
        assert_eq!(format_fixed(0.004, 5, 2), " 0.00");
    }

    #[test]
    fn test_fixed_overflow() {
        assert_eq!(format_fixed(12345.678, 6, 2), "******");
        assert_eq!(format_fixed(99.95, 4, 1), "****"); // carry widens it
        assert_eq!(format_fixed(-5.0, 1, 0), "*");
        assert_eq!(format_fixed(f64::NAN, 3, 0), "***");
    }

    #[test]
    fn test_fixed_zero_and_whole() {
        assert_eq!(format_fixed(0.0, 1, 0), "0");
        assert_eq!(format_fixed(0.0, 3, 2), "  0");
        assert_eq!(format_fixed(7.0, 4, 2), "   7");
        assert_eq!(format_fixed(-0.001, 5, 2), " 0.00");
    }

    #[test]
    fn test_fixed_pads_left() {
        assert_eq!(format_fixed(3.14159, 8, 3), "   3.142");
        assert_eq!(format_fixed(-42.0, 6, 0), "   -42");
    }
}
