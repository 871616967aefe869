//! Size-suffix parsing and formatting.
//!
//! Suffixes are decimal powers of 1000: `B = 1`, `K = 10^3`, `M = 10^6`,
//! `G = 10^9`, `T = 10^12`, case-insensitive. Binary `KiB`-style units are
//! deliberately not recognized.

/// Multiplier for a single suffix character, if recognized.
pub(crate) fn multiplier(unit: char) -> Option<i64> {
    match unit.to_ascii_uppercase() {
        'B' => Some(1),
        'K' => Some(1_000),
        'M' => Some(1_000_000),
        'G' => Some(1_000_000_000),
        'T' => Some(1_000_000_000_000),
        _ => None,
    }
}

/// Apply a suffix to a (possibly fractional) magnitude. Returns `None` for
/// unknown suffixes and for products that are not a whole number of bytes
/// (`1.5K` is 1500 and fine, `1.5B` is not).
pub(crate) fn apply_suffix(magnitude: f64, unit: char) -> Option<i64> {
    let mult = multiplier(unit)?;
    let bytes = magnitude * mult as f64;
    if !bytes.is_finite() || bytes.fract() != 0.0 || bytes.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(bytes as i64)
}

/// Parse a size string such as `"10M"` or `"1.5K"` into bytes. A bare
/// number is taken as bytes. Returns `None` if the string is not a valid
/// size.
pub fn parse_size(input: &str) -> Option<i64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let (num, unit) = match s.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - c.len_utf8()], c),
        _ => (s, 'B'),
    };
    let magnitude: f64 = num.trim_end().parse().ok()?;
    apply_suffix(magnitude, unit)
}

/// Render a byte count in human form using the same decimal suffix table,
/// e.g. `2000` → `"2K"`, `1500` → `"1.5K"`.
pub fn format_size(bytes: i64) -> String {
    if bytes == 0 {
        return "0".to_string();
    }
    const UNITS: [&str; 5] = ["", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut idx = 0;
    while value.abs() >= 1000.0 && idx < UNITS.len() - 1 {
        value /= 1000.0;
        idx += 1;
    }
    if value == value.trunc() {
        format!("{}{}", value as i64, UNITS[idx])
    } else {
        format!("{:.1}{}", value, UNITS[idx])
    }
}
