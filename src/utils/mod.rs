//! 辅助工具
//!
//! Logger setup and lenient integer parsing of worker-written values

pub mod logger;

/// Parse the leading integer of a string the way loosely-typed producers
/// expect: surrounding whitespace is ignored, an optional sign is accepted
/// and parsing stops at the first non-digit. Returns `None` when there are
/// no digits at all.
pub fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end].parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
