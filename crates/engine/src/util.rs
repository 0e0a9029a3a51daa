//! Internal helpers shared by the models and the repository layer.
//!
//! These utilities are **not** part of the public API.

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Generate a fresh primary key.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Canonical form used to store emails: trimmed, NFC, lowercase.
pub(crate) fn normalize_email(value: &str) -> ResultEngine<String> {
    let email: String = value.trim().nfc().collect::<String>().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(EngineError::Validation(format!("invalid email: {value}")));
    }
    Ok(email)
}

/// Trim and reject empty required text.
pub(crate) fn normalize_required(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trim optional text, mapping blank input to `None`.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `10^scale` for the supported fixed-point scales.
pub(crate) fn pow10(scale: u32) -> Option<i64> {
    10i64.checked_pow(scale)
}

/// Parse a decimal string into a fixed-point integer with `scale` fractional
/// digits.
///
/// Accepts `.` or `,` as separator and an optional sign. Inputs with more
/// fractional digits than `scale` are rejected rather than rounded.
pub(crate) fn parse_fixed(input: &str, scale: u32) -> Result<i64, String> {
    let trimmed = input.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed).trim_start()),
    };
    if rest.is_empty() {
        return Err("empty value".to_string());
    }

    let normalized = rest.replace(',', ".");
    let (whole, frac) = match normalized.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (normalized.as_str(), ""),
    };
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() || !digits_only(whole) || !digits_only(frac) {
        return Err("invalid value".to_string());
    }
    if frac.len() > scale as usize {
        return Err(format!("too many decimals (max {scale})"));
    }

    let factor = pow10(scale).ok_or_else(|| "scale too large".to_string())?;
    let whole: i64 = whole.parse().map_err(|_| "value too large".to_string())?;
    let frac_value: i64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = scale as usize);
        padded.parse().map_err(|_| "invalid value".to_string())?
    };

    let magnitude = whole
        .checked_mul(factor)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| "value too large".to_string())?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Render a fixed-point integer with exactly `scale` fractional digits.
pub(crate) fn format_fixed(value: i64, scale: u32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    if scale == 0 {
        return format!("{sign}{abs}");
    }
    let factor = 10u64.pow(scale);
    let width = scale as usize;
    format!("{sign}{}.{:0width$}", abs / factor, abs % factor)
}

/// `value / divisor` rounded half away from zero. `divisor` must be > 0.
pub(crate) fn div_round_half_away(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    let remainder = value % divisor;
    if remainder.abs() * 2 >= divisor {
        quotient + value.signum()
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fixed_respects_scale() {
        assert_eq!(parse_fixed("1.5", 2), Ok(150));
        assert_eq!(parse_fixed("1,25", 2), Ok(125));
        assert_eq!(parse_fixed("-0.001", 3), Ok(-1));
        assert_eq!(parse_fixed("+7", 0), Ok(7));
        assert!(parse_fixed("1.5", 0).is_err());
        assert!(parse_fixed("", 2).is_err());
        assert!(parse_fixed("1.2.3", 2).is_err());
        assert!(parse_fixed("abc", 2).is_err());
    }

    #[test]
    fn format_fixed_pads_fraction() {
        assert_eq!(format_fixed(5, 2), "0.05");
        assert_eq!(format_fixed(-1234, 3), "-1.234");
        assert_eq!(format_fixed(42, 0), "42");
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(div_round_half_away(250, 100), 3);
        assert_eq!(div_round_half_away(249, 100), 2);
        assert_eq!(div_round_half_away(-250, 100), -3);
        assert_eq!(div_round_half_away(-249, 100), -2);
    }

    #[test]
    fn emails_are_canonicalized() {
        assert_eq!(
            normalize_email("  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
        assert!(normalize_email("nobody").is_err());
    }
}
