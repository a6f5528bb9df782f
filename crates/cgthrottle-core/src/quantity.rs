//! Human-readable throttle quantities.
//!
//! Accepts the Kubernetes quantity notation: an optionally signed decimal
//! number followed by a decimal SI suffix (`n u m k M G T P E`), a binary
//! suffix (`Ki Mi Gi Ti Pi Ei`), or a decimal exponent (`e3`, `E-2`).
//! Fractional results round up to the next whole unit. The keywords `max`
//! and `unlimited` (any case) mean no limit.

use cgthrottle_common::constants::UNLIMITED_KEYWORDS;
use cgthrottle_common::error::{QuantityError, Result, ThrottleError};
use cgthrottle_common::types::IoLimit;

/// Integer parts with more digits than this exceed `u64` before any scaling.
const MAX_INTEGER_DIGITS: i128 = 20;

/// A fraction starting with more zeros than this stays below one even after
/// the largest binary scale (`2^60 < 10^19`).
const MAX_FRACTION_ZEROS: usize = 19;

/// Characters that may start a quantity suffix.
const SUFFIX_CHARS: &str = "eEinumkKMGTP";

/// Scale a suffix applies to the number in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    /// Multiply by `10^n`.
    Decimal(i64),
    /// Multiply by `2^n`.
    Binary(u32),
}

/// Parses a throttle value from a configuration.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`ThrottleError::InvalidValue`] if the text is empty or is not a
/// valid non-negative quantity that fits in 64 bits.
pub fn parse_value(text: &str) -> Result<IoLimit> {
    let value = text.trim();
    if UNLIMITED_KEYWORDS
        .iter()
        .any(|keyword| value.eq_ignore_ascii_case(keyword))
    {
        return Ok(IoLimit::Unlimited);
    }

    let bounded = parse_quantity(value).map_err(|source| ThrottleError::InvalidValue {
        value: value.to_owned(),
        source,
    })?;
    tracing::trace!(value, bounded, "parsed quantity");
    Ok(IoLimit::Bounded(bounded))
}

/// Parses a quantity such as `50M`, `1.5Gi`, or `2e3` into whole units.
///
/// # Errors
///
/// Returns a [`QuantityError`] describing why the text was rejected.
pub fn parse_quantity(text: &str) -> std::result::Result<u64, QuantityError> {
    if text.is_empty() {
        return Err(QuantityError::Empty);
    }

    let (negative, rest) = match text.strip_prefix('-') {
        Some(unsigned) => (true, unsigned),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let int_len = leading_digits(rest);
    let (int_digits, rest) = rest.split_at(int_len);
    let (frac_digits, suffix) = match rest.strip_prefix('.') {
        Some(after_dot) => after_dot.split_at(leading_digits(after_dot)),
        None => ("", rest),
    };
    if int_digits.is_empty() && frac_digits.is_empty() {
        return Err(QuantityError::Format);
    }
    check_suffix_shape(suffix)?;
    let scale = interpret_suffix(suffix)?;

    let padded = format!("{int_digits}{frac_digits}");
    let significant = padded.trim_start_matches('0');
    let leading_zeros = padded.len() - significant.len();
    let digits = significant.trim_end_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if negative {
        return Err(QuantityError::Negative);
    }

    let (exp10, shift) = match scale {
        Scale::Decimal(exp) => (exp, 0),
        Scale::Binary(shift) => (0, shift),
    };
    // Position of the decimal point within `digits`; a decimal exponent
    // only moves it.
    let point = to_i128(int_digits.len())? - to_i128(leading_zeros)? + i128::from(exp10);
    let value = round_up(digits, point, shift)?;
    u64::try_from(value).map_err(|_| QuantityError::Overflow)
}

fn to_i128(len: usize) -> std::result::Result<i128, QuantityError> {
    i128::try_from(len).map_err(|_| QuantityError::Overflow)
}

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

/// Rejects anything outside `[eEinumkKMGTP]*[-+]?[0-9]*`.
fn check_suffix_shape(suffix: &str) -> std::result::Result<(), QuantityError> {
    let tail = suffix.trim_start_matches(|c: char| SUFFIX_CHARS.contains(c));
    let tail = tail.strip_prefix(['-', '+']).unwrap_or(tail);
    if tail.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(QuantityError::Format)
    }
}

fn interpret_suffix(suffix: &str) -> std::result::Result<Scale, QuantityError> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        "Ki" => Scale::Binary(10),
        "Mi" => Scale::Binary(20),
        "Gi" => Scale::Binary(30),
        "Ti" => Scale::Binary(40),
        "Pi" => Scale::Binary(50),
        "Ei" => Scale::Binary(60),
        other => {
            let exponent = other
                .strip_prefix(['e', 'E'])
                .filter(|exp| !exp.is_empty())
                .and_then(|exp| exp.parse::<i64>().ok())
                .ok_or_else(|| QuantityError::Suffix(other.to_owned()))?;
            Scale::Decimal(exponent)
        }
    };
    Ok(scale)
}

/// Computes `ceil(0.<digits> * 10^point * 2^shift)`.
///
/// `digits` has no leading or trailing zeros and is not empty.
fn round_up(digits: &str, point: i128, shift: u32) -> std::result::Result<u128, QuantityError> {
    let factor = 1u128 << shift;
    if point <= 0 {
        let zeros = usize::try_from(-point)
            .ok()
            .filter(|zeros| *zeros <= MAX_FRACTION_ZEROS);
        // A positive value too small to reach one rounds up to one.
        return Ok(zeros.map_or(1, |zeros| fraction_ceil(zeros, digits, factor)));
    }
    if point > MAX_INTEGER_DIGITS {
        return Err(QuantityError::Overflow);
    }

    let point = usize::try_from(point).map_err(|_| QuantityError::Overflow)?;
    let (int_digits, frac_digits) = digits.split_at(point.min(digits.len()));
    let padding = u32::try_from(point - int_digits.len()).map_err(|_| QuantityError::Overflow)?;
    let int: u128 = int_digits.parse().map_err(|_| QuantityError::Format)?;

    int.checked_mul(10u128.pow(padding))
        .and_then(|int| int.checked_mul(factor))
        .and_then(|int| int.checked_add(fraction_ceil(0, frac_digits, factor)))
        .ok_or(QuantityError::Overflow)
}

/// Computes `ceil(0.<zeros><digits> * factor)` exactly with schoolbook
/// multiplication, least significant digit first.
fn fraction_ceil(zeros: usize, digits: &str, factor: u128) -> u128 {
    let mut carry = 0u128;
    let mut remainder = false;
    for digit in digits.bytes().rev() {
        let product = u128::from(digit - b'0') * factor + carry;
        remainder |= product % 10 != 0;
        carry = product / 10;
    }
    for _ in 0..zeros {
        remainder |= carry % 10 != 0;
        carry /= 10;
    }
    carry + u128::from(remainder)
}
