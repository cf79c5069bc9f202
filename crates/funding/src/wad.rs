//! Fixed-point amounts with 18 decimals.

use alloy_primitives::U256;

use crate::error::WadError;

pub const WAD_DECIMALS: usize = 18;

fn wad_unit() -> U256 {
    U256::from(10u64).pow(U256::from(WAD_DECIMALS))
}

/// Parses a decimal amount such as `"1.5"` into its 18-decimal integer form.
pub fn parse_wad(input: &str) -> Result<U256, WadError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(WadError::Empty);
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction)
    {
        return Err(WadError::Invalid(text.to_string()));
    }
    if fraction.len() > WAD_DECIMALS {
        return Err(WadError::TooPrecise(text.to_string()));
    }

    let overflow = || WadError::Overflow(text.to_string());
    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| overflow())?
    };
    let fraction = if fraction.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{fraction:0<width$}", width = WAD_DECIMALS);
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };

    whole
        .checked_mul(wad_unit())
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or_else(overflow)
}

/// Full-precision decimal form with trailing zeros removed.
pub fn format_wad(value: U256) -> String {
    format_wad_to(value, WAD_DECIMALS)
}

/// Decimal form truncated to at most `precision` fractional digits.
pub fn format_wad_to(value: U256, precision: usize) -> String {
    let unit = wad_unit();
    let whole = value / unit;
    let fraction = format!("{:0>width$}", (value % unit).to_string(), width = WAD_DECIMALS);
    let fraction = fraction[..precision.min(WAD_DECIMALS)].trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

#[cfg(test)]
#[path = "tests/wad_tests.rs"]
mod tests;
