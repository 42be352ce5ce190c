//! # Value Units
//!
//! All value in the vault is a `u128` count of the smallest indivisible
//! unit (wei). There is no floating point anywhere in the ledger. The
//! decimal representation (`"1.0"`, `"0.25"`) exists only at the edges:
//! call scripts on the way in, receipts and queries on the way out.
//!
//! [`VALUE_DECIMALS`](crate::config::VALUE_DECIMALS) is 18, so one whole
//! unit is `10^18` wei and `u128` leaves room for ~3.4 * 10^20 whole units.

use thiserror::Error;

use crate::config::VALUE_DECIMALS;

/// Smallest-unit value.
pub type Wei = u128;

/// Number of wei in one whole unit.
pub const WEI_PER_UNIT: Wei = 10u128.pow(VALUE_DECIMALS);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while parsing a decimal amount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    /// The input string is empty (or only a decimal point).
    #[error("empty amount")]
    Empty,

    /// The input contains something other than digits and one `.`.
    #[error("invalid amount '{0}': expected a non-negative decimal number")]
    InvalidFormat(String),

    /// More fractional digits than the unit supports.
    #[error("too many decimal places in '{input}': at most {max} allowed")]
    TooPrecise {
        /// The offending input.
        input: String,
        /// Maximum fractional digits.
        max: u32,
    },

    /// The value does not fit in a `u128`.
    #[error("amount '{0}' overflows")]
    Overflow(String),
}

/// Parse a decimal string into wei.
///
/// ```
/// use vault_protocol::amount::{parse_units, WEI_PER_UNIT};
///
/// assert_eq!(parse_units("1.0").unwrap(), WEI_PER_UNIT);
/// assert_eq!(parse_units("0.5").unwrap(), WEI_PER_UNIT / 2);
/// ```
pub fn parse_units(input: &str) -> Result<Wei, AmountError> {
    let trimmed = input.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Empty);
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::InvalidFormat(input.to_string()));
    }
    if frac.len() > VALUE_DECIMALS as usize {
        return Err(AmountError::TooPrecise {
            input: input.to_string(),
            max: VALUE_DECIMALS,
        });
    }

    let overflow = || AmountError::Overflow(input.to_string());

    let whole_value: Wei = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };

    // Right-pad the fraction to exactly VALUE_DECIMALS digits.
    let frac_value: Wei = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = VALUE_DECIMALS as usize);
        padded.parse().map_err(|_| overflow())?
    };

    whole_value
        .checked_mul(WEI_PER_UNIT)
        .and_then(|w| w.checked_add(frac_value))
        .ok_or_else(overflow)
}

/// Format wei as a decimal string.
///
/// Trailing fractional zeros are trimmed, but at least one fractional
/// digit is kept so the output always reads as a decimal: `1.0`, `0.5`.
pub fn format_units(amount: Wei) -> String {
    let whole = amount / WEI_PER_UNIT;
    let frac = amount % WEI_PER_UNIT;
    let frac_str = format!("{:0>width$}", frac, width = VALUE_DECIMALS as usize);
    let trimmed = frac_str.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{trimmed}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
