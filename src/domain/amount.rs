//! Fixed-point amounts.
//!
//! Human-readable decimal amounts are converted to and from integer minor
//! units without going through floating point. The native asset uses 18
//! decimals (1 BERA = 10^18 wei); tokens report their own decimals.

use std::{fmt, str::FromStr};

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Decimals of the native asset.
pub const NATIVE_DECIMALS: u8 = 18;

/// Largest power of ten representable in 256 bits is 10^77.
const MAX_DECIMALS: u8 = 77;

/// Rejections produced before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("Amount is required")]
    EmptyAmount,
    #[error("Invalid amount format: {0}")]
    MalformedAmount(String),
    #[error("Amount must be greater than 0")]
    NonPositiveAmount,
    #[error("Amount has more than {max_decimals} decimal places")]
    TooPrecise { max_decimals: u8 },
    #[error("Amount is too large")]
    AmountOverflow,
}

/// 10^decimals, or `None` when it does not fit in 256 bits.
pub fn ten_pow(decimals: u8) -> Option<U256> {
    if decimals > MAX_DECIMALS {
        return None;
    }
    U256::from(10u64).checked_pow(U256::from(decimals))
}

/// Parse a decimal string (`"1"`, `"0.25"`, `".5"`) into minor units.
///
/// Only ASCII digits and a single `.` are accepted; signs, exponents and
/// fractional digits beyond `decimals` are rejected rather than rounded.
pub fn parse_units(text: &str, decimals: u8) -> Result<U256, ValidationError> {
    let s = text.trim();
    if s.is_empty() {
        return Err(ValidationError::EmptyAmount);
    }

    let (int, frac) = s.split_once('.').unwrap_or((s, ""));
    if int.is_empty() && frac.is_empty() {
        return Err(ValidationError::MalformedAmount(s.to_string()));
    }
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int) || !all_digits(frac) {
        return Err(ValidationError::MalformedAmount(s.to_string()));
    }
    if decimals > MAX_DECIMALS {
        return Err(ValidationError::AmountOverflow);
    }
    if frac.len() > decimals as usize {
        return Err(ValidationError::TooPrecise {
            max_decimals: decimals,
        });
    }

    let digits = format!("{}{:0<width$}", int, frac, width = decimals as usize);
    U256::from_str_radix(&digits, 10).map_err(|_| ValidationError::AmountOverflow)
}

/// Like [`parse_units`], additionally rejecting zero.
pub fn parse_positive(text: &str, decimals: u8) -> Result<U256, ValidationError> {
    let value = parse_units(text, decimals)?;
    if value.is_zero() {
        return Err(ValidationError::NonPositiveAmount);
    }
    Ok(value)
}

/// Render minor units as an exact decimal string with trailing zeros trimmed.
pub fn format_units(value: U256, decimals: u8) -> String {
    let scale = decimals as usize;
    let digits = format!("{:0>width$}", value.to_string(), width = scale + 1);
    let (int, frac) = digits.split_at(digits.len() - scale);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int.to_string()
    } else {
        format!("{}.{}", int, frac)
    }
}

/// A native-asset amount held in wei.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Self = Self(U256::ZERO);

    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    pub fn wei(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_units(s, NATIVE_DECIMALS).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_units(self.0, NATIVE_DECIMALS))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ether(n: u64) -> U256 {
        U256::from(n) * ten_pow(18).unwrap()
    }

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(parse_units("1", 18).unwrap(), ether(1));
        assert_eq!(
            parse_units("0.25", 18).unwrap(),
            U256::from(250_000_000_000_000_000u64)
        );
        assert_eq!(
            parse_units(".5", 18).unwrap(),
            U256::from(500_000_000_000_000_000u64)
        );
        assert_eq!(parse_units(" 2. ", 18).unwrap(), ether(2));
        assert_eq!(parse_units("0.000000000000000001", 18).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(parse_units("", 18), Err(ValidationError::EmptyAmount));
        assert!(matches!(
            parse_units("abc", 18),
            Err(ValidationError::MalformedAmount(_))
        ));
        assert!(matches!(
            parse_units("-1", 18),
            Err(ValidationError::MalformedAmount(_))
        ));
        assert!(matches!(
            parse_units("1e18", 18),
            Err(ValidationError::MalformedAmount(_))
        ));
        assert!(matches!(
            parse_units("1.2.3", 18),
            Err(ValidationError::MalformedAmount(_))
        ));
        assert!(matches!(
            parse_units(".", 18),
            Err(ValidationError::MalformedAmount(_))
        ));
        assert_eq!(
            parse_units("0.0000000000000000001", 18),
            Err(ValidationError::TooPrecise { max_decimals: 18 })
        );
    }

    #[test]
    fn test_parse_positive_rejects_zero() {
        assert_eq!(parse_positive("0", 18), Err(ValidationError::NonPositiveAmount));
        assert_eq!(parse_positive("0.000", 18), Err(ValidationError::NonPositiveAmount));
        assert!(parse_positive("0.1", 18).is_ok());
    }

    #[test]
    fn test_format_trims_trailing_zeros() {
        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(ether(3), 18), "3");
        assert_eq!(
            format_units(U256::from(1_500_000_000_000_000_000u64), 18),
            "1.5"
        );
        assert_eq!(format_units(U256::from(1u64), 18), "0.000000000000000001");
        assert_eq!(format_units(U256::from(123_456u64), 6), "0.123456");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_format_beyond_u256_powers_of_ten() {
        let five = U256::from(5u64);
        let expected = |decimals: usize| format!("0.{}5", "0".repeat(decimals - 1));

        assert_eq!(format_units(five, 77), expected(77));
        assert_eq!(format_units(five, 78), expected(78));
        assert_eq!(format_units(five, 255), expected(255));
        assert_eq!(format_units(U256::ZERO, 255), "0");
        assert_eq!(format_units(U256::MAX, 0), U256::MAX.to_string());
    }

    #[test]
    fn test_amount_decimal_arithmetic_is_exact() {
        let rewards: Amount = "25.5".parse().unwrap();
        let claimed: Amount = "150.75".parse().unwrap();
        let total = claimed.checked_add(rewards).unwrap();
        assert_eq!(total.to_string(), "176.25");

        let staked: Amount = "500".parse().unwrap();
        let unbond: Amount = "100".parse().unwrap();
        assert_eq!(staked.checked_sub(unbond).unwrap().to_string(), "400");
        assert!(unbond.checked_sub(staked).is_none());
    }

    #[test]
    fn test_amount_serde_as_string() {
        let amount: Amount = "12.5".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"12.5\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
