// Fixed-point token amounts
// -------------------------
// An on-chain amount is an integer number of base units plus the token's declared decimal scale.
// Human values are `BigDecimal`, built directly from (raw, scale) so the raw -> human direction
// is exact. The human -> raw direction always truncates toward zero: an input that is rounded
// up can make an on-chain trade revert, so every conversion here biases low.
//
// Amounts of different scales never mix implicitly; callers `rescale` first.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};

use crate::errors::{AmountError, MAX_SCALE};

// ------------------------------- Helpers -----------------------------------

/// 10^exp as an unbounded integer.
#[inline]
pub fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u8).pow(exp)
}

/// Parse a decimal literal such as `"1000"`, `"0.003"` or `"1e-6"`.
pub fn parse_decimal(text: &str) -> Result<BigDecimal, AmountError> {
    BigDecimal::from_str(text.trim()).map_err(|_| AmountError::InvalidDecimal(text.to_string()))
}

/// Plain (non-exponential) decimal rendering, truncated toward zero to `max_frac_digits`
/// fractional digits, trailing zeros removed.
pub fn to_decimal_string(value: &BigDecimal, max_frac_digits: u32) -> String {
    let truncated = value.with_scale(max_frac_digits as i64);
    let (digits, scale) = truncated.into_bigint_and_exponent();
    let negative = digits.sign() == Sign::Minus;
    let mut body = digits.abs().to_string();
    let scale = scale.max(0) as usize;

    if scale > 0 {
        if body.len() <= scale {
            body = format!("{}{}", "0".repeat(scale + 1 - body.len()), body);
        }
        let point = body.len() - scale;
        let (int_part, frac_part) = body.split_at(point);
        let frac_part = frac_part.trim_end_matches('0');
        body = if frac_part.is_empty() {
            int_part.to_string()
        } else {
            format!("{}.{}", int_part, frac_part)
        };
    }

    if negative && body.chars().any(|c| c != '0' && c != '.') {
        format!("-{}", body)
    } else {
        body
    }
}

// ------------------------------- Amount type --------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FixedPointAmount {
    raw: BigInt,
    scale: u8,
}

impl FixedPointAmount {
    pub fn new(raw: BigInt, scale: u8) -> Result<Self, AmountError> {
        if scale > MAX_SCALE {
            return Err(AmountError::ScaleOutOfRange(scale));
        }
        Ok(Self { raw, scale })
    }

    pub fn zero(scale: u8) -> Result<Self, AmountError> {
        Self::new(BigInt::zero(), scale)
    }

    /// Human -> raw, truncating toward zero. Non-positive values become a zero amount.
    pub fn from_human(value: &BigDecimal, scale: u8) -> Result<Self, AmountError> {
        if scale > MAX_SCALE {
            return Err(AmountError::ScaleOutOfRange(scale));
        }
        if value.sign() != Sign::Plus {
            return Self::zero(scale);
        }
        let (raw, _) = value.with_scale(scale as i64).into_bigint_and_exponent();
        Self::new(raw, scale)
    }

    #[inline]
    pub fn raw(&self) -> &BigInt {
        &self.raw
    }

    #[inline]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn into_raw(self) -> BigInt {
        self.raw
    }

    /// Exact raw / 10^scale.
    pub fn to_human(&self) -> BigDecimal {
        BigDecimal::new(self.raw.clone(), self.scale as i64)
    }

    pub fn is_positive(&self) -> bool {
        self.raw.is_positive()
    }

    /// Move to another scale. Dropping digits truncates toward zero.
    pub fn rescale(&self, new_scale: u8) -> Result<Self, AmountError> {
        if new_scale > MAX_SCALE {
            return Err(AmountError::ScaleOutOfRange(new_scale));
        }
        let raw = if new_scale >= self.scale {
            &self.raw * pow10((new_scale - self.scale) as u32)
        } else {
            &self.raw / pow10((self.scale - new_scale) as u32)
        };
        Self::new(raw, new_scale)
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, AmountError> {
        self.same_scale(other)?;
        Self::new(&self.raw + &other.raw, self.scale)
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self, AmountError> {
        self.same_scale(other)?;
        Self::new(&self.raw - &other.raw, self.scale)
    }

    fn same_scale(&self, other: &Self) -> Result<(), AmountError> {
        if self.scale != other.scale {
            return Err(AmountError::ScaleMismatch { left: self.scale, right: other.scale });
        }
        Ok(())
    }
}

impl fmt::Display for FixedPointAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_decimal_string(&self.to_human(), self.scale as u32))
    }
}

// ---------------------------------- Tests ------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        parse_decimal(s).unwrap()
    }

    #[test]
    fn to_human_is_exact() {
        let a = FixedPointAmount::new(BigInt::from(1_234_567_890_123_456_789u128), 18).unwrap();
        assert_eq!(a.to_human(), dec("1.234567890123456789"));

        let usdc = FixedPointAmount::new(BigInt::from(1_500_000u64), 6).unwrap();
        assert_eq!(usdc.to_human(), dec("1.5"));
    }

    #[test]
    fn from_human_truncates_toward_zero() {
        let a = FixedPointAmount::from_human(&dec("1.9999999"), 6).unwrap();
        assert_eq!(a.raw(), &BigInt::from(1_999_999u64));

        let tiny = FixedPointAmount::from_human(&dec("0.0000009"), 6).unwrap();
        assert!(tiny.raw().is_zero());
    }

    #[test]
    fn non_positive_human_values_map_to_zero() {
        assert!(FixedPointAmount::from_human(&dec("-3.5"), 18).unwrap().raw().is_zero());
        assert!(FixedPointAmount::from_human(&dec("0"), 18).unwrap().raw().is_zero());
    }

    #[test]
    fn scale_bounds_are_enforced() {
        assert!(FixedPointAmount::new(BigInt::from(1), 36).is_ok());
        assert_eq!(
            FixedPointAmount::new(BigInt::from(1), 37),
            Err(AmountError::ScaleOutOfRange(37))
        );
        assert!(FixedPointAmount::from_human(&dec("1"), 40).is_err());
    }

    #[test]
    fn round_trip_never_rounds_up() {
        let raws: [u128; 6] = [0, 1, 7, 999_999, 123_456_789_012_345_678, u128::MAX];
        for scale in [0u8, 6, 18, 36] {
            for raw in raws {
                let a = FixedPointAmount::new(BigInt::from(raw), scale).unwrap();
                let back = FixedPointAmount::from_human(&a.to_human(), scale).unwrap();
                assert!(back.raw() <= a.raw(), "raw {} scale {} came back larger", raw, scale);
            }
        }
    }

    #[test]
    fn mixing_scales_is_rejected() {
        let weth = FixedPointAmount::new(BigInt::from(10u8), 18).unwrap();
        let usdc = FixedPointAmount::new(BigInt::from(10u8), 6).unwrap();
        assert_eq!(
            weth.checked_add(&usdc),
            Err(AmountError::ScaleMismatch { left: 18, right: 6 })
        );

        let usdc_18 = usdc.rescale(18).unwrap();
        let sum = weth.checked_add(&usdc_18).unwrap();
        assert_eq!(sum.raw(), &(BigInt::from(10u8) + BigInt::from(10u8) * pow10(12)));
    }

    #[test]
    fn rescale_down_truncates() {
        let a = FixedPointAmount::new(BigInt::from(1_999_999_999_999u64), 12).unwrap();
        let b = a.rescale(6).unwrap();
        assert_eq!(b.raw(), &BigInt::from(1_999_999u64));
        assert_eq!(b.to_string(), "1.999999");
    }

    #[test]
    fn decimal_strings_are_plain() {
        assert_eq!(to_decimal_string(&dec("1e-9"), 18), "0.000000001");
        assert_eq!(to_decimal_string(&dec("1E+3"), 18), "1000");
        assert_eq!(to_decimal_string(&dec("-0.25"), 18), "-0.25");
        assert_eq!(to_decimal_string(&dec("2.123456789"), 4), "2.1234");
        assert_eq!(to_decimal_string(&dec("-0.00001"), 2), "0");
        assert_eq!(to_decimal_string(&dec("42"), 0), "42");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_decimal("abc").is_err());
        assert_eq!(parse_decimal(" 0.000001 ").unwrap(), dec("1e-6"));
    }
}
