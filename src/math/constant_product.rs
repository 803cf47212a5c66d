// Uniswap V2 constant-product math
// --------------------------------
// Exact getAmountOut over unbounded integers, fee given as numerator/denominator
// (997/1000 for the canonical 0.30% pair). Mirrors the pair contract bit-for-bit:
//
//   amount_in_with_fee = amount_in * fee_num
//   amount_out = floor( amount_in_with_fee * R_out / (R_in * fee_den + amount_in_with_fee) )
//
// Notes:
// - All internal math is in raw token units. Human prices are BigDecimal, never f64.
// - Token order is never assumed. Direction is explicit and reserves are mapped accordingly.
// - Degenerate inputs (non-positive amount or reserve) quote to zero rather than erroring.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use super::fixed_point::pow10;

/// Canonical Uniswap V2 fee: 0.30% charged on input.
pub const UNIV2_FEE_NUMERATOR: u32 = 997;
pub const UNIV2_FEE_DENOMINATOR: u32 = 1000;

// ------------------------------- Data types ----------------------------------

/// Swap direction: ZeroForOne means token0 -> token1 input; OneForZero = token1 -> token0 input.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SwapDirection {
    ZeroForOne,
    OneForZero,
}

/// Reserves of a pair at one block, in raw units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairReserves {
    pub reserve0: BigInt,
    pub reserve1: BigInt,
}

impl PairReserves {
    pub fn new(reserve0: impl Into<BigInt>, reserve1: impl Into<BigInt>) -> Self {
        Self { reserve0: reserve0.into(), reserve1: reserve1.into() }
    }

    #[inline]
    pub fn is_quotable(&self) -> bool {
        self.reserve0.is_positive() && self.reserve1.is_positive()
    }

    /// (reserve_in, reserve_out) for a direction.
    #[inline]
    pub fn map_direction(&self, direction: SwapDirection) -> (&BigInt, &BigInt) {
        match direction {
            SwapDirection::ZeroForOne => (&self.reserve0, &self.reserve1),
            SwapDirection::OneForZero => (&self.reserve1, &self.reserve0),
        }
    }
}

/// Fee as a fraction of input kept by the trader: num/den.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeFraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl FeeFraction {
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        if denominator == 0 || numerator > denominator {
            return None;
        }
        Some(Self { numerator, denominator })
    }

    /// Fee charged, as a rate: 1 - num/den.
    pub fn fee_rate(&self) -> BigDecimal {
        let charged = BigInt::from(self.denominator - self.numerator);
        BigDecimal::from(charged) / BigDecimal::from(self.denominator)
    }
}

impl Default for FeeFraction {
    fn default() -> Self {
        Self { numerator: UNIV2_FEE_NUMERATOR, denominator: UNIV2_FEE_DENOMINATOR }
    }
}

// ------------------------------- Core math -----------------------------------

/// Exact-input quote. Returns 0 when the input or either reserve is non-positive.
pub fn quote_exact_input(
    amount_in: &BigInt,
    reserve_in: &BigInt,
    reserve_out: &BigInt,
    fee_numerator: u32,
    fee_denominator: u32,
) -> BigInt {
    if !amount_in.is_positive() || !reserve_in.is_positive() || !reserve_out.is_positive() {
        return BigInt::zero();
    }
    let amount_in_with_fee = amount_in * BigInt::from(fee_numerator);
    let numerator = &amount_in_with_fee * reserve_out;
    let denominator = reserve_in * BigInt::from(fee_denominator) + &amount_in_with_fee;
    if denominator.is_zero() {
        return BigInt::zero();
    }
    numerator / denominator
}

// --------------------------- Price & conversions -----------------------------

/// Marginal price reserve_out / reserve_in in raw units, fee-independent.
pub fn spot_price_raw(reserve_in: &BigInt, reserve_out: &BigInt) -> Option<BigDecimal> {
    if !reserve_in.is_positive() || !reserve_out.is_positive() {
        return None;
    }
    Some(BigDecimal::from(reserve_out.clone()) / BigDecimal::from(reserve_in.clone()))
}

/// Spot price (tokenOut per tokenIn), normalized by decimals.
/// price = (R_out / 10^d_out) / (R_in / 10^d_in) = (R_out * 10^d_in) / (R_in * 10^d_out)
pub fn spot_price_out_per_in(
    reserve_in: &BigInt,
    reserve_out: &BigInt,
    dec_in: u8,
    dec_out: u8,
) -> Option<BigDecimal> {
    if !reserve_in.is_positive() || !reserve_out.is_positive() {
        return None;
    }
    let num = reserve_out * pow10(dec_in as u32);
    let den = reserve_in * pow10(dec_out as u32);
    Some(BigDecimal::from(num) / BigDecimal::from(den))
}

// ---------------------------------- Tests ------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn e18(units: u64) -> BigInt {
        BigInt::from(units) * pow10(18)
    }

    #[test]
    fn scenario_reference_quote_matches_hand_computation() {
        // 1_000 in against 1_000_000 / 500, all 18 decimals, 0.30% fee.
        let amount_in = e18(1_000);
        let reserve_in = e18(1_000_000);
        let reserve_out = e18(500);

        let out = quote_exact_input(&amount_in, &reserve_in, &reserve_out, 997, 1000);

        // aif = 997_000e18 ; num = aif * 500e18 ; den = 1_000_000e18 * 1000 + aif
        let aif = BigInt::from(997_000u64) * pow10(18);
        let expected = (&aif * e18(500)) / (e18(1_000_000) * BigInt::from(1000u32) + &aif);
        assert_eq!(out, expected);
        // ~0.4980034905 units out
        assert_eq!(out.to_string(), "498003490519951608");
    }

    #[test]
    fn output_strictly_increases_with_input() {
        let r_in = e18(10_000);
        let r_out = BigInt::from(30_000_000u64) * pow10(6);
        let mut previous = BigInt::zero();
        for units in [1u64, 2, 5, 10, 50, 500, 5_000] {
            let out = quote_exact_input(&e18(units), &r_in, &r_out, 997, 1000);
            assert!(out > previous, "output should increase with input");
            previous = out;
        }
    }

    #[test]
    fn zero_input_quotes_zero() {
        let out = quote_exact_input(&BigInt::zero(), &e18(5), &e18(7), 997, 1000);
        assert!(out.is_zero());
        let neg = quote_exact_input(&BigInt::from(-5), &e18(5), &e18(7), 997, 1000);
        assert!(neg.is_zero());
    }

    #[test]
    fn empty_reserves_quote_zero() {
        assert!(quote_exact_input(&e18(1), &BigInt::zero(), &e18(7), 997, 1000).is_zero());
        assert!(quote_exact_input(&e18(1), &e18(7), &BigInt::from(-1), 997, 1000).is_zero());
        assert!(spot_price_raw(&BigInt::zero(), &e18(1)).is_none());
    }

    #[test]
    fn spot_price_is_scale_invariant() {
        let r_in = BigInt::from(1_234_567u64);
        let r_out = BigInt::from(89_101u64);
        let base = spot_price_raw(&r_in, &r_out).unwrap();
        for k in [2u64, 1_000, 999_999_937] {
            let k = BigInt::from(k);
            let scaled = spot_price_raw(&(&r_in * &k), &(&r_out * &k)).unwrap();
            assert_eq!(scaled, base);
        }
    }

    #[test]
    fn human_spot_price_normalizes_decimals() {
        // 5_000 WETH (18d) vs 15_000_000 USDC (6d) => 3000 USDC per WETH
        let r_weth = e18(5_000);
        let r_usdc = BigInt::from(15_000_000u64) * pow10(6);
        let px = spot_price_out_per_in(&r_weth, &r_usdc, 18, 6).unwrap();
        assert_eq!(px, BigDecimal::from(3000));
    }

    #[test]
    fn direction_maps_reserves() {
        let pair = PairReserves::new(10u32, 20u32);
        assert_eq!(pair.map_direction(SwapDirection::ZeroForOne), (&BigInt::from(10), &BigInt::from(20)));
        assert_eq!(pair.map_direction(SwapDirection::OneForZero), (&BigInt::from(20), &BigInt::from(10)));
        assert!(!PairReserves::new(0u32, 20u32).is_quotable());
    }

    #[test]
    fn fee_fraction_rate() {
        let fee = FeeFraction::default();
        assert_eq!(fee.fee_rate(), "0.003".parse::<BigDecimal>().unwrap());
        assert!(FeeFraction::new(1001, 1000).is_none());
        assert!(FeeFraction::new(1, 0).is_none());
    }
}
