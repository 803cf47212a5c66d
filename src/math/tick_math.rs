// Uniswap v3/v4 tick math over BigInt
// -----------------------------------
// Canonical TickMath.getSqrtRatioAtTick (Q64.96) and its exact on-grid inverse, plus the
// conversions the liquidity report needs: raw price <-> tick and snapping to a tick spacing.
//
// Prices here are raw: token1 base units per token0 base unit. Use `raw_price_from_human`
// to fold in the decimals of each currency first.

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::One;

use super::fixed_point::pow10;

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

// (bit of |tick|, Q128.128 multiplier)
const TICK_MULTIPLIERS: [(u32, &str); 19] = [
    (0x2, "fff97272373d413259a46990580e213a"),
    (0x4, "fff2e50f5f656932ef12357cf3c7fdcc"),
    (0x8, "ffe5caca7e10e4e61c3624eaa0941cd0"),
    (0x10, "ffcb9843d60f6159c9db58835c926644"),
    (0x20, "ff973b41fa98c081472e6896dfb254c0"),
    (0x40, "ff2ea16466c96a3843ec78b326b52861"),
    (0x80, "fe5dee046a99a2a811c461f1969c3053"),
    (0x100, "fcbe86c7900a88aedcffc83b479aa3a4"),
    (0x200, "f987a7253ac413176f2b074cf7815e54"),
    (0x400, "f3392b0822b70005940c7a398e4b70f3"),
    (0x800, "e7159475a2c29b7443b29c7fa6e889d9"),
    (0x1000, "d097f3bdfd2022b8845ad8f792aa5825"),
    (0x2000, "a9f746462d870fdf8a65dc1f90e061e5"),
    (0x4000, "70d869a156d2a1b890bb3df62baf32f7"),
    (0x8000, "31be135f97d08fd981231505542fcfa6"),
    (0x10000, "09aa508b5b7a84e1c677de54f3e99bc9"),
    (0x20000, "05d6af8dedb81196699c329225ee604"),
    (0x40000, "2216e584f5fa1ea926041bedfe98"),
    (0x80000, "48a170391f7dc42444e8fa2"),
];

// -------------------------------- Tick Math --------------------------------

/// Exact TickMath.getSqrtRatioAtTick. `None` outside [MIN_TICK, MAX_TICK].
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Option<BigInt> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return None;
    }
    let abs_tick = tick.unsigned_abs();

    // ratio is Q128.128
    let mut ratio = if abs_tick & 0x1 != 0 {
        BigInt::parse_bytes(b"fffcb933bd6fad37aa2d162d1a594001", 16)?
    } else {
        BigInt::one() << 128
    };

    for (mask, hex) in TICK_MULTIPLIERS.iter() {
        if abs_tick & mask != 0 {
            ratio = (&ratio * BigInt::parse_bytes(hex.as_bytes(), 16)?) >> 128;
        }
    }

    if tick > 0 {
        let max = (BigInt::one() << 256) - 1;
        ratio = max / ratio;
    }
    // round-up shift by 32 (Q128.128 -> Q64.96)
    Some((&ratio + ((BigInt::one() << 32) - 1)) >> 32)
}

/// Greatest tick whose sqrt ratio is <= `sqrt_price_x96` (binary search, exact on-grid).
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: &BigInt) -> i32 {
    let mut lo = MIN_TICK;
    let mut hi = MAX_TICK;
    while lo < hi {
        let mid = lo + ((hi - lo + 1) / 2);
        match get_sqrt_ratio_at_tick(mid) {
            Some(r) if r <= *sqrt_price_x96 => lo = mid,
            _ => hi = mid - 1,
        }
    }
    lo
}

// --------------------------- Price <-> tick helpers ---------------------------

/// Human price (currency1 per currency0) -> raw price (base units of 1 per base unit of 0).
pub fn raw_price_from_human(price_1_per_0: &BigDecimal, dec0: u8, dec1: u8) -> BigDecimal {
    if dec1 >= dec0 {
        price_1_per_0 * BigDecimal::from(pow10((dec1 - dec0) as u32))
    } else {
        price_1_per_0 / BigDecimal::from(pow10((dec0 - dec1) as u32))
    }
}

/// Tick whose price is the greatest on-grid price <= `raw_price`. `None` for non-positive prices.
pub fn tick_at_raw_price(raw_price: &BigDecimal) -> Option<i32> {
    if raw_price.sign() != Sign::Plus {
        return None;
    }
    // sqrtPriceX96 = floor(sqrt(price * 2^192))
    let q192 = BigDecimal::from(BigInt::one() << 192);
    let (scaled, _) = (raw_price * q192).with_scale(0).into_bigint_and_exponent();
    let sqrt_x96 = scaled.sqrt();
    Some(get_tick_at_sqrt_ratio(&sqrt_x96))
}

/// Raw price at a tick: sqrtP^2 / 2^192.
pub fn raw_price_at_tick(tick: i32) -> Option<BigDecimal> {
    let s = get_sqrt_ratio_at_tick(tick)?;
    Some(BigDecimal::from(&s * &s) / BigDecimal::from(BigInt::one() << 192))
}

/// Nearest multiple of `spacing`, halves rounded up.
pub fn snap_tick(tick: i32, spacing: i32) -> i32 {
    if spacing <= 1 {
        return tick;
    }
    let t = tick as i64;
    let s = spacing as i64;
    let snapped = (2 * t + s).div_floor(&(2 * s)) * s;
    snapped.clamp(MIN_TICK as i64, MAX_TICK as i64) as i32
}
