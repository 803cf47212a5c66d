// Slippage and trade sizing
// -------------------------
// Both prices share one orientation: output units per input unit, human scale.
//
//   gross      = |spot - avg| / spot * 100
//   excl_fees  = gross - fee_rate * 100
//
// The fee is removed as a flat percentage-point offset. That is an approximation of the
// price-impact component, not an exact decomposition; small trades can come out slightly
// negative and the sign is kept as-is.

use bigdecimal::BigDecimal;
use num_bigint::Sign;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slippage {
    pub gross_pct: BigDecimal,
    pub excl_fees_pct: BigDecimal,
}

#[inline]
fn hundred() -> BigDecimal {
    BigDecimal::from(100)
}

/// `None` when either price is non-positive; the undefined pair, never (0, 0).
pub fn evaluate(spot_price: &BigDecimal, avg_exec_price: &BigDecimal, fee_rate: &BigDecimal) -> Option<Slippage> {
    if spot_price.sign() != Sign::Plus || avg_exec_price.sign() != Sign::Plus {
        return None;
    }
    let gross_pct = (spot_price - avg_exec_price).abs() / spot_price * hundred();
    let excl_fees_pct = &gross_pct - fee_rate * hundred();
    Some(Slippage { gross_pct, excl_fees_pct })
}

/// Average execution price, output per input, both human.
pub fn average_execution_price(amount_in: &BigDecimal, amount_out: &BigDecimal) -> Option<BigDecimal> {
    if amount_in.sign() != Sign::Plus || amount_out.sign() != Sign::Plus {
        return None;
    }
    Some(amount_out / amount_in)
}

/// USD notional -> input amount in human units. `None` means unsizeable: the caller skips
/// the combination instead of trading a zero amount.
pub fn size_trade(usd_notional: &BigDecimal, spot_usd_price_of_input: &BigDecimal) -> Option<BigDecimal> {
    if spot_usd_price_of_input.sign() != Sign::Plus || usd_notional.sign() != Sign::Plus {
        return None;
    }
    Some(usd_notional / spot_usd_price_of_input)
}
