use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use ethers::types::Address;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::errors::QuoteError;
use crate::math::fixed_point::FixedPointAmount;

/// V4 fee denominator: fees are quoted in millionths.
pub const FEE_DENOMINATOR_PPM: u32 = 1_000_000;

/// A token, or native ETH under the zero address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl Asset {
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Self {
        Self { address, symbol: symbol.into(), decimals }
    }

    pub fn native() -> Self {
        Self { address: Address::zero(), symbol: "ETH".to_string(), decimals: 18 }
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        self.address.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    #[serde(rename = "uniswap_v2")]
    UniswapV2,
    #[serde(rename = "uniswap_v4")]
    UniswapV4,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::UniswapV2 => "uniswap_v2",
            Venue::UniswapV4 => "uniswap_v4",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a V4 pool, resolved once from the vault module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolKey {
    pub currency0: Address,
    pub currency1: Address,
    pub fee_ppm: u32,
    pub tick_spacing: i32,
    pub hooks: Address,
}

impl PoolKey {
    pub fn fee_rate(&self) -> BigDecimal {
        BigDecimal::from(self.fee_ppm) / BigDecimal::from(FEE_DENOMINATOR_PPM)
    }

    pub fn contains(&self, currency: Address) -> bool {
        currency == self.currency0 || currency == self.currency1
    }

    /// currency0 in => zero_for_one. A token outside the pool is a wiring error.
    pub fn zero_for_one(&self, token_in: Address) -> Result<bool, QuoteError> {
        if token_in == self.currency0 {
            Ok(true)
        } else if token_in == self.currency1 {
            Ok(false)
        } else {
            Err(QuoteError::Configuration(format!(
                "token {:?} is neither currency0 {:?} nor currency1 {:?}",
                token_in, self.currency0, self.currency1
            )))
        }
    }
}

/// One trade direction: what goes in, what comes out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradeLeg {
    pub token_in: Asset,
    pub token_out: Asset,
}

impl TradeLeg {
    pub fn new(token_in: Asset, token_out: Asset) -> Self {
        Self { token_in, token_out }
    }

    /// e.g. "IXS->ETH"
    pub fn label(&self) -> String {
        format!("{}->{}", self.token_in.symbol, self.token_out.symbol)
    }

    pub fn reversed(&self) -> Self {
        Self { token_in: self.token_out.clone(), token_out: self.token_in.clone() }
    }
}

/// The traded token and the numeraire it is priced against (ETH or WETH).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketPair {
    pub token: Asset,
    pub numeraire: Asset,
}

impl MarketPair {
    pub fn new(token: Asset, numeraire: Asset) -> Self {
        Self { token, numeraire }
    }

    /// token -> numeraire, the leg the reference spot is measured on.
    pub fn base_leg(&self) -> TradeLeg {
        TradeLeg::new(self.token.clone(), self.numeraire.clone())
    }

    pub fn legs(&self) -> [TradeLeg; 2] {
        let base = self.base_leg();
        let quote = base.reversed();
        [base, quote]
    }
}

/// Result of one exact-input quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub venue: Venue,
    pub block: u64,
    pub direction: String,
    pub amount_in: FixedPointAmount,
    pub amount_out: FixedPointAmount,
    pub gas_estimate: Option<BigInt>,
}

/// One row of an execution-quality series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlippageRecord {
    pub venue: Venue,
    pub block: u64,
    pub timestamp: u64,
    pub datetime_utc: DateTime<Utc>,
    pub direction: String,
    pub usd_notional_in: BigDecimal,
    pub amount_in: BigDecimal,
    pub amount_in_unit: String,
    pub amount_out: BigDecimal,
    pub amount_out_unit: String,
    pub spot_price: BigDecimal,
    pub avg_exec_price: BigDecimal,
    pub gross_slippage_pct: BigDecimal,
    pub slippage_excl_fees_pct: BigDecimal,
    pub fee_rate: BigDecimal,
    pub gas_estimate: Option<BigInt>,
}

/// Snapshot of a V2 pair at a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairMetadata {
    pub pair: Address,
    pub block: u64,
    pub token0: Asset,
    pub token1: Asset,
    pub reserve0: String,
    pub reserve1: String,
    pub block_timestamp_last: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ixs() -> Asset {
        Asset::new(Address::from([0x11; 20]), "IXS", 18)
    }

    #[test]
    fn zero_for_one_follows_currency0() {
        let key = PoolKey {
            currency0: Address::zero(),
            currency1: ixs().address,
            fee_ppm: 10_000,
            tick_spacing: 200,
            hooks: Address::zero(),
        };
        assert_eq!(key.zero_for_one(Address::zero()), Ok(true));
        assert_eq!(key.zero_for_one(ixs().address), Ok(false));

        let err = key.zero_for_one(Address::from([0x99; 20])).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn fee_rate_is_millionths() {
        let key = PoolKey {
            currency0: Address::zero(),
            currency1: ixs().address,
            fee_ppm: 3_000,
            tick_spacing: 60,
            hooks: Address::zero(),
        };
        assert_eq!(key.fee_rate(), "0.003".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn legs_are_labelled_by_symbol() {
        let pair = MarketPair::new(ixs(), Asset::native());
        let [base, quote] = pair.legs();
        assert_eq!(base.label(), "IXS->ETH");
        assert_eq!(quote.label(), "ETH->IXS");
        assert!(quote.token_in.is_native());
    }
}
