// Quoting capability shared by both venues
// ----------------------------------------
// `Quoter` is bound to one block. The constant-product variant is pure math over reserves
// read at that block; the concentrated-liquidity variant forwards to a remote quote oracle
// (the V4 Quoter contract, or a synthetic one in tests) and estimates spot with a micro-quote.
//
// Prices returned by `spot_price` are human units of `token_out` per unit of `token_in`.

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::errors::{AmountError, QuoteError};
use crate::math::constant_product::{self, FeeFraction, PairReserves, SwapDirection};
use crate::math::fixed_point::FixedPointAmount;
use crate::models::{Asset, PoolKey, Quote, TradeLeg, Venue};

/// Default micro-quote size, in units of the input token.
pub const DEFAULT_MICRO_AMOUNT: &str = "0.000001";

#[async_trait]
pub trait Quoter: Send + Sync {
    fn venue(&self) -> Venue;

    fn block(&self) -> u64;

    /// Fee charged on input, as a rate (0.003 for 0.30%).
    fn fee_rate(&self) -> BigDecimal;

    async fn quote_exact_input(&self, leg: &TradeLeg, amount_in: &FixedPointAmount) -> Result<Quote, QuoteError>;

    async fn spot_price(&self, leg: &TradeLeg) -> Result<BigDecimal, QuoteError>;
}

/// Supplies a quoter bound to a given block.
#[async_trait]
pub trait VenueSource: Send + Sync {
    fn venue(&self) -> Venue;

    async fn quoter_at(&self, block: u64) -> Result<Arc<dyn Quoter>, QuoteError>;
}

fn check_input_scale(leg: &TradeLeg, amount_in: &FixedPointAmount) -> Result<(), QuoteError> {
    if amount_in.scale() != leg.token_in.decimals {
        return Err(AmountError::ScaleMismatch { left: amount_in.scale(), right: leg.token_in.decimals }.into());
    }
    Ok(())
}

// ------------------------- Constant product (Uniswap V2) -------------------------

#[derive(Debug, Clone)]
pub struct ConstantProductQuoter {
    block: u64,
    token0: Asset,
    token1: Asset,
    reserves: PairReserves,
    fee: FeeFraction,
}

impl ConstantProductQuoter {
    pub fn new(block: u64, token0: Asset, token1: Asset, reserves: PairReserves, fee: FeeFraction) -> Self {
        Self { block, token0, token1, reserves, fee }
    }

    pub fn reserves(&self) -> &PairReserves {
        &self.reserves
    }

    fn direction(&self, leg: &TradeLeg) -> Result<SwapDirection, QuoteError> {
        if leg.token_in.address == self.token0.address && leg.token_out.address == self.token1.address {
            Ok(SwapDirection::ZeroForOne)
        } else if leg.token_in.address == self.token1.address && leg.token_out.address == self.token0.address {
            Ok(SwapDirection::OneForZero)
        } else {
            Err(QuoteError::Configuration(format!(
                "leg {} does not match pair {}/{}",
                leg.label(),
                self.token0.symbol,
                self.token1.symbol
            )))
        }
    }
}

#[async_trait]
impl Quoter for ConstantProductQuoter {
    fn venue(&self) -> Venue {
        Venue::UniswapV2
    }

    fn block(&self) -> u64 {
        self.block
    }

    fn fee_rate(&self) -> BigDecimal {
        self.fee.fee_rate()
    }

    async fn quote_exact_input(&self, leg: &TradeLeg, amount_in: &FixedPointAmount) -> Result<Quote, QuoteError> {
        check_input_scale(leg, amount_in)?;
        let (reserve_in, reserve_out) = self.reserves.map_direction(self.direction(leg)?);
        let out = constant_product::quote_exact_input(
            amount_in.raw(),
            reserve_in,
            reserve_out,
            self.fee.numerator,
            self.fee.denominator,
        );
        Ok(Quote {
            venue: Venue::UniswapV2,
            block: self.block,
            direction: leg.label(),
            amount_in: amount_in.clone(),
            amount_out: FixedPointAmount::new(out, leg.token_out.decimals)?,
            gas_estimate: None,
        })
    }

    async fn spot_price(&self, leg: &TradeLeg) -> Result<BigDecimal, QuoteError> {
        let (reserve_in, reserve_out) = self.reserves.map_direction(self.direction(leg)?);
        constant_product::spot_price_out_per_in(reserve_in, reserve_out, leg.token_in.decimals, leg.token_out.decimals)
            .ok_or_else(|| QuoteError::Unquotable(format!("non-positive reserves at block {}", self.block)))
    }
}

// ----------------------- Concentrated liquidity (Uniswap V4) -----------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleQuote {
    pub amount_out: BigInt,
    pub gas_estimate: BigInt,
}

/// Remote `quoteExactInputSingle` evaluated against state at `block`.
#[async_trait]
pub trait QuoteOracle: Send + Sync {
    async fn quote_exact_input_single(
        &self,
        key: &PoolKey,
        zero_for_one: bool,
        exact_amount: u128,
        hook_data: &[u8],
        block: u64,
    ) -> Result<OracleQuote, QuoteError>;
}

/// The quoter takes a uint128 exact amount.
pub fn clamp_to_u128(amount: &BigInt) -> u128 {
    if !amount.is_positive() {
        return 0;
    }
    amount.to_u128().unwrap_or(u128::MAX)
}

/// Static wiring of a concentrated-liquidity pool; hands out block-bound quoters.
#[derive(Clone)]
pub struct ConcentratedLiquidityVenue {
    oracle: Arc<dyn QuoteOracle>,
    pool_key: PoolKey,
    currency0: Asset,
    currency1: Asset,
    micro_amount: BigDecimal,
    hook_data: Vec<u8>,
}

impl ConcentratedLiquidityVenue {
    pub fn new(
        oracle: Arc<dyn QuoteOracle>,
        pool_key: PoolKey,
        currency0: Asset,
        currency1: Asset,
        micro_amount: BigDecimal,
        hook_data: Vec<u8>,
    ) -> Result<Self, QuoteError> {
        if currency0.address != pool_key.currency0 || currency1.address != pool_key.currency1 {
            return Err(QuoteError::Configuration("currency metadata does not match the pool key".to_string()));
        }
        Ok(Self { oracle, pool_key, currency0, currency1, micro_amount, hook_data })
    }

    pub fn pool_key(&self) -> &PoolKey {
        &self.pool_key
    }

    pub fn currencies(&self) -> (&Asset, &Asset) {
        (&self.currency0, &self.currency1)
    }

    pub fn quoter(&self, block: u64) -> ConcentratedLiquidityQuoter {
        ConcentratedLiquidityQuoter {
            oracle: self.oracle.clone(),
            pool_key: self.pool_key.clone(),
            block,
            micro_amount: self.micro_amount.clone(),
            hook_data: self.hook_data.clone(),
        }
    }
}

#[async_trait]
impl VenueSource for ConcentratedLiquidityVenue {
    fn venue(&self) -> Venue {
        Venue::UniswapV4
    }

    async fn quoter_at(&self, block: u64) -> Result<Arc<dyn Quoter>, QuoteError> {
        Ok(Arc::new(self.quoter(block)))
    }
}

pub struct ConcentratedLiquidityQuoter {
    oracle: Arc<dyn QuoteOracle>,
    pool_key: PoolKey,
    block: u64,
    micro_amount: BigDecimal,
    hook_data: Vec<u8>,
}

impl ConcentratedLiquidityQuoter {
    fn resolve(&self, leg: &TradeLeg) -> Result<bool, QuoteError> {
        let zero_for_one = self.pool_key.zero_for_one(leg.token_in.address)?;
        let expected_out = if zero_for_one { self.pool_key.currency1 } else { self.pool_key.currency0 };
        if leg.token_out.address != expected_out {
            return Err(QuoteError::Configuration(format!(
                "leg {} output is not the opposite pool currency",
                leg.label()
            )));
        }
        Ok(zero_for_one)
    }

    async fn call_oracle(&self, zero_for_one: bool, amount: u128) -> Result<OracleQuote, QuoteError> {
        self.oracle
            .quote_exact_input_single(&self.pool_key, zero_for_one, amount, &self.hook_data, self.block)
            .await
    }
}

#[async_trait]
impl Quoter for ConcentratedLiquidityQuoter {
    fn venue(&self) -> Venue {
        Venue::UniswapV4
    }

    fn block(&self) -> u64 {
        self.block
    }

    fn fee_rate(&self) -> BigDecimal {
        self.pool_key.fee_rate()
    }

    async fn quote_exact_input(&self, leg: &TradeLeg, amount_in: &FixedPointAmount) -> Result<Quote, QuoteError> {
        check_input_scale(leg, amount_in)?;
        let zero_for_one = self.resolve(leg)?;

        let exact = clamp_to_u128(amount_in.raw());
        let sent = FixedPointAmount::new(BigInt::from(exact), amount_in.scale())?;
        let (out, gas) = if exact == 0 {
            (BigInt::zero(), None)
        } else {
            let q = self.call_oracle(zero_for_one, exact).await?;
            (q.amount_out, Some(q.gas_estimate))
        };

        Ok(Quote {
            venue: Venue::UniswapV4,
            block: self.block,
            direction: leg.label(),
            amount_in: sent,
            amount_out: FixedPointAmount::new(out.max(BigInt::zero()), leg.token_out.decimals)?,
            gas_estimate: gas,
        })
    }

    /// spot = (micro_out / micro_in) / (1 - fee_rate)
    async fn spot_price(&self, leg: &TradeLeg) -> Result<BigDecimal, QuoteError> {
        let zero_for_one = self.resolve(leg)?;

        let one_minus_fee = BigDecimal::one() - self.fee_rate();
        if one_minus_fee.sign() != Sign::Plus {
            return Err(QuoteError::Unquotable(format!("fee {} leaves no output", self.pool_key.fee_ppm)));
        }

        let mut micro_in = FixedPointAmount::from_human(&self.micro_amount, leg.token_in.decimals)?;
        if !micro_in.is_positive() {
            micro_in = FixedPointAmount::new(BigInt::one(), leg.token_in.decimals)?;
        }

        let q = self.call_oracle(zero_for_one, clamp_to_u128(micro_in.raw())).await?;
        if !q.amount_out.is_positive() {
            return Err(QuoteError::Unquotable(format!("zero micro-quote at block {}", self.block)));
        }

        let micro_out = FixedPointAmount::new(q.amount_out, leg.token_out.decimals)?;
        Ok(micro_out.to_human() / micro_in.to_human() / one_minus_fee)
    }
}

// ---------------------------------- Tests ------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed_point::pow10;
    use ethers::types::Address;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ixs() -> Asset {
        Asset::new(Address::from([0x11; 20]), "IXS", 18)
    }

    fn weth() -> Asset {
        Asset::new(Address::from([0x22; 20]), "WETH", 18)
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn v2_quoter(r0: u64, r1: u64) -> ConstantProductQuoter {
        ConstantProductQuoter::new(
            100,
            ixs(),
            weth(),
            PairReserves::new(BigInt::from(r0) * pow10(18), BigInt::from(r1) * pow10(18)),
            FeeFraction::default(),
        )
    }

    /// Constant-product curve standing in for the V4 quoter; fee in ppm.
    struct CurveOracle {
        reserve0: BigInt,
        reserve1: BigInt,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteOracle for CurveOracle {
        async fn quote_exact_input_single(
            &self,
            key: &PoolKey,
            zero_for_one: bool,
            exact_amount: u128,
            _hook_data: &[u8],
            _block: u64,
        ) -> Result<OracleQuote, QuoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (r_in, r_out) = if zero_for_one { (&self.reserve0, &self.reserve1) } else { (&self.reserve1, &self.reserve0) };
            let out = constant_product::quote_exact_input(
                &BigInt::from(exact_amount),
                r_in,
                r_out,
                1_000_000 - key.fee_ppm,
                1_000_000,
            );
            Ok(OracleQuote { amount_out: out, gas_estimate: BigInt::from(95_000u32) })
        }
    }

    struct ZeroOracle;

    #[async_trait]
    impl QuoteOracle for ZeroOracle {
        async fn quote_exact_input_single(
            &self,
            _key: &PoolKey,
            _zero_for_one: bool,
            _exact_amount: u128,
            _hook_data: &[u8],
            _block: u64,
        ) -> Result<OracleQuote, QuoteError> {
            Ok(OracleQuote { amount_out: BigInt::zero(), gas_estimate: BigInt::zero() })
        }
    }

    fn v4_venue(oracle: Arc<dyn QuoteOracle>, fee_ppm: u32) -> ConcentratedLiquidityVenue {
        let eth = Asset::native();
        let key = PoolKey {
            currency0: eth.address,
            currency1: ixs().address,
            fee_ppm,
            tick_spacing: 200,
            hooks: Address::zero(),
        };
        ConcentratedLiquidityVenue::new(oracle, key, eth, ixs(), dec(DEFAULT_MICRO_AMOUNT), Vec::new()).unwrap()
    }

    fn curve(r0: u64, r1: u64) -> Arc<CurveOracle> {
        Arc::new(CurveOracle {
            reserve0: BigInt::from(r0) * pow10(18),
            reserve1: BigInt::from(r1) * pow10(18),
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn v2_quote_uses_direction_reserves() {
        let q = v2_quoter(1_000_000, 500);
        let leg = TradeLeg::new(ixs(), weth());
        let amount = FixedPointAmount::new(BigInt::from(1_000u64) * pow10(18), 18).unwrap();
        let quote = tokio_test::block_on(q.quote_exact_input(&leg, &amount)).unwrap();
        assert_eq!(quote.amount_out.raw().to_string(), "498003490519951608");
        assert_eq!(quote.direction, "IXS->WETH");

        let spot = tokio_test::block_on(q.spot_price(&leg)).unwrap();
        assert_eq!(spot, dec("0.0005"));
        let reverse = tokio_test::block_on(q.spot_price(&leg.reversed())).unwrap();
        assert_eq!(reverse, dec("2000"));
    }

    #[test]
    fn v2_rejects_foreign_legs_and_scales() {
        let q = v2_quoter(10, 10);
        let stranger = Asset::new(Address::from([0x33; 20]), "ABC", 18);
        let leg = TradeLeg::new(stranger, weth());
        let amount = FixedPointAmount::new(BigInt::from(1), 18).unwrap();
        let err = tokio_test::block_on(q.quote_exact_input(&leg, &amount)).unwrap_err();
        assert!(err.is_fatal());

        let good_leg = TradeLeg::new(ixs(), weth());
        let wrong_scale = FixedPointAmount::new(BigInt::from(1), 6).unwrap();
        let err = tokio_test::block_on(q.quote_exact_input(&good_leg, &wrong_scale)).unwrap_err();
        assert!(matches!(err, QuoteError::Amount(AmountError::ScaleMismatch { .. })));
    }

    #[test]
    fn v2_empty_pool_has_no_spot() {
        let q = v2_quoter(0, 10);
        let err = tokio_test::block_on(q.spot_price(&TradeLeg::new(ixs(), weth()))).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn micro_quote_spot_removes_fee() {
        // 100 ETH vs 2_500_000 IXS -> 25_000 IXS per ETH before fees
        let venue = v4_venue(curve(100, 2_500_000), 10_000);
        let quoter = venue.quoter(7);
        let leg = TradeLeg::new(ixs(), Asset::native());

        let spot = tokio_test::block_on(quoter.spot_price(&leg)).unwrap();
        let expected = dec("0.00004");
        let rel = ((&spot - &expected) / &expected).abs();
        assert!(rel < dec("0.000001"), "spot {} vs {}", spot, expected);
    }

    #[test]
    fn zero_micro_quote_means_unavailable() {
        let venue = v4_venue(Arc::new(ZeroOracle), 3_000);
        let err = tokio_test::block_on(venue.quoter(7).spot_price(&TradeLeg::new(ixs(), Asset::native()))).unwrap_err();
        assert!(matches!(err, QuoteError::Unquotable(_)));
    }

    #[test]
    fn fee_of_one_hundred_percent_means_unavailable() {
        let venue = v4_venue(curve(100, 100), 1_000_000);
        let err = tokio_test::block_on(venue.quoter(7).spot_price(&TradeLeg::new(ixs(), Asset::native()))).unwrap_err();
        assert!(matches!(err, QuoteError::Unquotable(_)));
    }

    #[test]
    fn non_positive_input_skips_the_remote_call() {
        let oracle = curve(100, 100);
        let venue = v4_venue(oracle.clone(), 3_000);
        let leg = TradeLeg::new(Asset::native(), ixs());
        let zero = FixedPointAmount::zero(18).unwrap();
        let q = tokio_test::block_on(venue.quoter(1).quote_exact_input(&leg, &zero)).unwrap();
        assert!(q.amount_out.raw().is_zero());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn token_outside_the_pool_is_fatal() {
        let venue = v4_venue(curve(100, 100), 3_000);
        let leg = TradeLeg::new(weth(), ixs());
        let amount = FixedPointAmount::new(BigInt::from(5), 18).unwrap();
        let err = tokio_test::block_on(venue.quoter(1).quote_exact_input(&leg, &amount)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn oversized_inputs_are_clamped() {
        let huge = BigInt::from(u128::MAX) * BigInt::from(4u8);
        assert_eq!(clamp_to_u128(&huge), u128::MAX);
        assert_eq!(clamp_to_u128(&BigInt::from(-3)), 0);
        assert_eq!(clamp_to_u128(&BigInt::from(42)), 42);

        let venue = v4_venue(curve(100, 100), 3_000);
        let leg = TradeLeg::new(Asset::native(), ixs());
        let amount = FixedPointAmount::new(huge, 18).unwrap();
        let q = tokio_test::block_on(venue.quoter(1).quote_exact_input(&leg, &amount)).unwrap();
        assert_eq!(q.amount_in.raw(), &BigInt::from(u128::MAX));
        assert!(q.gas_estimate.is_some());
    }
}
