// tests/vault_series.rs
//
// Vault series over a scripted pool, vault and market.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::types::Address;
use num_bigint::BigInt;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use liquidity_migration::engine::quoter::{ConstantProductQuoter, Quoter, VenueSource};
use liquidity_migration::engine::series::MarketContext;
use liquidity_migration::engine::vault::{performance_summary, UnderlyingMapping, VaultReader, VaultSeriesBuilder};
use liquidity_migration::errors::QuoteError;
use liquidity_migration::math::constant_product::{FeeFraction, PairReserves};
use liquidity_migration::math::fixed_point::pow10;
use liquidity_migration::models::{Asset, MarketPair, Venue};

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn e18(units: u64) -> BigInt {
    BigInt::from(units) * pow10(18)
}

fn ixs() -> Asset {
    Asset::new(Address::from([0x11; 20]), "IXS", 18)
}

fn weth() -> Asset {
    Asset::new(Address::from([0x22; 20]), "WETH", 18)
}

/// Pool priced by a per-block (IXS, WETH) reserve pair.
struct Pool {
    reserves: HashMap<u64, (BigInt, BigInt)>,
}

#[async_trait]
impl VenueSource for Pool {
    fn venue(&self) -> Venue {
        Venue::UniswapV2
    }

    async fn quoter_at(&self, block: u64) -> Result<Arc<dyn Quoter>, QuoteError> {
        let (r0, r1) = self
            .reserves
            .get(&block)
            .cloned()
            .ok_or_else(|| QuoteError::Unquotable(format!("no pool at {}", block)))?;
        Ok(Arc::new(ConstantProductQuoter::new(block, ixs(), weth(), PairReserves::new(r0, r1), FeeFraction::default())))
    }
}

/// Vault reporting (WETH, IXS), i.e. numeraire first.
struct Vault {
    holdings: HashMap<u64, (BigInt, BigInt)>,
    failing: Vec<u64>,
}

#[async_trait]
impl VaultReader for Vault {
    async fn total_underlying(&self, block: u64) -> Result<(BigInt, BigInt), QuoteError> {
        if self.failing.contains(&block) {
            return Err(QuoteError::Remote("execution reverted".into()));
        }
        self.holdings
            .get(&block)
            .cloned()
            .ok_or_else(|| QuoteError::Unquotable(format!("no vault at {}", block)))
    }
}

struct Market;

#[async_trait]
impl MarketContext for Market {
    async fn block_timestamp(&self, block: u64) -> Result<u64, QuoteError> {
        Ok(1_700_000_000 + block * 12)
    }

    async fn numeraire_usd(&self, _block: u64) -> Result<Option<BigDecimal>, QuoteError> {
        Ok(Some(dec("2500")))
    }
}

#[tokio::test]
async fn vault_series_maps_values_and_indexes() {
    // 0.00004 WETH per IXS at block 100, 0.00016 at block 300
    let pool = Pool {
        reserves: [
            (100, (e18(1_000_000), e18(40))),
            (200, (e18(1_000_000), e18(40))),
            (300, (e18(500_000), e18(80))),
        ]
        .into_iter()
        .collect(),
    };
    let vault = Vault {
        holdings: [
            (100, (e18(4), e18(100_000))),
            (200, (e18(4), e18(100_000))),
            (300, (e18(8), e18(50_000))),
        ]
        .into_iter()
        .collect(),
        failing: vec![200],
    };

    let rows = VaultSeriesBuilder::new(&pool, &vault, &Market, MarketPair::new(ixs(), weth()), 4, Duration::from_secs(5))
        .build(&[300, 200, 100])
        .await
        .unwrap();

    // block 200 dropped on the failing totalUnderlying call
    assert_eq!(rows.iter().map(|r| r.observation.block).collect::<Vec<_>>(), vec![100, 300]);
    for row in &rows {
        assert_eq!(row.observation.mapping, UnderlyingMapping::U0NumeraireU1Token);
    }

    let first = &rows[0].observation;
    assert_eq!(first.amt_token, dec("100000"));
    assert_eq!(first.amt_numeraire, dec("4"));
    assert_eq!(first.token_usd, dec("0.1"));
    assert_eq!(first.value_total_usd, dec("20000"));

    // 8 WETH * 2500 + 50_000 IXS * 0.4 = 40_000
    let last = &rows[1];
    assert_eq!(last.observation.value_total_usd, dec("40000"));
    assert_eq!(last.vault_value_index, Some(dec("2")));
    // hold: 4 * 2500 + 100_000 * 0.4 = 50_000
    assert_eq!(last.hold_value_index, Some(dec("2.5")));

    let perf = performance_summary(&rows).unwrap();
    assert_eq!((perf.start_block, perf.end_block, perf.observations), (100, 300, 2));
    assert_eq!(perf.vault_index_final, Some(dec("2")));
}

#[tokio::test]
async fn empty_series_has_no_summary() {
    let pool = Pool { reserves: HashMap::new() };
    let vault = Vault { holdings: HashMap::new(), failing: vec![] };

    let rows = VaultSeriesBuilder::new(&pool, &vault, &Market, MarketPair::new(ixs(), weth()), 2, Duration::from_secs(5))
        .build(&[1, 2, 3])
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert!(performance_summary(&rows).is_none());
}
