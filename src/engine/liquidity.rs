// Liquidity concentration of the vault's V4 position
// ---------------------------------------------------
// Ranges come straight from the vault module. Coverage is a proxy for depth: the number of
// ranges overlapping each tick bin (bins aligned to tick spacing, [lower, upper) semantics).
// The current tick is estimated from the micro-quote spot through exact Q64.96 tick math.

use bigdecimal::BigDecimal;
use num_bigint::Sign;
use serde::{Deserialize, Serialize};

use crate::engine::quoter::{ConcentratedLiquidityVenue, Quoter};
use crate::errors::QuoteError;
use crate::math::tick_math::{raw_price_from_human, snap_tick, tick_at_raw_price};
use crate::models::{Asset, PoolKey, TradeLeg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRange {
    pub tick_lower: i32,
    pub tick_upper: i32,
}

impl TickRange {
    pub fn new(tick_lower: i32, tick_upper: i32) -> Self {
        Self { tick_lower, tick_upper }
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.tick_upper as i64 - self.tick_lower as i64
    }

    #[inline]
    pub fn covers(&self, tick: i64) -> bool {
        self.tick_lower as i64 <= tick && tick < self.tick_upper as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRow {
    pub range_index: usize,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub width: i64,
}

/// Sorted by (lower, upper); `range_index` is the position after sorting.
pub fn sorted_ranges(ranges: &[TickRange]) -> Vec<RangeRow> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by_key(|r| (r.tick_lower, r.tick_upper));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, r)| RangeRow { range_index: i, tick_lower: r.tick_lower, tick_upper: r.tick_upper, width: r.width() })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageBin {
    pub tick: i64,
    pub active_range_coverage_count: usize,
}

/// One bin per spacing step from snap(min lower) to snap(max upper), inclusive.
pub fn coverage_bins(ranges: &[TickRange], tick_spacing: i32) -> Vec<CoverageBin> {
    let (Some(min_lower), Some(max_upper)) =
        (ranges.iter().map(|r| r.tick_lower).min(), ranges.iter().map(|r| r.tick_upper).max())
    else {
        return Vec::new();
    };
    let spacing = tick_spacing.max(1) as i64;
    let start = snap_tick(min_lower, tick_spacing) as i64;
    let end = snap_tick(max_upper, tick_spacing) as i64;

    let mut bins = Vec::new();
    let mut t = start;
    while t <= end {
        let count = ranges.iter().filter(|r| r.covers(t)).count();
        bins.push(CoverageBin { tick: t, active_range_coverage_count: count });
        t += spacing;
    }
    bins
}

/// (tick, snapped tick) for a human price of currency1 per currency0.
pub fn estimate_current_tick(price_1_per_0: &BigDecimal, dec0: u8, dec1: u8, tick_spacing: i32) -> Option<(i32, i32)> {
    if price_1_per_0.sign() != Sign::Plus {
        return None;
    }
    let tick = tick_at_raw_price(&raw_price_from_human(price_1_per_0, dec0, dec1))?;
    Some((tick, snap_tick(tick, tick_spacing)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquiditySnapshot {
    pub block_number: u64,
    pub vault: String,
    pub module: String,
    pub pool_key: PoolKey,
    pub currency0: Asset,
    pub currency1: Asset,
    pub ranges: Vec<RangeRow>,
    pub spot_1_per_0: Option<BigDecimal>,
    pub estimated_tick: Option<i32>,
    pub estimated_tick_snapped: Option<i32>,
}

/// Assemble the snapshot; a pool that cannot be micro-quoted just has no tick estimate.
pub async fn snapshot(
    venue: &ConcentratedLiquidityVenue,
    ranges: &[TickRange],
    block: u64,
    vault: String,
    module: String,
) -> Result<LiquiditySnapshot, QuoteError> {
    if ranges.is_empty() {
        return Err(QuoteError::Configuration("vault module returned no ranges".to_string()));
    }
    let (c0, c1) = venue.currencies();
    let key = venue.pool_key().clone();

    let quoter = venue.quoter(block);
    let spot = match quoter.spot_price(&TradeLeg::new(c0.clone(), c1.clone())).await {
        Ok(p) => Some(p),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            log::warn!("no spot for tick estimate at block {}: {}", block, e);
            None
        }
    };
    let estimate = spot
        .as_ref()
        .and_then(|p| estimate_current_tick(p, c0.decimals, c1.decimals, key.tick_spacing));

    Ok(LiquiditySnapshot {
        block_number: block,
        vault,
        module,
        currency0: c0.clone(),
        currency1: c1.clone(),
        pool_key: key,
        ranges: sorted_ranges(ranges),
        spot_1_per_0: spot,
        estimated_tick: estimate.map(|(t, _)| t),
        estimated_tick_snapped: estimate.map(|(_, s)| s),
    })
}
