// Vault composition and performance over time
// -------------------------------------------
// Per sampled block: reference spot from the pool's micro-quote, `totalUnderlying()` of the vault,
// and the numeraire's USD price. `totalUnderlying` does not say which leg is which, so the
// orientation whose amount ratio sits closest to spot (in log distance) is taken.
//
// Baselines over the whole series (t0 = first row):
// - hold: the t0 amounts held untouched
// - full range: a constant-product position with the t0 amounts, no fees
//     k = numeraire0 * token0 ; token = sqrt(k / p) ; numeraire = sqrt(k * p) ; p = numeraire per token

use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use num_bigint::{BigInt, Sign};
use num_traits::One;
use serde::{Deserialize, Serialize};

use crate::engine::quoter::VenueSource;
use crate::engine::series::{recover, with_timeout, MarketContext};
use crate::errors::QuoteError;
use crate::math::fixed_point::FixedPointAmount;
use crate::models::{Asset, MarketPair};

#[async_trait]
pub trait VaultReader: Send + Sync {
    /// Raw (underlying0, underlying1) held by the vault at `block`.
    async fn total_underlying(&self, block: u64) -> Result<(BigInt, BigInt), QuoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnderlyingMapping {
    #[serde(rename = "u0_token_u1_numeraire")]
    U0TokenU1Numeraire,
    #[serde(rename = "u0_numeraire_u1_token")]
    U0NumeraireU1Token,
    /// Ratio undecidable (an empty leg); u0 is taken as the token.
    #[serde(rename = "assume_u0_token_u1_numeraire")]
    Assumed,
}

impl UnderlyingMapping {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnderlyingMapping::U0TokenU1Numeraire => "u0_token_u1_numeraire",
            UnderlyingMapping::U0NumeraireU1Token => "u0_numeraire_u1_token",
            UnderlyingMapping::Assumed => "assume_u0_token_u1_numeraire",
        }
    }
}

/// Multiplicative distance max(a/b, b/a); ordering matches |ln a - ln b|.
fn ratio_distance(a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
    let r = a / b;
    let inv = BigDecimal::one() / &r;
    if r > inv {
        r
    } else {
        inv
    }
}

/// Returns (mapping, token amount, numeraire amount), human units.
pub fn choose_underlying_mapping(
    u0_raw: &BigInt,
    u1_raw: &BigInt,
    token: &Asset,
    numeraire: &Asset,
    spot_token_per_numeraire: &BigDecimal,
) -> Result<(UnderlyingMapping, BigDecimal, BigDecimal), QuoteError> {
    let as_token = |raw: &BigInt| FixedPointAmount::new(raw.clone(), token.decimals).map(|a| a.to_human());
    let as_numeraire = |raw: &BigInt| FixedPointAmount::new(raw.clone(), numeraire.decimals).map(|a| a.to_human());

    // candidate A: u0 = token, u1 = numeraire
    let a_token = as_token(u0_raw)?;
    let a_num = as_numeraire(u1_raw)?;
    // candidate B: u0 = numeraire, u1 = token
    let b_token = as_token(u1_raw)?;
    let b_num = as_numeraire(u0_raw)?;

    let positive = |x: &BigDecimal| x.sign() == Sign::Plus;
    if !positive(&a_token) || !positive(&a_num) || !positive(spot_token_per_numeraire) {
        return Ok((UnderlyingMapping::Assumed, a_token, a_num));
    }

    let d_a = ratio_distance(&(&a_token / &a_num), spot_token_per_numeraire);
    let d_b = ratio_distance(&(&b_token / &b_num), spot_token_per_numeraire);
    if d_a <= d_b {
        Ok((UnderlyingMapping::U0TokenU1Numeraire, a_token, a_num))
    } else {
        Ok((UnderlyingMapping::U0NumeraireU1Token, b_token, b_num))
    }
}

/// One sampled block of vault state, valued in USD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultObservation {
    pub block: u64,
    pub timestamp: u64,
    pub datetime_utc: DateTime<Utc>,
    pub underlying0_raw: BigInt,
    pub underlying1_raw: BigInt,
    pub mapping: UnderlyingMapping,
    pub amt_token: BigDecimal,
    pub amt_numeraire: BigDecimal,
    pub numeraire_usd: BigDecimal,
    pub spot_token_per_numeraire: BigDecimal,
    pub spot_numeraire_per_token: BigDecimal,
    pub token_usd: BigDecimal,
    pub value_numeraire_usd: BigDecimal,
    pub value_token_usd: BigDecimal,
    pub value_total_usd: BigDecimal,
}

impl VaultObservation {
    pub fn new(
        block: u64,
        timestamp: u64,
        datetime_utc: DateTime<Utc>,
        underlying: (BigInt, BigInt),
        pair: &MarketPair,
        spot_numeraire_per_token: BigDecimal,
        numeraire_usd: BigDecimal,
    ) -> Result<Self, QuoteError> {
        if spot_numeraire_per_token.sign() != Sign::Plus {
            return Err(QuoteError::Unquotable(format!("non-positive spot at block {}", block)));
        }
        let spot_token_per_numeraire = BigDecimal::one() / &spot_numeraire_per_token;
        let (mapping, amt_token, amt_numeraire) =
            choose_underlying_mapping(&underlying.0, &underlying.1, &pair.token, &pair.numeraire, &spot_token_per_numeraire)?;

        let token_usd = &spot_numeraire_per_token * &numeraire_usd;
        let value_numeraire_usd = &amt_numeraire * &numeraire_usd;
        let value_token_usd = &amt_token * &token_usd;
        let value_total_usd = &value_numeraire_usd + &value_token_usd;

        Ok(Self {
            block,
            timestamp,
            datetime_utc,
            underlying0_raw: underlying.0,
            underlying1_raw: underlying.1,
            mapping,
            amt_token,
            amt_numeraire,
            numeraire_usd,
            spot_token_per_numeraire,
            spot_numeraire_per_token,
            token_usd,
            value_numeraire_usd,
            value_token_usd,
            value_total_usd,
        })
    }
}

/// Observation plus baselines and t0-relative indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRow {
    pub observation: VaultObservation,
    pub hold_value_usd: BigDecimal,
    pub full_range_amt_token: Option<BigDecimal>,
    pub full_range_amt_numeraire: Option<BigDecimal>,
    pub full_range_value_usd: Option<BigDecimal>,
    pub vault_value_index: Option<BigDecimal>,
    pub hold_value_index: Option<BigDecimal>,
    pub full_range_value_index: Option<BigDecimal>,
}

fn index_of(value: &BigDecimal, base: &BigDecimal) -> Option<BigDecimal> {
    if base.sign() != Sign::Plus {
        return None;
    }
    Some(value / base)
}

/// Attach hold / full-range baselines. Input must be sorted by block.
pub fn with_baselines(observations: Vec<VaultObservation>) -> Vec<VaultRow> {
    let Some(first) = observations.first() else {
        return Vec::new();
    };
    let token0 = first.amt_token.clone();
    let numeraire0 = first.amt_numeraire.clone();
    let has_full_range = token0.sign() == Sign::Plus
        && numeraire0.sign() == Sign::Plus
        && first.spot_numeraire_per_token.sign() == Sign::Plus;
    let k = &token0 * &numeraire0;

    let mut rows: Vec<VaultRow> = observations
        .into_iter()
        .map(|obs| {
            let hold_value_usd = &numeraire0 * &obs.numeraire_usd + &token0 * &obs.token_usd;

            let (fr_token, fr_num) = if has_full_range {
                let p = &obs.spot_numeraire_per_token;
                ((&k / p).sqrt(), (&k * p).sqrt())
            } else {
                (None, None)
            };
            let full_range_value_usd = match (&fr_token, &fr_num) {
                (Some(t), Some(n)) => Some(n * &obs.numeraire_usd + t * &obs.token_usd),
                _ => None,
            };

            VaultRow {
                observation: obs,
                hold_value_usd,
                full_range_amt_token: fr_token,
                full_range_amt_numeraire: fr_num,
                full_range_value_usd,
                vault_value_index: None,
                hold_value_index: None,
                full_range_value_index: None,
            }
        })
        .collect();

    let v0 = rows[0].observation.value_total_usd.clone();
    let h0 = rows[0].hold_value_usd.clone();
    let f0 = rows[0].full_range_value_usd.clone();
    for row in rows.iter_mut() {
        row.vault_value_index = index_of(&row.observation.value_total_usd, &v0);
        row.hold_value_index = index_of(&row.hold_value_usd, &h0);
        row.full_range_value_index = match (&row.full_range_value_usd, &f0) {
            (Some(v), Some(base)) => index_of(v, base),
            _ => None,
        };
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPerformance {
    pub start_block: u64,
    pub end_block: u64,
    pub start_datetime_utc: DateTime<Utc>,
    pub end_datetime_utc: DateTime<Utc>,
    pub observations: usize,
    pub vault_index_final: Option<BigDecimal>,
    pub hold_index_final: Option<BigDecimal>,
    pub full_range_lp_index_final: Option<BigDecimal>,
}

pub fn performance_summary(rows: &[VaultRow]) -> Option<VaultPerformance> {
    let first = rows.first()?;
    let last = rows.last()?;
    Some(VaultPerformance {
        start_block: first.observation.block,
        end_block: last.observation.block,
        start_datetime_utc: first.observation.datetime_utc,
        end_datetime_utc: last.observation.datetime_utc,
        observations: rows.len(),
        vault_index_final: last.vault_value_index.clone(),
        hold_index_final: last.hold_value_index.clone(),
        full_range_lp_index_final: last.full_range_value_index.clone(),
    })
}

// ------------------------------- Collection ---------------------------------

pub struct VaultSeriesBuilder<'a> {
    venue: &'a dyn VenueSource,
    vault: &'a dyn VaultReader,
    context: &'a dyn MarketContext,
    pair: MarketPair,
    max_concurrency: usize,
    call_timeout: Duration,
}

impl<'a> VaultSeriesBuilder<'a> {
    pub fn new(
        venue: &'a dyn VenueSource,
        vault: &'a dyn VaultReader,
        context: &'a dyn MarketContext,
        pair: MarketPair,
        max_concurrency: usize,
        call_timeout: Duration,
    ) -> Self {
        Self { venue, vault, context, pair, max_concurrency, call_timeout }
    }

    pub async fn build(&self, blocks: &[u64]) -> Result<Vec<VaultRow>, QuoteError> {
        let mut observations: Vec<VaultObservation> =
            stream::iter(blocks.iter().copied().map(|b| self.observe(b)))
                .buffer_unordered(self.max_concurrency.max(1))
                .try_collect::<Vec<Option<VaultObservation>>>()
                .await?
                .into_iter()
                .flatten()
                .collect();
        observations.sort_by_key(|o| o.block);
        log::info!("vault series: {}/{} blocks observed", observations.len(), blocks.len());
        Ok(with_baselines(observations))
    }

    async fn observe(&self, block: u64) -> Result<Option<VaultObservation>, QuoteError> {
        let limit = self.call_timeout;

        let Some(timestamp) = recover(with_timeout(limit, self.context.block_timestamp(block)).await, "block timestamp", block)? else {
            return Ok(None);
        };
        let Some(datetime_utc) = Utc.timestamp_opt(timestamp as i64, 0).single() else {
            return Ok(None);
        };

        let numeraire_usd = match recover(with_timeout(limit, self.context.numeraire_usd(block)).await, "reference price", block)? {
            Some(Some(p)) if p.sign() == Sign::Plus => p,
            _ => return Ok(None),
        };

        let Some(quoter) = recover(with_timeout(limit, self.venue.quoter_at(block)).await, "pool state", block)? else {
            return Ok(None);
        };
        let Some(spot) = recover(with_timeout(limit, quoter.spot_price(&self.pair.base_leg())).await, "spot price", block)? else {
            return Ok(None);
        };
        if spot.sign() != Sign::Plus {
            return Ok(None);
        }

        let Some(underlying) = recover(with_timeout(limit, self.vault.total_underlying(block)).await, "totalUnderlying", block)? else {
            return Ok(None);
        };

        VaultObservation::new(block, timestamp, datetime_utc, underlying, &self.pair, spot, numeraire_usd).map(Some)
    }
}
