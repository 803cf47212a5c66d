// Execution-quality series
// ------------------------
// Cartesian product {block x direction x USD notional} evaluated against one venue.
//
// Per block (bounded fan-out):   timestamp, numeraire USD price, block-bound quoter, reference spot
// Per combination (bounded):     size -> quote -> average price -> slippage
//
// The reference spot is measured once per block on the token -> numeraire leg; the opposite
// leg uses its reciprocal. Any combination that cannot be sized, quoted or priced is omitted,
// never zero-filled. Only configuration errors abort the whole series.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use num_bigint::Sign;
use num_traits::One;

use crate::errors::QuoteError;
use crate::engine::quoter::{Quoter, VenueSource};
use crate::math::fixed_point::FixedPointAmount;
use crate::math::slippage::{average_execution_price, evaluate, size_trade};
use crate::models::{MarketPair, SlippageRecord, TradeLeg};

/// Block metadata and the numeraire's USD reference price.
#[async_trait]
pub trait MarketContext: Send + Sync {
    async fn block_timestamp(&self, block: u64) -> Result<u64, QuoteError>;

    /// USD per unit of numeraire at `block`; `None` when the reference is unavailable.
    async fn numeraire_usd(&self, block: u64) -> Result<Option<BigDecimal>, QuoteError>;
}

#[derive(Debug, Clone)]
pub struct SeriesConfig {
    pub usd_notionals: Vec<BigDecimal>,
    pub max_concurrency: usize,
    pub call_timeout: Duration,
}

/// Everything the per-combination jobs need at one block.
pub struct BlockContext {
    pub block: u64,
    pub timestamp: u64,
    pub datetime_utc: DateTime<Utc>,
    pub quoter: Arc<dyn Quoter>,
    /// numeraire per token, fee-free
    pub base_spot: BigDecimal,
    pub numeraire_usd: BigDecimal,
}

impl BlockContext {
    fn spot_for(&self, is_base_leg: bool) -> BigDecimal {
        if is_base_leg {
            self.base_spot.clone()
        } else {
            BigDecimal::one() / &self.base_spot
        }
    }

    fn usd_price_of_input(&self, is_base_leg: bool) -> BigDecimal {
        if is_base_leg {
            &self.base_spot * &self.numeraire_usd
        } else {
            self.numeraire_usd.clone()
        }
    }
}

pub struct ExecutionQualitySeries<'a> {
    venue: &'a dyn VenueSource,
    context: &'a dyn MarketContext,
    pair: MarketPair,
    config: SeriesConfig,
}

/// Skip the row on recoverable errors, surface configuration errors.
pub(crate) fn recover<T>(res: Result<T, QuoteError>, what: &str, block: u64) -> Result<Option<T>, QuoteError> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_fatal() => {
            log::error!("{} at block {}: {}", what, block, e);
            Err(e)
        }
        Err(e) => {
            log::debug!("skipping {} at block {}: {}", what, block, e);
            Ok(None)
        }
    }
}

/// Per-call deadline on a remote request.
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, QuoteError>
where
    F: Future<Output = Result<T, QuoteError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(QuoteError::Timeout(limit.as_secs())),
    }
}

impl<'a> ExecutionQualitySeries<'a> {
    pub fn new(venue: &'a dyn VenueSource, context: &'a dyn MarketContext, pair: MarketPair, config: SeriesConfig) -> Self {
        Self { venue, context, pair, config }
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, QuoteError>
    where
        F: Future<Output = Result<T, QuoteError>>,
    {
        with_timeout(self.config.call_timeout, fut).await
    }

    /// Build the full series, sorted by (block, direction, usd_notional).
    pub async fn build(&self, blocks: &[u64]) -> Result<Vec<SlippageRecord>, QuoteError> {
        let limit = self.config.max_concurrency.max(1);

        let contexts: Vec<BlockContext> = stream::iter(blocks.iter().copied().map(|b| self.load_block(b)))
            .buffer_unordered(limit)
            .try_collect::<Vec<Option<BlockContext>>>()
            .await?
            .into_iter()
            .flatten()
            .collect();

        log::info!(
            "{}: {}/{} sampled blocks have a usable spot price",
            self.venue.venue(),
            contexts.len(),
            blocks.len()
        );

        let legs = self.pair.legs();
        let mut jobs = Vec::new();
        for ctx in &contexts {
            for (i, leg) in legs.iter().enumerate() {
                for notional in &self.config.usd_notionals {
                    jobs.push((ctx, leg, i == 0, notional));
                }
            }
        }

        let mut records: Vec<SlippageRecord> = stream::iter(
            jobs.into_iter()
                .map(|(ctx, leg, is_base, notional)| self.evaluate_combination(ctx, leg, is_base, notional)),
        )
        .buffer_unordered(limit)
        .try_collect::<Vec<Option<SlippageRecord>>>()
        .await?
        .into_iter()
        .flatten()
        .collect();

        records.sort_by(|a, b| {
            (a.block, &a.direction, &a.usd_notional_in).cmp(&(b.block, &b.direction, &b.usd_notional_in))
        });
        Ok(records)
    }

    /// Per-block context, or `None` when this block cannot produce any row.
    pub async fn load_block(&self, block: u64) -> Result<Option<BlockContext>, QuoteError> {
        let Some(timestamp) = recover(self.timed(self.context.block_timestamp(block)).await, "block timestamp", block)? else {
            return Ok(None);
        };
        let Some(datetime_utc) = Utc.timestamp_opt(timestamp as i64, 0).single() else {
            log::warn!("block {} has an unrepresentable timestamp {}", block, timestamp);
            return Ok(None);
        };

        let numeraire_usd = match recover(self.timed(self.context.numeraire_usd(block)).await, "reference price", block)? {
            Some(Some(p)) if p.sign() == Sign::Plus => p,
            _ => {
                log::debug!("no positive {} USD price at block {}", self.pair.numeraire.symbol, block);
                return Ok(None);
            }
        };

        let Some(quoter) = recover(self.timed(self.venue.quoter_at(block)).await, "pool state", block)? else {
            return Ok(None);
        };

        let base_leg = self.pair.base_leg();
        let Some(base_spot) = recover(self.timed(quoter.spot_price(&base_leg)).await, "spot price", block)? else {
            return Ok(None);
        };
        if base_spot.sign() != Sign::Plus {
            return Ok(None);
        }

        Ok(Some(BlockContext { block, timestamp, datetime_utc, quoter, base_spot, numeraire_usd }))
    }

    async fn evaluate_combination(
        &self,
        ctx: &BlockContext,
        leg: &TradeLeg,
        is_base_leg: bool,
        usd_notional: &BigDecimal,
    ) -> Result<Option<SlippageRecord>, QuoteError> {
        let block = ctx.block;
        let Some(amount_human) = size_trade(usd_notional, &ctx.usd_price_of_input(is_base_leg)) else {
            log::debug!("{} unsizeable at block {}", leg.label(), block);
            return Ok(None);
        };
        let amount_in = FixedPointAmount::from_human(&amount_human, leg.token_in.decimals)?;
        if !amount_in.is_positive() {
            return Ok(None);
        }

        let Some(quote) = recover(self.timed(ctx.quoter.quote_exact_input(leg, &amount_in)).await, "quote", block)? else {
            return Ok(None);
        };

        let amount_in_h = quote.amount_in.to_human();
        let amount_out_h = quote.amount_out.to_human();
        let Some(avg_exec_price) = average_execution_price(&amount_in_h, &amount_out_h) else {
            log::debug!("{} {} USD quoted zero output at block {}", leg.label(), usd_notional, block);
            return Ok(None);
        };

        let spot_price = ctx.spot_for(is_base_leg);
        let fee_rate = ctx.quoter.fee_rate();
        let Some(slippage) = evaluate(&spot_price, &avg_exec_price, &fee_rate) else {
            return Ok(None);
        };

        Ok(Some(SlippageRecord {
            venue: ctx.quoter.venue(),
            block,
            timestamp: ctx.timestamp,
            datetime_utc: ctx.datetime_utc,
            direction: leg.label(),
            usd_notional_in: usd_notional.clone(),
            amount_in: amount_in_h,
            amount_in_unit: leg.token_in.symbol.clone(),
            amount_out: amount_out_h,
            amount_out_unit: leg.token_out.symbol.clone(),
            spot_price,
            avg_exec_price,
            gross_slippage_pct: slippage.gross_pct,
            slippage_excl_fees_pct: slippage.excl_fees_pct,
            fee_rate,
            gas_estimate: quote.gas_estimate,
        }))
    }
}
