// Pipeline stages
// ---------------
// Each stage wires chain clients into the engine and writes its artifacts under the output dir:
//
//   pair-metadata       univ2_pair_metadata.json
//   confirm-migration   migration_confirm_burns.csv
//   select-migration    migration_block_final.json
//   v2-slippage         univ2_slippage_pre_usd.{csv,json}
//   v4-slippage         univ4_slippage_post_usd.{csv,json}
//   vault-timeseries    vault_timeseries.csv, vault_performance.json
//   liquidity           univ4_active_ranges.csv, univ4_range_coverage.csv, univ4_liquidity_snapshot.json
//   summary             execution_quality_summary.{csv,json}

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{TimeZone, Utc};
use ethers::types::Address;

use crate::bootstrap::AppState;
use crate::chain::arrakis_client::ArrakisClient;
use crate::chain::price_oracle::EthUsdOracle;
use crate::chain::providers::{block_timestamp, latest_block};
use crate::chain::uniswap_v2_client::{load_pair_metadata, scan_burn_events, ConstantProductVenue};
use crate::chain::uniswap_v4_client::V4QuoterClient;
use crate::engine::liquidity::{coverage_bins, snapshot, LiquiditySnapshot};
use crate::engine::migration::{
    load_migration_block, scan_pages, select_migration_block, BurnEvent, MigrationEvidence, MigrationRecord,
};
use crate::engine::quoter::ConcentratedLiquidityVenue;
use crate::engine::sampling::{post_migration_blocks, pre_migration_blocks};
use crate::engine::series::ExecutionQualitySeries;
use crate::engine::summary::{summarize, SummaryRow};
use crate::engine::vault::{performance_summary, VaultPerformance, VaultSeriesBuilder};
use crate::models::{Asset, MarketPair, PairMetadata, SlippageRecord};
use crate::output::{read_json, write_csv, write_json, SlippageRow};

pub const PAIR_METADATA_FILE: &str = "univ2_pair_metadata.json";
pub const BURNS_FILE: &str = "migration_confirm_burns.csv";
pub const V2_SERIES_FILE: &str = "univ2_slippage_pre_usd";
pub const V4_SERIES_FILE: &str = "univ4_slippage_post_usd";
pub const VAULT_SERIES_FILE: &str = "vault_timeseries.csv";
pub const VAULT_PERFORMANCE_FILE: &str = "vault_performance.json";
pub const RANGES_FILE: &str = "univ4_active_ranges.csv";
pub const COVERAGE_FILE: &str = "univ4_range_coverage.csv";
pub const LIQUIDITY_SNAPSHOT_FILE: &str = "univ4_liquidity_snapshot.json";
pub const SUMMARY_FILE: &str = "execution_quality_summary";

fn remote(e: Box<dyn std::error::Error + Send + Sync>) -> anyhow::Error {
    anyhow!("{}", e)
}

/// Orders a pool's two assets as (token, numeraire); the numeraire is native ETH or WETH.
pub fn market_pair(a: &Asset, b: &Asset, weth: Address) -> Result<MarketPair> {
    let is_numeraire = |x: &Asset| x.is_native() || x.address == weth;
    match (is_numeraire(a), is_numeraire(b)) {
        (false, true) => Ok(MarketPair::new(a.clone(), b.clone())),
        (true, false) => Ok(MarketPair::new(b.clone(), a.clone())),
        _ => bail!("pool {}/{} does not pair exactly one token with ETH/WETH", a.symbol, b.symbol),
    }
}

async fn reference_oracle(state: &AppState) -> Result<EthUsdOracle> {
    EthUsdOracle::resolve(
        state.eth_provider.clone(),
        &state.tokens,
        state.uniswap_v3_factory,
        state.eth_weth_address,
        state.eth_usdc_address,
        state.univ3_reference_fee,
    )
    .await
    .map_err(remote)
    .context("failed to resolve the ETH/USD reference pool")
}

fn migration_block(state: &AppState) -> Result<u64> {
    load_migration_block(state.migration_block, &state.migration_block_file)
}

fn write_series(state: &AppState, stem: &str, records: &[SlippageRecord]) -> Result<()> {
    let rows: Vec<SlippageRow> = records.iter().map(SlippageRow::from).collect();
    write_csv(&state.output_path(&format!("{}.csv", stem)), &rows)?;
    write_json(&state.output_path(&format!("{}.json", stem)), &rows)?;
    Ok(())
}

// ------------------------------ Migration ----------------------------------

pub async fn pair_metadata(state: &AppState, block: Option<u64>) -> Result<PairMetadata> {
    let block = match block {
        Some(b) => b,
        None => latest_block(&state.eth_provider).await.map_err(remote)?,
    };
    let meta = load_pair_metadata(state.eth_provider.clone(), &state.tokens, state.univ2_pair, block)
        .await
        .map_err(remote)
        .context("failed to read V2 pair metadata")?;
    write_json(&state.output_path(PAIR_METADATA_FILE), &meta)?;
    Ok(meta)
}

pub async fn confirm_migration(state: &AppState, candidate: u64) -> Result<Vec<BurnEvent>> {
    let latest = latest_block(&state.eth_provider).await.map_err(remote)?;
    let pages = scan_pages(candidate, state.burn_scan_window, state.log_chunk_blocks, latest);
    log::info!(
        "scanning Burn logs {}..={} in {} pages",
        pages.first().map(|p| p.0).unwrap_or(candidate),
        pages.last().map(|p| p.1).unwrap_or(candidate),
        pages.len()
    );
    let burns = scan_burn_events(state.eth_provider.clone(), state.univ2_pair, &pages)
        .await
        .map_err(remote)
        .context("failed to scan Burn events")?;
    write_csv(&state.output_path(BURNS_FILE), &burns)?;
    Ok(burns)
}

pub async fn select_migration(
    state: &AppState,
    candidate: Option<u64>,
    regime_change_block: Option<u64>,
    sync_drop_block: Option<u64>,
) -> Result<MigrationRecord> {
    let burns = match candidate.or(sync_drop_block) {
        Some(center) => confirm_migration(state, center).await?,
        None => Vec::new(),
    };
    let evidence = MigrationEvidence { burns, regime_change_block, sync_drop_block };
    let mut selected = select_migration_block(&evidence)?;

    match block_timestamp(&state.eth_provider, selected.migration_block_final).await {
        Ok(ts) => selected.migration_time_utc = Utc.timestamp_opt(ts as i64, 0).single(),
        Err(e) => log::warn!("no timestamp for block {}: {}", selected.migration_block_final, e),
    }
    log::info!("migration block {} selected by {:?}", selected.migration_block_final, selected.selected_by);

    let record = MigrationRecord::new(selected, &evidence);
    write_json(&state.migration_block_file, &record)?;
    Ok(record)
}

// ------------------------------ Slippage -----------------------------------

pub async fn v2_slippage(state: &AppState) -> Result<Vec<SlippageRecord>> {
    let migration = migration_block(state)?;
    let start = state
        .univ2_start_block
        .unwrap_or_else(|| migration.saturating_sub(100 * state.univ2_block_stride));
    let blocks = pre_migration_blocks(start, migration, state.univ2_block_stride, state.max_sample_points);
    if blocks.is_empty() {
        bail!("empty pre-migration window {}..{}", start, migration);
    }

    let meta = load_pair_metadata(state.eth_provider.clone(), &state.tokens, state.univ2_pair, migration.saturating_sub(1))
        .await
        .map_err(remote)?;
    let pair = market_pair(&meta.token0, &meta.token1, state.eth_weth_address)?;
    let venue = ConstantProductVenue::new(state.eth_provider.clone(), &meta, state.univ2_fee);
    let oracle = reference_oracle(state).await?;

    log::info!("V2 pre-migration: {} blocks {}..={}", blocks.len(), blocks[0], blocks[blocks.len() - 1]);
    let records = ExecutionQualitySeries::new(&venue, &oracle, pair, state.series_config())
        .build(&blocks)
        .await
        .context("V2 execution-quality series aborted")?;

    write_series(state, V2_SERIES_FILE, &records)?;
    Ok(records)
}

struct V4Wiring {
    arrakis: ArrakisClient,
    module: Address,
    venue: ConcentratedLiquidityVenue,
    pair: MarketPair,
}

async fn v4_wiring(state: &AppState) -> Result<V4Wiring> {
    let arrakis = ArrakisClient::new(state.eth_provider.clone(), state.arrakis_vault);
    let module = arrakis.detect_module().await.map_err(remote)?;
    let key = arrakis.pool_key(module).await.map_err(remote).context("failed to read the pool key")?;
    let currency0 = state.tokens.asset(key.currency0).await.map_err(remote)?;
    let currency1 = state.tokens.asset(key.currency1).await.map_err(remote)?;
    log::info!(
        "V4 pool {}/{} fee={} spacing={} hooks={:?}",
        currency0.symbol,
        currency1.symbol,
        key.fee_ppm,
        key.tick_spacing,
        key.hooks
    );

    let pair = market_pair(&currency0, &currency1, state.eth_weth_address)?;
    let oracle = Arc::new(V4QuoterClient::new(state.eth_provider.clone(), state.uniswap_v4_quoter));
    let venue = ConcentratedLiquidityVenue::new(oracle, key, currency0, currency1, state.v4_micro_amount.clone(), Vec::new())?;
    Ok(V4Wiring { arrakis, module, venue, pair })
}

pub async fn v4_slippage(state: &AppState) -> Result<Vec<SlippageRecord>> {
    let migration = migration_block(state)?;
    let latest = latest_block(&state.eth_provider).await.map_err(remote)?;
    let blocks = post_migration_blocks(migration, latest, state.univ4_block_stride);
    if blocks.is_empty() {
        bail!("migration block {} is past the chain head {}", migration, latest);
    }

    let wiring = v4_wiring(state).await?;
    let oracle = reference_oracle(state).await?;

    log::info!("V4 post-migration: {} blocks {}..={}", blocks.len(), migration, latest);
    let records = ExecutionQualitySeries::new(&wiring.venue, &oracle, wiring.pair, state.series_config())
        .build(&blocks)
        .await
        .context("V4 execution-quality series aborted")?;

    write_series(state, V4_SERIES_FILE, &records)?;
    Ok(records)
}

// -------------------------------- Vault ------------------------------------

pub async fn vault_timeseries(state: &AppState) -> Result<Option<VaultPerformance>> {
    let migration = migration_block(state)?;
    let latest = latest_block(&state.eth_provider).await.map_err(remote)?;
    let blocks = post_migration_blocks(migration, latest, state.vault_block_stride);

    let wiring = v4_wiring(state).await?;
    let oracle = reference_oracle(state).await?;

    let rows = VaultSeriesBuilder::new(
        &wiring.venue,
        &wiring.arrakis,
        &oracle,
        wiring.pair.clone(),
        state.max_concurrent_quotes,
        state.call_timeout,
    )
    .build(&blocks)
    .await
    .context("vault series aborted")?;

    write_csv(&state.output_path(VAULT_SERIES_FILE), &rows)?;
    let perf = performance_summary(&rows);
    match &perf {
        Some(p) => {
            log::info!(
                "vault {}..{}: vault index {:?}, hold {:?}, full range {:?}",
                p.start_block,
                p.end_block,
                p.vault_index_final.as_ref().map(|v| v.to_string()),
                p.hold_index_final.as_ref().map(|v| v.to_string()),
                p.full_range_lp_index_final.as_ref().map(|v| v.to_string())
            );
            write_json(&state.output_path(VAULT_PERFORMANCE_FILE), p)?;
        }
        None => log::warn!("no vault observations in {} sampled blocks", blocks.len()),
    }
    Ok(perf)
}

// ------------------------------ Liquidity ----------------------------------

pub async fn liquidity(state: &AppState, block: Option<u64>) -> Result<LiquiditySnapshot> {
    let block = match block {
        Some(b) => b,
        None => latest_block(&state.eth_provider).await.map_err(remote)?,
    };
    let wiring = v4_wiring(state).await?;
    let ranges = wiring.arrakis.ranges(wiring.module, block).await.map_err(remote)?;
    match wiring.arrakis.pool_manager(wiring.module).await {
        Ok(pm) => log::info!("pool manager {:?}", pm),
        Err(e) => log::debug!("poolManager() unavailable: {}", e),
    }

    let snap = snapshot(
        &wiring.venue,
        &ranges,
        block,
        format!("{:?}", wiring.arrakis.vault_address()),
        format!("{:?}", wiring.module),
    )
    .await?;
    let bins = coverage_bins(&ranges, snap.pool_key.tick_spacing);

    write_json(&state.output_path(LIQUIDITY_SNAPSHOT_FILE), &snap)?;
    write_csv(&state.output_path(RANGES_FILE), &snap.ranges)?;
    write_csv(&state.output_path(COVERAGE_FILE), &bins)?;
    Ok(snap)
}

// ------------------------------- Summary -----------------------------------

pub fn summary(state: &AppState) -> Result<Vec<SummaryRow>> {
    let mut samples = Vec::new();
    for stem in [V2_SERIES_FILE, V4_SERIES_FILE] {
        let rows: Vec<SlippageRow> = read_json(&state.output_path(&format!("{}.json", stem)))?;
        for row in &rows {
            samples.push(row.to_sample()?);
        }
    }
    let table = summarize(&samples);
    write_csv(&state.output_path(&format!("{}.csv", SUMMARY_FILE)), &table)?;
    write_json(&state.output_path(&format!("{}.json", SUMMARY_FILE)), &table)?;
    Ok(table)
}
