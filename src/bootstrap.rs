use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use ethers::prelude::*;

use crate::chain::{providers, tokens::TokenRegistry};
use crate::config::Config;
use crate::engine::series::SeriesConfig;
use crate::math::constant_product::FeeFraction;
use crate::math::fixed_point::parse_decimal;

pub struct AppState {
    pub eth_provider: Arc<Provider<Http>>,
    pub tokens: TokenRegistry,

    // Venues
    pub univ2_pair: Address,
    pub arrakis_vault: Address,
    pub uniswap_v4_quoter: Address,
    pub uniswap_v3_factory: Address,
    pub univ3_reference_fee: u32,

    // Reference tokens
    pub eth_weth_address: Address,
    pub eth_usdc_address: Address,

    pub univ2_fee: FeeFraction,
    pub usd_notionals: Vec<BigDecimal>,
    pub v4_micro_amount: BigDecimal,

    pub univ2_block_stride: u64,
    pub univ4_block_stride: u64,
    pub vault_block_stride: u64,
    pub univ2_start_block: Option<u64>,
    pub max_sample_points: usize,

    pub max_concurrent_quotes: usize,
    pub call_timeout: Duration,

    pub migration_block: Option<u64>,
    pub migration_block_file: PathBuf,
    pub burn_scan_window: u64,
    pub log_chunk_blocks: u64,

    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let eth_provider = providers::create_ethereum_provider(&config.ethereum_rpc_url)?;
        let tokens = TokenRegistry::new(eth_provider.clone());

        let univ2_fee = FeeFraction::new(config.univ2_fee_numerator, config.univ2_fee_denominator).ok_or_else(|| {
            format!(
                "invalid V2 fee fraction {}/{}",
                config.univ2_fee_numerator, config.univ2_fee_denominator
            )
        })?;

        let usd_notionals = config
            .usd_notionals
            .iter()
            .map(|s| parse_decimal(s))
            .collect::<Result<Vec<_>, _>>()?;
        if usd_notionals.is_empty() {
            return Err("USD_NOTIONALS must list at least one size".into());
        }

        Ok(AppState {
            eth_provider,
            tokens,

            univ2_pair: Address::from_str(&config.univ2_pair_address)?,
            arrakis_vault: Address::from_str(&config.arrakis_vault_address)?,
            uniswap_v4_quoter: Address::from_str(&config.uniswap_v4_quoter)?,
            uniswap_v3_factory: Address::from_str(&config.uniswap_v3_factory)?,
            univ3_reference_fee: config.univ3_reference_fee,

            eth_weth_address: Address::from_str(&config.eth_weth_address)?,
            eth_usdc_address: Address::from_str(&config.eth_usdc_address)?,

            univ2_fee,
            usd_notionals,
            v4_micro_amount: parse_decimal(&config.v4_spot_tiny_amount)?,

            univ2_block_stride: config.univ2_block_stride,
            univ4_block_stride: config.univ4_block_stride,
            vault_block_stride: config.vault_block_stride,
            univ2_start_block: config.univ2_start_block,
            max_sample_points: config.max_sample_points,

            max_concurrent_quotes: config.max_concurrent_quotes.max(1),
            call_timeout: Duration::from_secs(config.rpc_call_timeout_secs.max(1)),

            migration_block: config.migration_block,
            migration_block_file: config.migration_block_file.clone(),
            burn_scan_window: config.burn_scan_window,
            log_chunk_blocks: config.log_chunk_blocks,

            output_dir: config.output_dir.clone(),
        })
    }

    pub fn series_config(&self) -> SeriesConfig {
        SeriesConfig {
            usd_notionals: self.usd_notionals.clone(),
            max_concurrency: self.max_concurrent_quotes,
            call_timeout: self.call_timeout,
        }
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}
