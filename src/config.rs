use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Mainnet defaults for the optional addresses.
pub const DEFAULT_V4_QUOTER: &str = "0x52F0E24D1c21C8A0cB1e5a5dD6198556BD9E1203";
pub const DEFAULT_V3_FACTORY: &str = "0x1F98431c8aD98523631AE4a59f267346ea31F984";
pub const DEFAULT_WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const DEFAULT_USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

#[derive(Debug, Clone)]
pub struct Config {
    pub ethereum_rpc_url: String,

    // Venues
    pub univ2_pair_address: String,
    pub arrakis_vault_address: String,
    pub uniswap_v4_quoter: String,
    pub uniswap_v3_factory: String,
    pub univ3_reference_fee: u32,

    // Reference tokens
    pub eth_weth_address: String,
    pub eth_usdc_address: String,

    // V2 fee fraction
    pub univ2_fee_numerator: u32,
    pub univ2_fee_denominator: u32,

    // Sampling
    pub usd_notionals: Vec<String>,
    pub univ2_block_stride: u64,
    pub univ4_block_stride: u64,
    pub vault_block_stride: u64,
    pub univ2_start_block: Option<u64>,
    pub max_sample_points: usize,
    pub v4_spot_tiny_amount: String,

    // Remote calls
    pub max_concurrent_quotes: usize,
    pub rpc_call_timeout_secs: u64,

    // Migration
    pub migration_block: Option<u64>,
    pub migration_block_file: PathBuf,
    pub burn_scan_window: u64,
    pub log_chunk_blocks: u64,

    pub output_dir: PathBuf,
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn optional<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// "1000, 5000,10000" -> ["1000", "5000", "10000"]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load configuration files (secrets first, then public config)
        dotenv::from_filename("secrets.env").ok();
        dotenv::from_filename("addresses.env").ok();
        dotenv::from_filename("config/addresses.env").ok();
        dotenv::dotenv().ok();

        let output_dir = PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| "data/processed".to_string()));
        let migration_block_file = env::var("MIGRATION_BLOCK_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| output_dir.join("migration_block_final.json"));

        Ok(Config {
            ethereum_rpc_url: env::var("ETHEREUM_RPC_URL")
                .map_err(|_| "ETHEREUM_RPC_URL must be set")?,

            univ2_pair_address: env::var("UNIV2_PAIR_ADDRESS")
                .map_err(|_| "UNIV2_PAIR_ADDRESS must be set")?,
            arrakis_vault_address: env::var("ARRAKIS_VAULT_ADDRESS")
                .map_err(|_| "ARRAKIS_VAULT_ADDRESS must be set")?,
            uniswap_v4_quoter: env::var("UNISWAP_V4_QUOTER")
                .unwrap_or_else(|_| DEFAULT_V4_QUOTER.to_string()),
            uniswap_v3_factory: env::var("UNISWAP_V3_FACTORY")
                .unwrap_or_else(|_| DEFAULT_V3_FACTORY.to_string()),
            univ3_reference_fee: parsed_or("UNIV3_REFERENCE_FEE", 500),

            eth_weth_address: env::var("ETH_WETH_ADDRESS").unwrap_or_else(|_| DEFAULT_WETH.to_string()),
            eth_usdc_address: env::var("ETH_USDC_ADDRESS").unwrap_or_else(|_| DEFAULT_USDC.to_string()),

            univ2_fee_numerator: parsed_or("UNIV2_FEE_NUMERATOR", 997),
            univ2_fee_denominator: parsed_or("UNIV2_FEE_DENOMINATOR", 1000),

            usd_notionals: split_list(&env::var("USD_NOTIONALS").unwrap_or_else(|_| "1000,5000,10000,50000".to_string())),
            univ2_block_stride: parsed_or("UNIV2_BLOCK_STRIDE", 300),
            univ4_block_stride: parsed_or("UNIV4_BLOCK_STRIDE", 300),
            vault_block_stride: parsed_or("VAULT_BLOCK_STRIDE", 600),
            univ2_start_block: optional("UNIV2_START_BLOCK"),
            max_sample_points: parsed_or("MAX_SAMPLE_POINTS", 800),
            v4_spot_tiny_amount: env::var("V4_SPOT_TINY_AMOUNT").unwrap_or_else(|_| "0.000001".to_string()),

            max_concurrent_quotes: parsed_or("MAX_CONCURRENT_QUOTES", 8),
            rpc_call_timeout_secs: parsed_or("RPC_CALL_TIMEOUT_SECS", 20),

            migration_block: optional("MIGRATION_BLOCK"),
            migration_block_file,
            burn_scan_window: parsed_or("BURN_SCAN_WINDOW", 2000),
            log_chunk_blocks: parsed_or("LOG_CHUNK_BLOCKS", 500),

            output_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notional_list_tolerates_spaces_and_gaps() {
        assert_eq!(split_list("1000, 5000,,10000 "), vec!["1000", "5000", "10000"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn unset_or_malformed_values_fall_back() {
        assert_eq!(parsed_or("LM_TEST_UNSET_STRIDE", 300u64), 300);
        env::set_var("LM_TEST_BAD_STRIDE", "three hundred");
        assert_eq!(parsed_or("LM_TEST_BAD_STRIDE", 300u64), 300);
        env::set_var("LM_TEST_GOOD_STRIDE", " 600 ");
        assert_eq!(parsed_or("LM_TEST_GOOD_STRIDE", 300u64), 600);
        assert_eq!(optional::<u64>("LM_TEST_UNSET_BLOCK"), None);
    }
}
