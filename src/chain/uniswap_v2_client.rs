// Uniswap V2 pair reads: metadata, historical reserves, Burn logs.

use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;

use crate::chain::providers::at_block;
use crate::chain::tokens::TokenRegistry;
use crate::chain::u256_to_bigint;
use crate::engine::migration::BurnEvent;
use crate::engine::quoter::{ConstantProductQuoter, Quoter, VenueSource};
use crate::errors::QuoteError;
use crate::math::constant_product::{FeeFraction, PairReserves};
use crate::models::{Asset, PairMetadata, Venue};

abigen!(
    UniswapV2Pair,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
        event Burn(address indexed sender, uint256 amount0, uint256 amount1, address indexed to)
    ]"#
);

pub async fn load_pair_metadata(
    provider: Arc<Provider<Http>>,
    tokens: &TokenRegistry,
    pair: Address,
    block: u64,
) -> Result<PairMetadata, Box<dyn std::error::Error + Send + Sync>> {
    let contract = UniswapV2Pair::new(pair, provider.clone());
    let token0 = contract.token_0().block(at_block(block)).call().await?;
    let token1 = contract.token_1().block(at_block(block)).call().await?;
    let (r0, r1, ts_last) = contract.get_reserves().block(at_block(block)).call().await?;

    let token0 = tokens.asset(token0).await?;
    let token1 = tokens.asset(token1).await?;
    log::debug!("V2 pair {:?} at {}: {} {} / {} {}", pair, block, r0, token0.symbol, r1, token1.symbol);

    Ok(PairMetadata {
        pair,
        block,
        token0,
        token1,
        reserve0: r0.to_string(),
        reserve1: r1.to_string(),
        block_timestamp_last: ts_last,
    })
}

pub async fn reserves_at(
    provider: Arc<Provider<Http>>,
    pair: Address,
    block: u64,
) -> Result<PairReserves, Box<dyn std::error::Error + Send + Sync>> {
    let contract = UniswapV2Pair::new(pair, provider);
    let (r0, r1, _) = contract.get_reserves().block(at_block(block)).call().await?;
    Ok(PairReserves::new(r0, r1))
}

/// Burn logs over inclusive `(from, to)` pages, one `eth_getLogs` per page, in chain order.
pub async fn scan_burn_events(
    provider: Arc<Provider<Http>>,
    pair: Address,
    pages: &[(u64, u64)],
) -> Result<Vec<BurnEvent>, Box<dyn std::error::Error + Send + Sync>> {
    let contract = UniswapV2Pair::new(pair, provider);
    let mut burns = Vec::new();
    for &(from, to) in pages {
        let logs = contract
            .event::<BurnFilter>()
            .from_block(from)
            .to_block(to)
            .query_with_meta()
            .await?;
        log::debug!("Burn logs {}..={}: {}", from, to, logs.len());
        for (ev, meta) in logs {
            burns.push(BurnEvent {
                block_number: meta.block_number.as_u64(),
                tx_hash: format!("0x{}", hex::encode(meta.transaction_hash.as_bytes())),
                log_index: meta.log_index.as_u64(),
                amount0_raw: u256_to_bigint(ev.amount_0),
                amount1_raw: u256_to_bigint(ev.amount_1),
            });
        }
    }
    burns.sort_by_key(|b| (b.block_number, b.log_index));
    Ok(burns)
}

/// A V2 pair as a block-addressable venue: each block reads reserves once.
pub struct ConstantProductVenue {
    provider: Arc<Provider<Http>>,
    pair: Address,
    token0: Asset,
    token1: Asset,
    fee: FeeFraction,
}

impl ConstantProductVenue {
    pub fn new(provider: Arc<Provider<Http>>, metadata: &PairMetadata, fee: FeeFraction) -> Self {
        Self {
            provider,
            pair: metadata.pair,
            token0: metadata.token0.clone(),
            token1: metadata.token1.clone(),
            fee,
        }
    }
}

#[async_trait]
impl VenueSource for ConstantProductVenue {
    fn venue(&self) -> Venue {
        Venue::UniswapV2
    }

    async fn quoter_at(&self, block: u64) -> Result<Arc<dyn Quoter>, QuoteError> {
        let reserves = reserves_at(self.provider.clone(), self.pair, block)
            .await
            .map_err(|e| QuoteError::Remote(e.to_string()))?;
        if !reserves.is_quotable() {
            return Err(QuoteError::Unquotable(format!("empty reserves at block {}", block)));
        }
        Ok(Arc::new(ConstantProductQuoter::new(
            block,
            self.token0.clone(),
            self.token1.clone(),
            reserves,
            self.fee,
        )))
    }
}
