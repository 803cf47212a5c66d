// ETH/USD reference price from the Uniswap V3 WETH/USDC pool
// ------------------------------------------------------------
// price_raw = sqrtPriceX96^2 / 2^192 (token1 base units per token0 base unit), exact.
// token0 = USDC: USD/ETH = 10^(dec_weth - dec_usdc) / price_raw
// token0 = WETH: USD/ETH = price_raw * 10^(dec_weth - dec_usdc)
//
// Also serves block timestamps, so it is the market context of every series.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::prelude::*;
use num_bigint::{BigInt, Sign};
use num_traits::One;
use std::sync::Arc;

use crate::chain::providers::{at_block, block_timestamp};
use crate::chain::tokens::TokenRegistry;
use crate::chain::u256_to_bigint;
use crate::engine::series::MarketContext;
use crate::errors::QuoteError;
use crate::math::fixed_point::pow10;

abigen!(
    UniswapV3Factory,
    r#"[
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool)
    ]"#
);

abigen!(
    UniswapV3Pool,
    r#"[
        function token0() external view returns (address)
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked)
    ]"#
);

/// USD per WETH from a V3 sqrt price. `None` for a non-positive sqrt price.
pub fn usd_per_weth_from_sqrt(sqrt_price_x96: &BigInt, usdc_is_token0: bool, weth_decimals: u8, usdc_decimals: u8) -> Option<BigDecimal> {
    if sqrt_price_x96.sign() != Sign::Plus {
        return None;
    }
    let q192 = BigInt::one() << 192;
    let price_raw = BigDecimal::from(sqrt_price_x96 * sqrt_price_x96) / BigDecimal::from(q192);

    let shift = weth_decimals as i32 - usdc_decimals as i32;
    let scale = BigDecimal::from(pow10(shift.unsigned_abs()));
    let adjust = |v: BigDecimal| if shift >= 0 { v * &scale } else { v / &scale };

    if usdc_is_token0 {
        Some(adjust(BigDecimal::one() / price_raw))
    } else {
        Some(adjust(price_raw))
    }
}

pub struct EthUsdOracle {
    provider: Arc<Provider<Http>>,
    pool: UniswapV3Pool<Provider<Http>>,
    usdc_is_token0: bool,
    weth_decimals: u8,
    usdc_decimals: u8,
}

impl EthUsdOracle {
    /// Look the pool up once through the factory.
    pub async fn resolve(
        provider: Arc<Provider<Http>>,
        tokens: &TokenRegistry,
        factory: Address,
        weth: Address,
        usdc: Address,
        fee: u32,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let factory = UniswapV3Factory::new(factory, provider.clone());
        let pool_address = factory.get_pool(weth, usdc, fee).call().await?;
        if pool_address.is_zero() {
            return Err(format!("no V3 WETH/USDC pool with fee {}", fee).into());
        }
        let pool = UniswapV3Pool::new(pool_address, provider.clone());
        let token0 = pool.token_0().call().await?;
        let weth_decimals = tokens.asset(weth).await?.decimals;
        let usdc_decimals = tokens.asset(usdc).await?.decimals;
        log::info!("ETH/USD reference pool {:?} (token0 = {:?})", pool_address, token0);

        Ok(Self { provider, pool, usdc_is_token0: token0 == usdc, weth_decimals, usdc_decimals })
    }

    pub async fn eth_usd_at(&self, block: u64) -> Result<Option<BigDecimal>, Box<dyn std::error::Error + Send + Sync>> {
        let (sqrt_price_x96, ..) = self.pool.slot_0().block(at_block(block)).call().await?;
        Ok(usd_per_weth_from_sqrt(
            &u256_to_bigint(sqrt_price_x96),
            self.usdc_is_token0,
            self.weth_decimals,
            self.usdc_decimals,
        ))
    }
}

#[async_trait]
impl MarketContext for EthUsdOracle {
    async fn block_timestamp(&self, block: u64) -> Result<u64, QuoteError> {
        block_timestamp(&self.provider, block)
            .await
            .map_err(|e| QuoteError::Remote(e.to_string()))
    }

    async fn numeraire_usd(&self, block: u64) -> Result<Option<BigDecimal>, QuoteError> {
        self.eth_usd_at(block).await.map_err(|e| QuoteError::Remote(e.to_string()))
    }
}
