// Arrakis vault wiring
// --------------------
// The vault delegates its position to a module; which getter exposes the module differs between
// vault generations, so `module`, `activeModule`, `getModule`, `strategy` are tried in order and
// the first non-zero answer wins. The module knows the V4 pool key and the live tick ranges.

use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;

use crate::chain::providers::at_block;
use crate::chain::u256_to_bigint;
use crate::engine::liquidity::TickRange;
use crate::engine::vault::VaultReader;
use crate::errors::QuoteError;
use crate::models::PoolKey;
use num_bigint::BigInt;

abigen!(
    ArrakisVault,
    r#"[
        function module() external view returns (address)
        function activeModule() external view returns (address)
        function getModule() external view returns (address)
        function strategy() external view returns (address)
        function owner() external view returns (address)
        function totalUnderlying() external view returns (uint256 amount0, uint256 amount1)
    ]"#
);

abigen!(
    ArrakisModule,
    r#"[
      {
        "type": "function",
        "name": "poolKey",
        "stateMutability": "view",
        "inputs": [],
        "outputs": [
          {"name": "currency0", "type": "address"},
          {"name": "currency1", "type": "address"},
          {"name": "fee", "type": "uint24"},
          {"name": "tickSpacing", "type": "int24"},
          {"name": "hooks", "type": "address"}
        ]
      },
      {
        "type": "function",
        "name": "poolManager",
        "stateMutability": "view",
        "inputs": [],
        "outputs": [{"name": "", "type": "address"}]
      },
      {
        "type": "function",
        "name": "getRanges",
        "stateMutability": "view",
        "inputs": [],
        "outputs": [
          {
            "name": "ranges",
            "type": "tuple[]",
            "components": [
              {"name": "tickLower", "type": "int24"},
              {"name": "tickUpper", "type": "int24"}
            ]
          }
        ]
      }
    ]"#
);

/// Getter names probed for the module address, in order.
pub const MODULE_GETTERS: [&str; 4] = ["module", "activeModule", "getModule", "strategy"];

pub struct ArrakisClient {
    provider: Arc<Provider<Http>>,
    vault: ArrakisVault<Provider<Http>>,
}

impl ArrakisClient {
    pub fn new(provider: Arc<Provider<Http>>, vault_address: Address) -> Self {
        let vault = ArrakisVault::new(vault_address, provider.clone());
        Self { provider, vault }
    }

    pub fn vault_address(&self) -> Address {
        self.vault.address()
    }

    pub async fn owner(&self) -> Result<Address, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.vault.owner().call().await?)
    }

    pub async fn detect_module(&self) -> Result<Address, Box<dyn std::error::Error + Send + Sync>> {
        for name in MODULE_GETTERS {
            let call = match name {
                "module" => self.vault.module(),
                "activeModule" => self.vault.active_module(),
                "getModule" => self.vault.get_module(),
                _ => self.vault.strategy(),
            };
            match call.call().await {
                Ok(addr) if !addr.is_zero() => {
                    log::info!("vault module via {}(): {:?}", name, addr);
                    return Ok(addr);
                }
                Ok(_) => log::debug!("{}() returned the zero address", name),
                Err(e) => log::debug!("{}() unavailable: {}", name, e),
            }
        }
        Err(format!("could not detect the module of vault {:?}", self.vault.address()).into())
    }

    pub async fn pool_key(&self, module: Address) -> Result<PoolKey, Box<dyn std::error::Error + Send + Sync>> {
        let m = ArrakisModule::new(module, self.provider.clone());
        let (currency0, currency1, fee_ppm, tick_spacing, hooks) = m.pool_key().call().await?;
        Ok(PoolKey { currency0, currency1, fee_ppm, tick_spacing, hooks })
    }

    pub async fn pool_manager(&self, module: Address) -> Result<Address, Box<dyn std::error::Error + Send + Sync>> {
        let m = ArrakisModule::new(module, self.provider.clone());
        Ok(m.pool_manager().call().await?)
    }

    pub async fn ranges(&self, module: Address, block: u64) -> Result<Vec<TickRange>, Box<dyn std::error::Error + Send + Sync>> {
        let m = ArrakisModule::new(module, self.provider.clone());
        let raw: Vec<(i32, i32)> = m.get_ranges().block(at_block(block)).call().await?;
        Ok(raw.into_iter().map(|(lower, upper)| TickRange::new(lower, upper)).collect())
    }

    pub async fn total_underlying_at(&self, block: u64) -> Result<(U256, U256), Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.vault.total_underlying().block(at_block(block)).call().await?)
    }
}

#[async_trait]
impl VaultReader for ArrakisClient {
    async fn total_underlying(&self, block: u64) -> Result<(BigInt, BigInt), QuoteError> {
        let (a0, a1) = self
            .total_underlying_at(block)
            .await
            .map_err(|e| QuoteError::Remote(e.to_string()))?;
        Ok((u256_to_bigint(a0), u256_to_bigint(a1)))
    }
}
