// Token metadata (symbol, decimals) with a per-run cache.
// Native ETH lives at the zero address in V4 pool keys and never hits the RPC.

use ethers::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::Asset;

abigen!(
    Erc20Metadata,
    r#"[
        function symbol() external view returns (string)
        function decimals() external view returns (uint8)
    ]"#
);

pub struct TokenRegistry {
    provider: Arc<Provider<Http>>,
    cache: Mutex<HashMap<Address, Asset>>,
}

impl TokenRegistry {
    pub fn new(provider: Arc<Provider<Http>>) -> Self {
        Self { provider, cache: Mutex::new(HashMap::new()) }
    }

    pub async fn asset(&self, address: Address) -> Result<Asset, Box<dyn std::error::Error + Send + Sync>> {
        if address.is_zero() {
            return Ok(Asset::native());
        }
        if let Some(hit) = self.cache.lock().await.get(&address) {
            return Ok(hit.clone());
        }

        let token = Erc20Metadata::new(address, self.provider.clone());
        let decimals = token.decimals().call().await?;
        // bytes32-symbol tokens revert on the string ABI; fall back to the address
        let symbol = match token.symbol().call().await {
            Ok(s) if !s.trim().is_empty() => s,
            _ => short_address(address),
        };
        log::debug!("token {:?}: {} ({} decimals)", address, symbol, decimals);

        let asset = Asset::new(address, symbol, decimals);
        self.cache.lock().await.insert(address, asset.clone());
        Ok(asset)
    }
}

/// `0xabcd..1234` style label.
pub fn short_address(address: Address) -> String {
    let h = hex::encode(address.as_bytes());
    format!("0x{}..{}", &h[..4], &h[h.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_address_keeps_both_ends() {
        let a = Address::from([0xab; 20]);
        assert_eq!(short_address(a), "0xabab..abab");
    }

    #[tokio::test]
    async fn native_currency_needs_no_rpc() {
        let provider = Arc::new(Provider::<Http>::try_from("http://127.0.0.1:1").unwrap());
        let registry = TokenRegistry::new(provider);
        let eth = registry.asset(Address::zero()).await.unwrap();
        assert_eq!(eth, Asset::native());
    }
}
