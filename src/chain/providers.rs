use ethers::prelude::*;
use std::sync::Arc;

pub fn create_ethereum_provider(rpc_url: &str) -> Result<Arc<Provider<Http>>, Box<dyn std::error::Error + Send + Sync>> {
    let provider = Provider::<Http>::try_from(rpc_url)?;
    Ok(Arc::new(provider))
}

/// Historical calls are pinned to an explicit block number.
#[inline]
pub fn at_block(block: u64) -> BlockId {
    BlockId::Number(BlockNumber::Number(U64::from(block)))
}

pub async fn latest_block(provider: &Provider<Http>) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
    Ok(provider.get_block_number().await?.as_u64())
}

pub async fn block_timestamp(provider: &Provider<Http>, block: u64) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
    let header = provider
        .get_block(at_block(block))
        .await?
        .ok_or_else(|| format!("block {} not found", block))?;
    Ok(header.timestamp.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_block_is_a_number() {
        assert_eq!(at_block(19_000_000), BlockId::Number(BlockNumber::Number(19_000_000u64.into())));
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(create_ethereum_provider("not a url").is_err());
    }
}
