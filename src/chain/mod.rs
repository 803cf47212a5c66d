pub mod arrakis_client;
pub mod price_oracle;
pub mod providers;
pub mod tokens;
pub mod uniswap_v2_client;
pub mod uniswap_v4_client;

use ethers::types::U256;
use num_bigint::{BigInt, Sign};

pub fn u256_to_bigint(u: U256) -> BigInt {
    let mut buf = [0u8; 32];
    u.to_big_endian(&mut buf);
    BigInt::from_bytes_be(Sign::Plus, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u256_conversion_is_lossless() {
        for v in [
            U256::zero(),
            U256::one(),
            U256::from(u128::MAX),
            U256::from_dec_str("1461446703485210103287273052203988822378723970342").unwrap(),
            U256::MAX,
        ] {
            assert_eq!(u256_to_bigint(v).to_string(), v.to_string());
        }
    }
}
