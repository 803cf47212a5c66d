// Order statistics over exact decimals (linear interpolation between closest ranks).

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

/// Quantile `q_num / q_den` of `values` with linear interpolation, `None` when empty.
pub fn quantile(values: &[BigDecimal], q_num: u32, q_den: u32) -> Option<BigDecimal> {
    if values.is_empty() || q_den == 0 || q_num > q_den {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();

    // h = (n - 1) * q ; lo = floor(h) ; frac = h - lo
    let n_minus_1 = (sorted.len() - 1) as u64;
    let h_num = n_minus_1 * q_num as u64;
    let lo = (h_num / q_den as u64) as usize;
    let frac_num = h_num % q_den as u64;

    let lower = &sorted[lo];
    if frac_num == 0 || lo + 1 >= sorted.len() {
        return Some(lower.clone());
    }
    let upper = &sorted[lo + 1];
    let frac = BigDecimal::from(BigInt::from(frac_num)) / BigDecimal::from(q_den);
    Some(lower + (upper - lower) * frac)
}

pub fn median(values: &[BigDecimal]) -> Option<BigDecimal> {
    quantile(values, 1, 2)
}

pub fn p90(values: &[BigDecimal]) -> Option<BigDecimal> {
    quantile(values, 9, 10)
}
