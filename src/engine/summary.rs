// Execution-quality summary: median / p90 / count of fee-excluded slippage per
// (venue, direction, USD notional).

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::math::stats::{median, p90};
use crate::models::SlippageRecord;

/// The fields of a series row the summary needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlippageSample {
    pub venue: String,
    pub direction: String,
    pub usd_notional: BigDecimal,
    pub slippage_excl_fees_pct: BigDecimal,
}

impl From<&SlippageRecord> for SlippageSample {
    fn from(r: &SlippageRecord) -> Self {
        Self {
            venue: r.venue.as_str().to_string(),
            direction: r.direction.clone(),
            usd_notional: r.usd_notional_in.clone(),
            slippage_excl_fees_pct: r.slippage_excl_fees_pct.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub venue: String,
    pub direction: String,
    pub usd_notional: BigDecimal,
    pub median_pct: BigDecimal,
    pub p90_pct: BigDecimal,
    pub count: usize,
}

/// One row per group, ordered by (venue, direction, notional).
pub fn summarize(samples: &[SlippageSample]) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<(String, String, BigDecimal), Vec<BigDecimal>> = BTreeMap::new();
    for s in samples {
        groups
            .entry((s.venue.clone(), s.direction.clone(), s.usd_notional.clone()))
            .or_default()
            .push(s.slippage_excl_fees_pct.clone());
    }

    groups
        .into_iter()
        .filter_map(|((venue, direction, usd_notional), values)| {
            Some(SummaryRow {
                median_pct: median(&values)?,
                p90_pct: p90(&values)?,
                count: values.len(),
                venue,
                direction,
                usd_notional,
            })
        })
        .collect()
}
