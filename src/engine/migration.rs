// Migration block: confirmation from V2 Burn events and the final selection record.
//
// Selection priority:
//   1. block of the largest Burn by token1 amount inside the confirmation window
//   2. externally supplied regime-change estimate
//   3. externally supplied largest Sync-drop candidate

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// One decoded `Burn(address,uint256,uint256,address)` log of the V2 pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnEvent {
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u64,
    pub amount0_raw: BigInt,
    pub amount1_raw: BigInt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    LargestBurn,
    RegimeChange,
    LargestSyncDrop,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationEvidence {
    pub burns: Vec<BurnEvent>,
    pub regime_change_block: Option<u64>,
    pub sync_drop_block: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSelection {
    pub migration_block_final: u64,
    pub selected_by: SelectionRule,
    pub migration_time_utc: Option<DateTime<Utc>>,
    pub burns_in_window: usize,
    /// token1 amount of the winning burn, raw units
    pub top_burn_amount1_raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportingBlocks {
    pub regime_change_block_estimate: Option<u64>,
    pub sync_drop_candidate_block: Option<u64>,
}

/// Layout of the migration JSON artifact; `selected.migration_block_final` is what later stages read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub run_ts_utc: DateTime<Utc>,
    pub priority: Vec<SelectionRule>,
    pub selected: MigrationSelection,
    pub supporting: SupportingBlocks,
}

impl MigrationRecord {
    pub fn new(selected: MigrationSelection, evidence: &MigrationEvidence) -> Self {
        Self {
            run_ts_utc: Utc::now(),
            priority: vec![SelectionRule::LargestBurn, SelectionRule::RegimeChange, SelectionRule::LargestSyncDrop],
            selected,
            supporting: SupportingBlocks {
                regime_change_block_estimate: evidence.regime_change_block,
                sync_drop_candidate_block: evidence.sync_drop_block,
            },
        }
    }
}

/// Largest burn by token1; the earliest one wins a tie.
pub fn largest_burn(burns: &[BurnEvent]) -> Option<&BurnEvent> {
    burns.iter().max_by(|a, b| {
        a.amount1_raw
            .cmp(&b.amount1_raw)
            .then_with(|| (b.block_number, b.log_index).cmp(&(a.block_number, a.log_index)))
    })
}

pub fn select_migration_block(evidence: &MigrationEvidence) -> Result<MigrationSelection> {
    let burns_in_window = evidence.burns.len();

    if let Some(top) = largest_burn(&evidence.burns) {
        return Ok(MigrationSelection {
            migration_block_final: top.block_number,
            selected_by: SelectionRule::LargestBurn,
            migration_time_utc: None,
            burns_in_window,
            top_burn_amount1_raw: Some(top.amount1_raw.to_string()),
        });
    }

    let fallback = evidence
        .regime_change_block
        .map(|b| (b, SelectionRule::RegimeChange))
        .or_else(|| evidence.sync_drop_block.map(|b| (b, SelectionRule::LargestSyncDrop)));

    match fallback {
        Some((block, rule)) => Ok(MigrationSelection {
            migration_block_final: block,
            selected_by: rule,
            migration_time_utc: None,
            burns_in_window,
            top_burn_amount1_raw: None,
        }),
        None => bail!("cannot determine the migration block: no burns in window and no fallback candidate"),
    }
}

/// Inclusive `[from, to]` pages covering `center ± window`, each at most `chunk` blocks.
pub fn scan_pages(center: u64, window: u64, chunk: u64, latest: u64) -> Vec<(u64, u64)> {
    let from = center.saturating_sub(window);
    let to = center.saturating_add(window).min(latest);
    let chunk = chunk.max(1);

    let mut pages = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(chunk - 1).min(to);
        pages.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    pages
}

/// Reads `selected.migration_block_final` out of a migration JSON artifact.
pub fn migration_block_from_json(value: &serde_json::Value) -> Option<u64> {
    value.get("selected")?.get("migration_block_final")?.as_u64()
}

/// `MIGRATION_BLOCK` wins over the JSON artifact.
pub fn load_migration_block(explicit: Option<u64>, file: &Path) -> Result<u64> {
    if let Some(block) = explicit {
        return Ok(block);
    }
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read migration file {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", file.display()))?;
    migration_block_from_json(&value)
        .ok_or_else(|| anyhow!("{} has no selected.migration_block_final", file.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burn(block: u64, log_index: u64, amount1: u64) -> BurnEvent {
        BurnEvent {
            block_number: block,
            tx_hash: format!("0x{:064x}", block),
            log_index,
            amount0_raw: BigInt::from(1u8),
            amount1_raw: BigInt::from(amount1),
        }
    }

    #[test]
    fn largest_burn_wins() {
        let evidence = MigrationEvidence {
            burns: vec![burn(100, 0, 5), burn(120, 3, 900), burn(130, 1, 10)],
            regime_change_block: Some(50),
            sync_drop_block: Some(60),
        };
        let s = select_migration_block(&evidence).unwrap();
        assert_eq!(s.migration_block_final, 120);
        assert_eq!(s.selected_by, SelectionRule::LargestBurn);
        assert_eq!(s.burns_in_window, 3);
        assert_eq!(s.top_burn_amount1_raw.as_deref(), Some("900"));
    }

    #[test]
    fn ties_prefer_the_earliest_burn() {
        let burns = vec![burn(140, 0, 7), burn(110, 2, 7), burn(110, 1, 7)];
        let top = largest_burn(&burns).unwrap();
        assert_eq!((top.block_number, top.log_index), (110, 1));
    }

    #[test]
    fn fallbacks_follow_priority() {
        let s = select_migration_block(&MigrationEvidence {
            burns: vec![],
            regime_change_block: Some(50),
            sync_drop_block: Some(60),
        })
        .unwrap();
        assert_eq!((s.migration_block_final, s.selected_by), (50, SelectionRule::RegimeChange));

        let s = select_migration_block(&MigrationEvidence { sync_drop_block: Some(60), ..Default::default() }).unwrap();
        assert_eq!((s.migration_block_final, s.selected_by), (60, SelectionRule::LargestSyncDrop));

        assert!(select_migration_block(&MigrationEvidence::default()).is_err());
    }

    #[test]
    fn pages_cover_the_window() {
        let pages = scan_pages(10_000, 2_000, 500, u64::MAX);
        assert_eq!(pages.first(), Some(&(8_000, 8_499)));
        assert_eq!(pages.last(), Some(&(12_000, 12_000)));
        assert_eq!(pages.len(), 9);
        assert!(pages.windows(2).all(|w| w[0].1 + 1 == w[1].0));

        // clipped at genesis and at the chain head
        assert_eq!(scan_pages(100, 2_000, 5_000, 1_000), vec![(0, 1_000)]);
    }

    #[test]
    fn block_from_json_artifact() {
        let record = MigrationRecord::new(
            select_migration_block(&MigrationEvidence { burns: vec![burn(42, 0, 1)], ..Default::default() }).unwrap(),
            &MigrationEvidence::default(),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(migration_block_from_json(&value), Some(42));
        assert_eq!(value["selected"]["selected_by"], "largest_burn");
        assert_eq!(migration_block_from_json(&serde_json::json!({ "selected": {} })), None);
    }

    #[test]
    fn explicit_block_skips_the_file() {
        let missing = Path::new("/nonexistent/migration.json");
        assert_eq!(load_migration_block(Some(7), missing).unwrap(), 7);
        assert!(load_migration_block(None, missing).is_err());
    }
}
