// Output artifacts: CSV (explicit header row) and pretty JSON.
// Every decimal is written as a plain decimal string, never a float.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::liquidity::{CoverageBin, RangeRow};
use crate::engine::migration::BurnEvent;
use crate::engine::summary::{SlippageSample, SummaryRow};
use crate::engine::vault::VaultRow;
use crate::math::fixed_point::{parse_decimal, to_decimal_string};
use crate::models::SlippageRecord;

/// Fractional digits kept when rendering decimals.
pub const DECIMAL_DIGITS: u32 = 40;

#[inline]
pub fn dec_str(value: &BigDecimal) -> String {
    to_decimal_string(value, DECIMAL_DIGITS)
}

fn opt_dec_str(value: &Option<BigDecimal>) -> String {
    value.as_ref().map(dec_str).unwrap_or_default()
}

// ------------------------------- Row types ---------------------------------

/// Serialized form of a `SlippageRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageRow {
    pub venue: String,
    pub block: u64,
    pub timestamp: u64,
    pub datetime_utc: String,
    pub direction: String,
    pub usd_notional_in: String,
    pub amount_in: String,
    pub amount_in_unit: String,
    pub amount_out: String,
    pub amount_out_unit: String,
    pub spot_price: String,
    pub avg_exec_price: String,
    pub gross_slippage_pct: String,
    pub slippage_excl_fees_pct: String,
    pub fee_rate: String,
    pub gas_estimate: Option<String>,
}

impl From<&SlippageRecord> for SlippageRow {
    fn from(r: &SlippageRecord) -> Self {
        Self {
            venue: r.venue.as_str().to_string(),
            block: r.block,
            timestamp: r.timestamp,
            datetime_utc: r.datetime_utc.to_rfc3339(),
            direction: r.direction.clone(),
            usd_notional_in: dec_str(&r.usd_notional_in),
            amount_in: dec_str(&r.amount_in),
            amount_in_unit: r.amount_in_unit.clone(),
            amount_out: dec_str(&r.amount_out),
            amount_out_unit: r.amount_out_unit.clone(),
            spot_price: dec_str(&r.spot_price),
            avg_exec_price: dec_str(&r.avg_exec_price),
            gross_slippage_pct: dec_str(&r.gross_slippage_pct),
            slippage_excl_fees_pct: dec_str(&r.slippage_excl_fees_pct),
            fee_rate: dec_str(&r.fee_rate),
            gas_estimate: r.gas_estimate.as_ref().map(|g| g.to_string()),
        }
    }
}

impl SlippageRow {
    pub fn to_sample(&self) -> Result<SlippageSample> {
        Ok(SlippageSample {
            venue: self.venue.clone(),
            direction: self.direction.clone(),
            usd_notional: parse_decimal(&self.usd_notional_in)?,
            slippage_excl_fees_pct: parse_decimal(&self.slippage_excl_fees_pct)?,
        })
    }
}

// -------------------------------- CSV --------------------------------------

pub trait CsvRecord {
    fn header() -> &'static [&'static str];
    fn fields(&self) -> Vec<String>;
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub fn write_csv<T: CsvRecord>(path: &Path, rows: &[T]) -> Result<()> {
    let mut w = create(path)?;
    writeln!(w, "{}", T::header().join(","))?;
    for row in rows {
        let line: Vec<String> = row.fields().iter().map(|f| escape(f)).collect();
        writeln!(w, "{}", line.join(","))?;
    }
    w.flush()?;
    log::info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, value)?;
    w.write_all(b"\n")?;
    w.flush()?;
    log::info!("wrote {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

impl CsvRecord for SlippageRow {
    fn header() -> &'static [&'static str] {
        &[
            "venue",
            "block",
            "timestamp",
            "datetime_utc",
            "direction",
            "usd_notional_in",
            "amount_in",
            "amount_in_unit",
            "amount_out",
            "amount_out_unit",
            "spot_price",
            "avg_exec_price",
            "gross_slippage_pct",
            "slippage_excl_fees_pct",
            "fee_rate",
            "gas_estimate",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.venue.clone(),
            self.block.to_string(),
            self.timestamp.to_string(),
            self.datetime_utc.clone(),
            self.direction.clone(),
            self.usd_notional_in.clone(),
            self.amount_in.clone(),
            self.amount_in_unit.clone(),
            self.amount_out.clone(),
            self.amount_out_unit.clone(),
            self.spot_price.clone(),
            self.avg_exec_price.clone(),
            self.gross_slippage_pct.clone(),
            self.slippage_excl_fees_pct.clone(),
            self.fee_rate.clone(),
            self.gas_estimate.clone().unwrap_or_default(),
        ]
    }
}

impl CsvRecord for VaultRow {
    fn header() -> &'static [&'static str] {
        &[
            "block",
            "timestamp",
            "datetime_utc",
            "underlying0_raw",
            "underlying1_raw",
            "mapping_mode",
            "amt_token",
            "amt_numeraire",
            "numeraire_usd",
            "spot_token_per_numeraire",
            "spot_numeraire_per_token",
            "token_usd",
            "value_numeraire_usd",
            "value_token_usd",
            "value_total_usd",
            "hold_value_usd",
            "full_range_amt_token",
            "full_range_amt_numeraire",
            "full_range_value_usd",
            "vault_value_index",
            "hold_value_index",
            "full_range_value_index",
        ]
    }

    fn fields(&self) -> Vec<String> {
        let o = &self.observation;
        vec![
            o.block.to_string(),
            o.timestamp.to_string(),
            o.datetime_utc.to_rfc3339(),
            o.underlying0_raw.to_string(),
            o.underlying1_raw.to_string(),
            o.mapping.as_str().to_string(),
            dec_str(&o.amt_token),
            dec_str(&o.amt_numeraire),
            dec_str(&o.numeraire_usd),
            dec_str(&o.spot_token_per_numeraire),
            dec_str(&o.spot_numeraire_per_token),
            dec_str(&o.token_usd),
            dec_str(&o.value_numeraire_usd),
            dec_str(&o.value_token_usd),
            dec_str(&o.value_total_usd),
            dec_str(&self.hold_value_usd),
            opt_dec_str(&self.full_range_amt_token),
            opt_dec_str(&self.full_range_amt_numeraire),
            opt_dec_str(&self.full_range_value_usd),
            opt_dec_str(&self.vault_value_index),
            opt_dec_str(&self.hold_value_index),
            opt_dec_str(&self.full_range_value_index),
        ]
    }
}

impl CsvRecord for RangeRow {
    fn header() -> &'static [&'static str] {
        &["range_index", "tick_lower", "tick_upper", "width"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.range_index.to_string(),
            self.tick_lower.to_string(),
            self.tick_upper.to_string(),
            self.width.to_string(),
        ]
    }
}

impl CsvRecord for CoverageBin {
    fn header() -> &'static [&'static str] {
        &["tick", "active_range_coverage_count"]
    }

    fn fields(&self) -> Vec<String> {
        vec![self.tick.to_string(), self.active_range_coverage_count.to_string()]
    }
}

impl CsvRecord for SummaryRow {
    fn header() -> &'static [&'static str] {
        &["venue", "direction", "usd_notional", "median_slippage_excl_fees_pct", "p90_slippage_excl_fees_pct", "n"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.venue.clone(),
            self.direction.clone(),
            dec_str(&self.usd_notional),
            dec_str(&self.median_pct),
            dec_str(&self.p90_pct),
            self.count.to_string(),
        ]
    }
}

impl CsvRecord for BurnEvent {
    fn header() -> &'static [&'static str] {
        &["block_number", "tx_hash", "log_index", "amount0_raw", "amount1_raw"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.block_number.to_string(),
            self.tx_hash.clone(),
            self.log_index.to_string(),
            self.amount0_raw.to_string(),
            self.amount1_raw.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Venue;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn record() -> SlippageRecord {
        SlippageRecord {
            venue: Venue::UniswapV2,
            block: 19_000_000,
            timestamp: 1_700_000_000,
            datetime_utc: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            direction: "IXS->WETH".to_string(),
            usd_notional_in: dec("1000"),
            amount_in: dec("10000.000000000000000000"),
            amount_in_unit: "IXS".to_string(),
            amount_out: dec("0.39"),
            amount_out_unit: "WETH".to_string(),
            spot_price: dec("0.00004"),
            avg_exec_price: dec("0.000039"),
            gross_slippage_pct: dec("2.5"),
            slippage_excl_fees_pct: dec("2.2"),
            fee_rate: dec("0.003"),
            gas_estimate: None,
        }
    }

    #[test]
    fn rows_render_plain_decimals() {
        let row = SlippageRow::from(&record());
        assert_eq!(row.amount_in, "10000");
        assert_eq!(row.spot_price, "0.00004");
        assert_eq!(row.datetime_utc, "2023-11-14T22:13:20+00:00");
        assert_eq!(row.fields().len(), SlippageRow::header().len());
    }

    #[test]
    fn rows_read_back_as_samples() {
        let row = SlippageRow::from(&record());
        let json = serde_json::to_string(&vec![row]).unwrap();
        let back: Vec<SlippageRow> = serde_json::from_str(&json).unwrap();
        let sample = back[0].to_sample().unwrap();
        assert_eq!(sample.usd_notional, dec("1000"));
        assert_eq!(sample.slippage_excl_fees_pct, dec("2.2"));
        assert_eq!(sample.venue, "uniswap_v2");
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn csv_file_has_header_and_rows() {
        let dir = std::env::temp_dir().join(format!("lm-output-{}", std::process::id()));
        let path = dir.join("ranges.csv");
        let rows = vec![RangeRow { range_index: 0, tick_lower: -600, tick_upper: 600, width: 1200 }];
        write_csv(&path, &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "range_index,tick_lower,tick_upper,width\n0,-600,600,1200\n");
        fs::remove_dir_all(&dir).ok();
    }
}
