//! OHLCV price bars and normalization of raw exchange klines.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of leading kline fields we read; anything after is exchange trailer data.
const KLINE_FIELDS: usize = 7;

/// A single OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: DateTime<Utc>,
}

impl PriceBar {
    /// Parse one raw kline row:
    /// `[open_time, open, high, low, close, volume, close_time, ...]`.
    ///
    /// Prices may be JSON numbers or numeric strings, timestamps are epoch
    /// milliseconds. Trailing fields (quote volume, trade count, ...) are ignored.
    pub fn from_kline(row: &[Value]) -> Result<Self> {
        if row.len() < KLINE_FIELDS {
            bail!(
                "kline has {} fields, expected at least {}",
                row.len(),
                KLINE_FIELDS
            );
        }

        Ok(Self {
            open_time: timestamp_field(&row[0], "open_time")?,
            open: number_field(&row[1], "open")?,
            high: number_field(&row[2], "high")?,
            low: number_field(&row[3], "low")?,
            close: number_field(&row[4], "close")?,
            volume: number_field(&row[5], "volume")?,
            close_time: timestamp_field(&row[6], "close_time")?,
        })
    }
}

/// Normalize a kline listing into price bars, preserving order.
pub fn prepare_bars(klines: &[Vec<Value>]) -> Result<Vec<PriceBar>> {
    klines
        .iter()
        .enumerate()
        .map(|(i, row)| PriceBar::from_kline(row).with_context(|| format!("kline #{}", i)))
        .collect()
}

/// Parse a JSON kline listing (array of arrays) into price bars.
pub fn parse_klines_json(json: &str) -> Result<Vec<PriceBar>> {
    let klines: Vec<Vec<Value>> =
        serde_json::from_str(json).context("Klines must be a JSON array of arrays")?;
    prepare_bars(&klines)
}

/// Close prices of a bar sequence.
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

fn number_field(value: &Value, name: &str) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| anyhow!("invalid {} value: {}", name, value))
}

fn timestamp_field(value: &Value, name: &str) -> Result<DateTime<Utc>> {
    let millis = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    millis
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| anyhow!("invalid {} timestamp: {}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_exchange_kline() {
        let row = json!([
            1_700_000_000_000i64,
            "100.5",
            "101.0",
            "99.5",
            "100.75",
            "1234.5",
            1_700_000_059_999i64,
            "124000.0",
            42,
            "600.0",
            "60000.0",
            "0"
        ]);
        let row = row.as_array().unwrap();

        let bar = PriceBar::from_kline(row).unwrap();
        assert_eq!(bar.open, 100.5);
        assert_eq!(bar.close, 100.75);
        assert_eq!(bar.volume, 1234.5);
        assert_eq!(bar.open_time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(bar.close_time.timestamp_millis(), 1_700_000_059_999);
    }

    #[test]
    fn test_numeric_fields_accepted() {
        let row = json!([0, 1.0, 2.0, 0.5, 1.5, 10, 59_999]);
        let bar = PriceBar::from_kline(row.as_array().unwrap()).unwrap();
        assert_eq!(bar.high, 2.0);
        assert_eq!(bar.volume, 10.0);
    }

    #[test]
    fn test_short_row_rejected() {
        let row = json!([0, "1", "2", "0.5", "1.5"]);
        let err = PriceBar::from_kline(row.as_array().unwrap()).unwrap_err();
        assert!(err.to_string().contains("expected at least 7"));
    }

    #[test]
    fn test_bad_row_reports_index() {
        let json = r#"[[0,"1","2","0.5","1.5","10",59999],[60000,"x","2","0.5","1.5","10",119999]]"#;
        let err = parse_klines_json(json).unwrap_err();
        assert!(format!("{:#}", err).contains("kline #1"));
        assert!(format!("{:#}", err).contains("invalid open"));
    }

    #[test]
    fn test_closes_in_order() {
        let json = r#"[[0,"1","2","0.5","1.5","10",59999],[60000,"1.5","2","1","1.8","10",119999]]"#;
        let bars = parse_klines_json(json).unwrap();
        assert_eq!(closes(&bars), vec![1.5, 1.8]);
    }
}
