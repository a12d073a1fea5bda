//! Row decoders for the candle endpoint.
//!
//! The compact format sends each candle as a positional array
//! (`[timestamp, open, high, low, close, volume, trade_count, vwap]`), with
//! decimals serialized as strings. The legacy object format carries the same
//! fields by name. Rows are decoded into [`Candle`] immediately and never kept
//! in wire form.

use chrono::{DateTime, NaiveDateTime, Utc};
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::model::Candle;
use crate::source::CandlePage;

/// Column order of a compact row when the response carries no header.
pub const CANDLE_COLUMNS: [&str; 8] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "trade_count",
    "vwap",
];

const TIMESTAMP: usize = 0;
const OPEN: usize = 1;
const HIGH: usize = 2;
const LOW: usize = 3;
const CLOSE: usize = 4;
const VOLUME: usize = 5;
const TRADE_COUNT: usize = 6;
const VWAP: usize = 7;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Deserialize)]
pub struct WirePage {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    pub results: Vec<WireRow>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_next: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireRow {
    Compact(Vec<Value>),
    Object(ObjectRow),
}

#[derive(Debug, Deserialize)]
pub struct ObjectRow {
    timestamp: Value,
    open: Value,
    high: Value,
    low: Value,
    close: Value,
    #[serde(default)]
    volume: Value,
    #[serde(default)]
    trade_count: Value,
    #[serde(default)]
    vwap: Value,
}

impl ObjectRow {
    fn decode(&self) -> Result<Candle, Report<SourceError>> {
        Ok(Candle {
            timestamp: timestamp(Some(&self.timestamp))?,
            open: price(Some(&self.open), "open")?,
            high: price(Some(&self.high), "high")?,
            low: price(Some(&self.low), "low")?,
            close: price(Some(&self.close), "close")?,
            volume: volume(Some(&self.volume)),
            trade_count: trade_count(Some(&self.trade_count)),
            vwap: Some(&self.vwap).and_then(number),
        })
    }
}

/// Position of each known column inside a compact row.
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    positions: [Option<usize>; 8],
}

impl Layout {
    fn standard() -> Self {
        Self {
            positions: std::array::from_fn(Some),
        }
    }

    fn from_columns(columns: &[String]) -> Self {
        Self {
            positions: CANDLE_COLUMNS.map(|name| columns.iter().position(|c| c == name)),
        }
    }

    fn field<'a>(&self, row: &'a [Value], column: usize) -> Option<&'a Value> {
        self.positions[column].and_then(|i| row.get(i))
    }

    fn decode(&self, row: &[Value]) -> Result<Candle, Report<SourceError>> {
        Ok(Candle {
            timestamp: timestamp(self.field(row, TIMESTAMP))?,
            open: price(self.field(row, OPEN), "open")?,
            high: price(self.field(row, HIGH), "high")?,
            low: price(self.field(row, LOW), "low")?,
            close: price(self.field(row, CLOSE), "close")?,
            volume: volume(self.field(row, VOLUME)),
            trade_count: trade_count(self.field(row, TRADE_COUNT)),
            vwap: self.field(row, VWAP).and_then(number),
        })
    }
}

/// Decode every row of `page`, keeping the server's newest-first order.
///
/// A row with a missing or unparsable price fails the whole page; a missing
/// or unparsable volume reads as zero.
pub fn decode_page(page: WirePage) -> Result<CandlePage, Report<SourceError>> {
    let layout = page
        .columns
        .as_deref()
        .map_or_else(Layout::standard, Layout::from_columns);

    let candles = page
        .results
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let candle = match row {
                WireRow::Compact(values) => layout.decode(values),
                WireRow::Object(row) => row.decode(),
            };
            candle.attach_with(|| format!("row index: {i}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CandlePage {
        candles,
        next_cursor: page.next_cursor,
        has_next: page.has_next,
    })
}

/// Parse an ISO-8601 timestamp; values without an offset are taken as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, Report<SourceError>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            Report::new(SourceError::Decode {
                reason: format!("unrecognised timestamp {text:?}"),
            })
        })
}

fn timestamp(value: Option<&Value>) -> Result<DateTime<Utc>, Report<SourceError>> {
    let text = value.and_then(Value::as_str).ok_or_else(|| {
        Report::new(SourceError::Decode {
            reason: "timestamp is missing or not a string".into(),
        })
    })?;
    parse_timestamp(text)
}

/// Decimal that may arrive as a JSON number or a string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

fn price(value: Option<&Value>, field: &str) -> Result<f64, Report<SourceError>> {
    value.and_then(number).ok_or_else(|| {
        Report::new(SourceError::Decode {
            reason: format!("{field} is missing or not a number"),
        })
    })
}

fn volume(value: Option<&Value>) -> f64 {
    value
        .and_then(number)
        .filter(|v| *v >= 0.0)
        .unwrap_or(0.0)
}

fn trade_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
