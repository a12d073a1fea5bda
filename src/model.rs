use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a tradable asset on the data source.
pub type AssetId = u64;

/// Candle bucket width supported by the data source.
///
/// The config file and the wire request both use the minute count
/// (`1`, `5`, `15`, `30`, `60`, `240`, `1440`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Timeframe {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour4,
    Day1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Self::Min1,
        Self::Min5,
        Self::Min15,
        Self::Min30,
        Self::Hour1,
        Self::Hour4,
        Self::Day1,
    ];

    /// Parse a minute count into a `Timeframe`.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        match minutes {
            1 => Some(Self::Min1),
            5 => Some(Self::Min5),
            15 => Some(Self::Min15),
            30 => Some(Self::Min30),
            60 => Some(Self::Hour1),
            240 => Some(Self::Hour4),
            1440 => Some(Self::Day1),
            _ => None,
        }
    }

    pub fn minutes(self) -> u32 {
        match self {
            Self::Min1 => 1,
            Self::Min5 => 5,
            Self::Min15 => 15,
            Self::Min30 => 30,
            Self::Hour1 => 60,
            Self::Hour4 => 240,
            Self::Day1 => 1440,
        }
    }

    /// Storage label used by the data source (`1T`, `1H`, `1D`, ...).
    pub fn label(self) -> &'static str {
        match self {
            Self::Min1 => "1T",
            Self::Min5 => "5T",
            Self::Min15 => "15T",
            Self::Min30 => "30T",
            Self::Hour1 => "1H",
            Self::Hour4 => "4H",
            Self::Day1 => "1D",
        }
    }

    /// Width of one bucket.
    pub fn duration(self) -> Duration {
        Duration::minutes(i64::from(self.minutes()))
    }
}

impl TryFrom<u32> for Timeframe {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Self::from_minutes(minutes).ok_or_else(|| format!("unsupported timeframe: {minutes}"))
    }
}

impl From<Timeframe> for u32 {
    fn from(tf: Timeframe) -> Self {
        tf.minutes()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One OHLCV sample. `timestamp` is the unique key within a candle set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Missing volume is stored as `0.0`.
    pub volume: f64,
    pub trade_count: Option<u64>,
    pub vwap: Option<f64>,
}

impl Candle {
    /// Chart timescale key: unix seconds of the bucket start.
    pub fn chart_time(&self) -> i64 {
        self.timestamp.timestamp()
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn fingerprint(&self) -> CandleFingerprint {
        CandleFingerprint {
            open: self.open.to_bits(),
            high: self.high.to_bits(),
            low: self.low.to_bits(),
            close: self.close.to_bits(),
            volume: self.volume.to_bits(),
        }
    }
}

/// Bit-exact summary of a candle's OHLCV values, used to detect whether
/// the newest bar changed between two computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandleFingerprint {
    open: u64,
    high: u64,
    low: u64,
    close: u64,
    volume: u64,
}

/// Which price of a candle feeds a calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl PriceSource {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "open" => Some(Self::Open),
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            "close" => Some(Self::Close),
            "hl2" => Some(Self::Hl2),
            "hlc3" => Some(Self::Hlc3),
            "ohlc4" => Some(Self::Ohlc4),
            _ => None,
        }
    }

    pub fn extract(self, candle: &Candle) -> f64 {
        match self {
            Self::Open => candle.open,
            Self::High => candle.high,
            Self::Low => candle.low,
            Self::Close => candle.close,
            Self::Hl2 => (candle.high + candle.low) / 2.0,
            Self::Hlc3 => (candle.high + candle.low + candle.close) / 3.0,
            Self::Ohlc4 => (candle.open + candle.high + candle.low + candle.close) / 4.0,
        }
    }
}

// ── Chart points ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarPoint {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePoint {
    pub time: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramPoint {
    pub time: i64,
    pub value: f64,
    pub color: String,
}

/// Upper/middle/lower values of a band indicator at one bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandPoint {
    pub time: i64,
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// A time-keyed value handed to the rendering boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesPoint {
    Bar(BarPoint),
    Line(LinePoint),
    Histogram(HistogramPoint),
}

impl SeriesPoint {
    pub fn time(&self) -> i64 {
        match self {
            Self::Bar(p) => p.time,
            Self::Line(p) => p.time,
            Self::Histogram(p) => p.time,
        }
    }

    /// Scalar value of a line or histogram point.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Bar(_) => None,
            Self::Line(p) => Some(p.value),
            Self::Histogram(p) => Some(p.value),
        }
    }
}
