pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod definition;
pub mod ma;
pub mod macd;
pub mod mfi;
pub mod momentum;
pub mod obv;
pub mod registry;
pub mod roc;
pub mod rsi;
pub mod stoch_rsi;
pub mod stochastic;
pub mod vwap;
pub mod williams_r;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{BandPoint, Candle, HistogramPoint, LinePoint, SeriesPoint};

pub use definition::{IndicatorConfig, IndicatorDefinition, ParamValue, ReferenceLine};
pub use registry::IndicatorRegistry;

/// A technical analysis indicator: a definition paired with a pure
/// calculation.
///
/// Candles must be in ascending chronological order (oldest first). Points
/// before the lookback is satisfied are omitted, never zero-filled, and
/// each output point carries the `time` of the candle it belongs to.
pub trait Indicator: Send + Sync {
    fn definition(&self) -> &IndicatorDefinition;

    /// Number of candles `config` needs before the first point appears.
    fn required_candles(&self, config: &IndicatorConfig) -> usize;

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput;

    /// Panel guides for `config`.
    fn reference_lines(&self, _config: &IndicatorConfig) -> Vec<ReferenceLine> {
        self.definition().reference_lines.clone()
    }
}

/// Result of one indicator calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum IndicatorOutput {
    Line(Vec<LinePoint>),
    Histogram(Vec<HistogramPoint>),
    Band(Vec<BandPoint>),
    /// Named series keyed by output key (MACD, Stochastic, OBV, ...).
    MultiSeries(BTreeMap<String, Vec<SeriesPoint>>),
}

impl IndicatorOutput {
    /// Number of points in the longest series.
    pub fn len(&self) -> usize {
        match self {
            Self::Line(points) => points.len(),
            Self::Histogram(points) => points.len(),
            Self::Band(points) => points.len(),
            Self::MultiSeries(map) => map.values().map(Vec::len).max().unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn series(&self, key: &str) -> Option<&[SeriesPoint]> {
        match self {
            Self::MultiSeries(map) => map.get(key).map(Vec::as_slice),
            _ => None,
        }
    }

    /// Most recent scalar value of each series, for log summaries.
    pub fn latest_values(&self) -> Vec<(String, f64)> {
        match self {
            Self::Line(points) => points
                .last()
                .map(|p| vec![("value".to_owned(), p.value)])
                .unwrap_or_default(),
            Self::Histogram(points) => points
                .last()
                .map(|p| vec![("value".to_owned(), p.value)])
                .unwrap_or_default(),
            Self::Band(points) => points
                .last()
                .map(|p| {
                    vec![
                        ("upper".to_owned(), p.upper),
                        ("middle".to_owned(), p.middle),
                        ("lower".to_owned(), p.lower),
                    ]
                })
                .unwrap_or_default(),
            Self::MultiSeries(map) => map
                .iter()
                .filter_map(|(k, points)| points.last()?.value().map(|v| (k.clone(), v)))
                .collect(),
        }
    }
}

/// Extract close prices from a slice of candles.
pub fn close_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.high).collect()
}

pub fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.low).collect()
}

/// Pair each defined value with the time of the candle at the same index.
pub fn line_points(candles: &[Candle], values: &[Option<f64>]) -> Vec<LinePoint> {
    candles
        .iter()
        .zip(values)
        .filter_map(|(c, v)| {
            v.map(|value| LinePoint {
                time: c.chart_time(),
                value,
            })
        })
        .collect()
}

pub(crate) fn into_series(points: Vec<LinePoint>) -> Vec<SeriesPoint> {
    points.into_iter().map(SeriesPoint::Line).collect()
}

/// Full-length series from values that start at `offset`.
pub(crate) fn pad_front(len: usize, offset: usize, values: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; len];
    for (i, v) in values.iter().enumerate() {
        if let Some(slot) = out.get_mut(offset + i) {
            *slot = Some(*v);
        }
    }
    out
}
