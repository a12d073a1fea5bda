use std::collections::BTreeMap;

use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ReferenceLine,
    ValueRange,
};
use crate::indicator::{Indicator, IndicatorOutput, close_prices};
use crate::math;
use crate::model::{Candle, HistogramPoint, LinePoint, SeriesPoint};

pub struct Macd {
    definition: IndicatorDefinition,
}

impl Macd {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "macd",
                name: "MACD",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("fast_period", "Fast Period", 12.0, 1.0, 200.0),
                    ParamDef::number("slow_period", "Slow Period", 26.0, 1.0, 200.0),
                    ParamDef::number("signal_period", "Signal Period", 9.0, 1.0, 100.0),
                    ParamDef::color("macd_color", "MACD Color", "#2962FF"),
                    ParamDef::color("signal_color", "Signal Color", "#FF6D00"),
                    ParamDef::color("histogram_up_color", "Histogram Up", "#26A69A"),
                    ParamDef::color("histogram_down_color", "Histogram Down", "#EF5350"),
                ],
                outputs: vec![
                    OutputDef::line("macd", "#2962FF"),
                    OutputDef::line("signal", "#FF6D00"),
                    OutputDef::histogram("histogram", "#26A69A"),
                ],
                min_data_points: 3,
                reference_lines: vec![ReferenceLine::dashed(0.0, "#787B86")],
                value_range: Some(ValueRange::SymmetricAroundZero),
            },
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new()
    }
}

/// Aligned MACD components starting at candle index `start`.
#[derive(Debug, Default)]
pub struct MacdLines {
    pub start: usize,
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD line, signal and histogram over `prices`.
///
/// The MACD line is defined from index `max(fast, slow) - 1`; the signal
/// EMA runs over those defined values, so every component starts `signal - 1`
/// values later. Indices are aligned by offset.
pub fn macd_lines(prices: &[f64], fast: usize, slow: usize, signal: usize) -> MacdLines {
    let fast_ema = math::ema(prices, fast);
    let slow_ema = math::ema(prices, slow);
    let macd_line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let (macd_start, macd_values) = math::defined_tail(&macd_line);
    let signal_line = math::ema(&macd_values, signal);
    let (signal_offset, signal_values) = math::defined_tail(&signal_line);
    if signal_values.is_empty() {
        return MacdLines::default();
    }

    let macd: Vec<f64> = macd_values[signal_offset..].to_vec();
    let histogram = macd
        .iter()
        .zip(&signal_values)
        .map(|(m, s)| m - s)
        .collect();

    MacdLines {
        start: macd_start + signal_offset,
        macd,
        signal: signal_values,
        histogram,
    }
}

impl Indicator for Macd {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        let fast = config.period("fast_period");
        let slow = config.period("slow_period");
        fast.max(slow) + config.period("signal_period") - 1
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let lines = macd_lines(
            &close_prices(candles),
            config.period("fast_period"),
            config.period("slow_period"),
            config.period("signal_period"),
        );
        let up = config.text("histogram_up_color");
        let down = config.text("histogram_down_color");

        let mut macd = Vec::with_capacity(lines.macd.len());
        let mut signal = Vec::with_capacity(lines.macd.len());
        let mut histogram = Vec::with_capacity(lines.macd.len());
        for (i, candle) in candles.iter().skip(lines.start).enumerate() {
            let (Some(&m), Some(&s), Some(&h)) =
                (lines.macd.get(i), lines.signal.get(i), lines.histogram.get(i))
            else {
                break;
            };
            let time = candle.chart_time();
            macd.push(SeriesPoint::Line(LinePoint { time, value: m }));
            signal.push(SeriesPoint::Line(LinePoint { time, value: s }));
            histogram.push(SeriesPoint::Histogram(HistogramPoint {
                time,
                value: h,
                color: (if h >= 0.0 { up } else { down }).to_owned(),
            }));
        }

        IndicatorOutput::MultiSeries(BTreeMap::from([
            ("macd".to_owned(), macd),
            ("signal".to_owned(), signal),
            ("histogram".to_owned(), histogram),
        ]))
    }
}
