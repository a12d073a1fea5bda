use std::collections::BTreeMap;

use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ReferenceLine,
    ValueRange,
};
use crate::indicator::{
    Indicator, IndicatorOutput, close_prices, highs, into_series, line_points, lows, pad_front,
};
use crate::math;
use crate::model::Candle;

/// Stochastic oscillator (%K smoothed, %D signal).
pub struct Stochastic {
    definition: IndicatorDefinition,
}

impl Stochastic {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "stochastic",
                name: "Stochastic",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("k_period", "%K Period", 14.0, 1.0, 100.0),
                    ParamDef::number("d_period", "%D Period", 3.0, 1.0, 50.0),
                    ParamDef::number("smooth", "Smooth", 3.0, 1.0, 50.0),
                    ParamDef::color("k_color", "%K Color", "#2962FF"),
                    ParamDef::color("d_color", "%D Color", "#FF6D00"),
                ],
                outputs: vec![
                    OutputDef::line("k", "#2962FF"),
                    OutputDef::line("d", "#FF6D00"),
                ],
                min_data_points: 2,
                reference_lines: oscillator_bands(),
                value_range: Some(ValueRange::Fixed {
                    min: 0.0,
                    max: 100.0,
                }),
            },
        }
    }
}

impl Default for Stochastic {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn oscillator_bands() -> Vec<ReferenceLine> {
    vec![
        ReferenceLine::dashed(80.0, "#EF5350"),
        ReferenceLine::dashed(20.0, "#26A69A"),
    ]
}

impl Indicator for Stochastic {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("k_period") + config.period("smooth") + config.period("d_period") - 2
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let (k, d) = stochastic_lines(
            &highs(candles),
            &lows(candles),
            &close_prices(candles),
            config.period("k_period"),
            config.period("smooth"),
            config.period("d_period"),
        );
        k_d_output(candles, &k, &d)
    }
}

pub(crate) fn k_d_output(candles: &[Candle], k: &[Option<f64>], d: &[Option<f64>]) -> IndicatorOutput {
    IndicatorOutput::MultiSeries(BTreeMap::from([
        ("k".to_owned(), into_series(line_points(candles, k))),
        ("d".to_owned(), into_series(line_points(candles, d))),
    ]))
}

/// Raw %K: position of `close` inside the trailing high/low range, scaled to
/// `0..=100`; a flat range reads as 50.
pub fn raw_k(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    let highest = math::highest(high, period);
    let lowest = math::lowest(low, period);
    close
        .iter()
        .zip(highest.iter().zip(&lowest))
        .map(|(c, (hh, ll))| {
            let (hh, ll) = ((*hh)?, (*ll)?);
            let range = hh - ll;
            if range == 0.0 {
                return Some(50.0);
            }
            Some(((c - ll) / range * 100.0).clamp(0.0, 100.0))
        })
        .collect()
}

/// SMA over the defined run of `values`, re-aligned to full length.
pub fn smooth(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let (start, tail) = math::defined_tail(values);
    let smoothed: Vec<f64> = math::sma(&tail, period).into_iter().flatten().collect();
    let offset = start + period.saturating_sub(1);
    pad_front(values.len(), offset, &smoothed)
        .into_iter()
        .map(|v| v.map(|v| v.clamp(0.0, 100.0)))
        .collect()
}

/// Smoothed %K and its %D signal.
pub fn stochastic_lines(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_period: usize,
    smoothing: usize,
    d_period: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let k = smooth(&raw_k(high, low, close, k_period), smoothing);
    let d = smooth(&k, d_period);
    (k, d)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::indicator::ParamValue;
    use crate::model::test_support::candles_from_hlcv;

    #[test]
    fn raw_k_known_values() {
        let high = [10.0, 12.0, 11.0];
        let low = [8.0, 9.0, 9.0];
        let close = [9.0, 11.0, 9.0];
        let k = raw_k(&high, &low, &close, 2);
        assert_eq!(k[0], None);
        // hh 12, ll 8 -> (11-8)/4
        assert_eq!(k[1], Some(75.0));
        // hh 12, ll 9 -> 0
        assert_eq!(k[2], Some(0.0));
    }

    #[test]
    fn flat_range_reads_fifty() {
        let k = raw_k(&[5.0; 3], &[5.0; 3], &[5.0; 3], 3);
        assert_eq!(k[2], Some(50.0));
    }

    #[test]
    fn smoothing_shifts_start() {
        let k = smooth(&[None, Some(10.0), Some(20.0), Some(30.0)], 2);
        assert_eq!(k, vec![None, None, Some(15.0), Some(25.0)]);
    }

    #[test]
    fn d_trails_k() {
        let stoch = Stochastic::new();
        let raw = HashMap::from([
            ("k_period".to_owned(), ParamValue::Number(3.0)),
            ("smooth".to_owned(), ParamValue::Number(1.0)),
            ("d_period".to_owned(), ParamValue::Number(2.0)),
        ]);
        let config = IndicatorConfig::resolve(stoch.definition(), &raw);
        let rows: Vec<_> = (0..6)
            .map(|i| (10.0 + i as f64, 8.0 + i as f64, 9.0 + i as f64, 1.0))
            .collect();
        let candles = candles_from_hlcv(&rows);
        let output = stoch.calculate(&candles, &config);
        let k = output.series("k").unwrap();
        let d = output.series("d").unwrap();
        assert_eq!(k.len(), 4);
        assert_eq!(d.len(), 3);
        assert_eq!(d[0].time(), candles[3].chart_time());
        assert_eq!(stoch.required_candles(&config), 4);
    }

    proptest! {
        #[test]
        fn k_and_d_stay_in_range(
            rows in proptest::collection::vec((1.0f64..100.0, 0.0f64..5.0, 0.0f64..1.0), 0..60),
            k_period in 1usize..15,
            smoothing in 1usize..5,
            d_period in 1usize..5,
        ) {
            let high: Vec<f64> = rows.iter().map(|(base, spread, _)| base + spread).collect();
            let low: Vec<f64> = rows.iter().map(|(base, spread, _)| base - spread).collect();
            let close: Vec<f64> = rows
                .iter()
                .map(|(base, spread, frac)| base - spread + 2.0 * spread * frac)
                .collect();
            let (k, d) = stochastic_lines(&high, &low, &close, k_period, smoothing, d_period);
            for v in k.iter().chain(&d).flatten() {
                prop_assert!((0.0..=100.0).contains(v));
            }
        }
    }
}
