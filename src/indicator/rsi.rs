use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ReferenceLine,
    ValueRange,
};
use crate::indicator::{Indicator, IndicatorOutput, close_prices, line_points};
use crate::model::Candle;

const OVERBOUGHT_COLOR: &str = "#EF5350";
const MIDLINE_COLOR: &str = "#787B86";
const OVERSOLD_COLOR: &str = "#26A69A";

/// RSI (Relative Strength Index) using Wilder's smoothing method.
pub struct Rsi {
    definition: IndicatorDefinition,
}

impl Rsi {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "rsi",
                name: "Relative Strength Index",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("period", "Period", 14.0, 2.0, 100.0),
                    ParamDef::number("overbought", "Overbought", 70.0, 50.0, 100.0),
                    ParamDef::number("oversold", "Oversold", 30.0, 0.0, 50.0),
                    ParamDef::color("color", "Color", "#7E57C2"),
                ],
                outputs: vec![OutputDef::line("rsi", "#7E57C2")],
                min_data_points: 3,
                reference_lines: guides(70.0, 30.0),
                value_range: Some(ValueRange::Fixed {
                    min: 0.0,
                    max: 100.0,
                }),
            },
        }
    }
}

fn guides(overbought: f64, oversold: f64) -> Vec<ReferenceLine> {
    vec![
        ReferenceLine::dashed(overbought, OVERBOUGHT_COLOR),
        ReferenceLine::dashed(50.0, MIDLINE_COLOR),
        ReferenceLine::dashed(oversold, OVERSOLD_COLOR),
    ]
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Rsi {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period") + 1
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let values = rsi_values(&close_prices(candles), config.period("period"));
        IndicatorOutput::Line(line_points(candles, &values))
    }

    fn reference_lines(&self, config: &IndicatorConfig) -> Vec<ReferenceLine> {
        guides(config.number("overbought"), config.number("oversold"))
    }
}

/// Full-length RSI series; the first value sits at index `period`.
pub fn rsi_values(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return out;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    // Seed using simple average of first `period` gains/losses
    let mut avg_gain = deltas[..period].iter().map(|&d| d.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss =
        deltas[..period].iter().map(|&d| (-d).max(0.0)).sum::<f64>() / period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for (i, &delta) in deltas.iter().enumerate().skip(period) {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        out[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::candles_from_closes;

    fn defined(values: &[Option<f64>]) -> Vec<f64> {
        values.iter().flatten().copied().collect()
    }

    #[test]
    fn rsi_insufficient_data() {
        assert!(defined(&rsi_values(&[1.0; 10], 14)).is_empty());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let values = rsi_values(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(values[3], Some(100.0));
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let values = rsi_values(&[4.0, 3.0, 2.0, 1.0], 3);
        // avg_gain = 0, so RSI should be 0
        assert!(values[3].is_some_and(|v| v.abs() < 1e-9));
    }

    #[test]
    fn rsi_flat_then_spike_is_100() {
        // deltas 0, 0, +1 -> avg_gain=1/3, avg_loss=0
        let values = rsi_values(&[10.0, 10.0, 10.0, 11.0], 3);
        assert_eq!(values[3], Some(100.0));
    }

    #[test]
    fn rsi_wilder_smoothing_known_value() {
        // deltas +1, -1, +1 ; seed over period 2: gain 0.5, loss 0.5 -> 50
        // next: gain (0.5*1 + 1)/2 = 0.75, loss (0.5*1 + 0)/2 = 0.25 -> rs 3 -> 75
        let values = rsi_values(&[1.0, 2.0, 1.0, 2.0], 2);
        assert!(values[2].is_some_and(|v| (v - 50.0).abs() < 1e-9));
        assert!(values[3].is_some_and(|v| (v - 75.0).abs() < 1e-9));
    }

    #[test]
    fn guides_follow_configured_thresholds() {
        let rsi = Rsi::new();
        let defaults = IndicatorConfig::defaults(rsi.definition());
        assert_eq!(rsi.reference_lines(&defaults), rsi.definition().reference_lines);

        let raw = std::collections::HashMap::from([
            ("overbought".to_owned(), crate::indicator::ParamValue::Number(80.0)),
            ("oversold".to_owned(), crate::indicator::ParamValue::Number(20.0)),
        ]);
        let config = IndicatorConfig::resolve(rsi.definition(), &raw);
        let levels: Vec<f64> = rsi.reference_lines(&config).iter().map(|l| l.value).collect();
        assert_eq!(levels, vec![80.0, 50.0, 20.0]);
    }

    #[test]
    fn rsi_output_length() {
        let rsi = Rsi::new();
        let config = IndicatorConfig::defaults(rsi.definition());
        let candles = candles_from_closes(&[100.0_f64; 20]);
        // 20 prices -> 19 deltas -> 1 seed + 5 subsequent = 6 values
        assert_eq!(rsi.calculate(&candles, &config).len(), 20 - 14);
    }

    proptest::proptest! {
        #[test]
        fn rsi_is_bounded(
            prices in proptest::collection::vec(0.01f64..1e5, 0..80),
            period in 2usize..20,
        ) {
            for v in defined(&rsi_values(&prices, period)) {
                proptest::prop_assert!((0.0..=100.0).contains(&v));
            }
        }
    }
}
