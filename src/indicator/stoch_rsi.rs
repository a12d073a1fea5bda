use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ValueRange,
};
use crate::indicator::rsi::rsi_values;
use crate::indicator::stochastic::{k_d_output, oscillator_bands, raw_k, smooth};
use crate::indicator::{Indicator, IndicatorOutput, close_prices};
use crate::math;
use crate::model::Candle;

/// Stochastic formula applied to the RSI series instead of price.
pub struct StochRsi {
    definition: IndicatorDefinition,
}

impl StochRsi {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "stoch_rsi",
                name: "Stochastic RSI",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("rsi_period", "RSI Period", 14.0, 2.0, 100.0),
                    ParamDef::number("stoch_period", "Stochastic Period", 14.0, 1.0, 100.0),
                    ParamDef::number("k_period", "%K Smoothing", 3.0, 1.0, 50.0),
                    ParamDef::number("d_period", "%D Smoothing", 3.0, 1.0, 50.0),
                    ParamDef::color("k_color", "%K Color", "#2962FF"),
                    ParamDef::color("d_color", "%D Color", "#FF6D00"),
                ],
                outputs: vec![
                    OutputDef::line("k", "#2962FF"),
                    OutputDef::line("d", "#FF6D00"),
                ],
                min_data_points: 3,
                reference_lines: oscillator_bands(),
                value_range: Some(ValueRange::Fixed {
                    min: 0.0,
                    max: 100.0,
                }),
            },
        }
    }
}

impl Default for StochRsi {
    fn default() -> Self {
        Self::new()
    }
}

/// Smoothed %K and %D of the RSI series, aligned to `prices`.
pub fn stoch_rsi_lines(
    prices: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    k_period: usize,
    d_period: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let rsi = rsi_values(prices, rsi_period);
    let (start, tail) = math::defined_tail(&rsi);

    let mut raw = vec![None; start];
    raw.extend(raw_k(&tail, &tail, &tail, stoch_period));
    raw.resize(prices.len(), None);

    let k = smooth(&raw, k_period);
    let d = smooth(&k, d_period);
    (k, d)
}

impl Indicator for StochRsi {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("rsi_period")
            + config.period("stoch_period")
            + config.period("k_period")
            + config.period("d_period")
            - 2
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let (k, d) = stoch_rsi_lines(
            &close_prices(candles),
            config.period("rsi_period"),
            config.period("stoch_period"),
            config.period("k_period"),
            config.period("d_period"),
        );
        k_d_output(candles, &k, &d)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::test_support::candles_from_closes;

    #[test]
    fn first_value_respects_all_lookbacks() {
        let closes: Vec<f64> = (0..30).map(|i| 10.0 + (i as f64 * 0.9).sin()).collect();
        let (k, d) = stoch_rsi_lines(&closes, 5, 4, 2, 3);
        // rsi at 5, raw %K at 8, %K at 9, %D at 11
        assert_eq!(k.iter().position(Option::is_some), Some(9));
        assert_eq!(d.iter().position(Option::is_some), Some(11));
        assert_eq!(k.len(), closes.len());

        let stoch_rsi = StochRsi::new();
        let config = IndicatorConfig::defaults(stoch_rsi.definition());
        assert_eq!(stoch_rsi.required_candles(&config), 14 + 14 + 3 + 3 - 2);
    }

    #[test]
    fn monotonic_rise_pins_rsi_range_to_fifty() {
        // RSI stays at 100, so the stochastic range is flat
        let closes: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let (k, _) = stoch_rsi_lines(&closes, 3, 3, 1, 1);
        assert!(k.iter().flatten().all(|v| *v == 50.0));
    }

    #[test]
    fn too_short_is_empty() {
        let stoch_rsi = StochRsi::new();
        let config = IndicatorConfig::defaults(stoch_rsi.definition());
        let output = stoch_rsi.calculate(&candles_from_closes(&[1.0, 2.0, 3.0]), &config);
        assert!(output.is_empty());
    }

    proptest! {
        #[test]
        fn k_and_d_stay_in_range(
            prices in proptest::collection::vec(1.0f64..1000.0, 0..80),
            rsi_period in 2usize..10,
            stoch_period in 1usize..10,
        ) {
            let (k, d) = stoch_rsi_lines(&prices, rsi_period, stoch_period, 3, 3);
            for v in k.iter().chain(&d).flatten() {
                prop_assert!((0.0..=100.0).contains(v));
            }
        }
    }
}
