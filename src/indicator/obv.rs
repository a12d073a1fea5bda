use std::collections::BTreeMap;

use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement,
};
use crate::indicator::{Indicator, IndicatorOutput, into_series, line_points};
use crate::math;
use crate::model::Candle;

/// On-Balance Volume with an optional EMA signal line.
pub struct Obv {
    definition: IndicatorDefinition,
}

impl Obv {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "obv",
                name: "On-Balance Volume",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("signal_period", "Signal Period", 20.0, 1.0, 200.0),
                    ParamDef::boolean("show_signal", "Show Signal Line", false),
                    ParamDef::color("color", "OBV Color", "#2962FF"),
                    ParamDef::color("signal_color", "Signal Color", "#FF6D00"),
                ],
                outputs: vec![
                    OutputDef::line("obv", "#2962FF"),
                    OutputDef::line("signal", "#FF6D00"),
                ],
                min_data_points: 2,
                reference_lines: Vec::new(),
                value_range: None,
            },
        }
    }
}

impl Default for Obv {
    fn default() -> Self {
        Self::new()
    }
}

/// Running OBV total; the first bar starts the count at zero.
pub fn obv_values(candles: &[Candle]) -> Vec<f64> {
    let mut total = 0.0;
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if let Some(prev) = i.checked_sub(1).map(|p| &candles[p]) {
                if c.close > prev.close {
                    total += c.volume;
                } else if c.close < prev.close {
                    total -= c.volume;
                }
            }
            total
        })
        .collect()
}

impl Indicator for Obv {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        if config.flag("show_signal") {
            config.period("signal_period")
        } else {
            1
        }
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let obv = obv_values(candles);
        let mut series = BTreeMap::new();
        if config.flag("show_signal") {
            let signal = math::ema(&obv, config.period("signal_period"));
            series.insert("signal".to_owned(), into_series(line_points(candles, &signal)));
        }
        let obv: Vec<Option<f64>> = obv.into_iter().map(Some).collect();
        series.insert("obv".to_owned(), into_series(line_points(candles, &obv)));
        IndicatorOutput::MultiSeries(series)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::indicator::ParamValue;
    use crate::model::test_support::candles_from_hlcv;

    fn fixture() -> Vec<Candle> {
        candles_from_hlcv(&[
            (10.0, 10.0, 10.0, 100.0),
            (11.0, 11.0, 11.0, 200.0),
            (11.0, 11.0, 11.0, 300.0),
            (9.0, 9.0, 9.0, 50.0),
        ])
    }

    #[test]
    fn obv_adds_and_subtracts_volume() {
        assert_eq!(obv_values(&fixture()), vec![0.0, 200.0, 200.0, 150.0]);
    }

    #[test]
    fn signal_line_only_when_enabled() {
        let obv = Obv::new();
        let config = IndicatorConfig::defaults(obv.definition());
        let output = obv.calculate(&fixture(), &config);
        assert_eq!(output.series("obv").map(<[_]>::len), Some(4));
        assert!(output.series("signal").is_none());

        let raw = HashMap::from([
            ("show_signal".to_owned(), ParamValue::Bool(true)),
            ("signal_period".to_owned(), ParamValue::Number(2.0)),
        ]);
        let config = IndicatorConfig::resolve(obv.definition(), &raw);
        let output = obv.calculate(&fixture(), &config);
        let signal = output.series("signal").unwrap();
        assert_eq!(signal.len(), 3);
        // seed is the mean of the first two totals
        assert_eq!(signal[0].value(), Some(100.0));
    }
}
