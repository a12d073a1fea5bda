use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ReferenceLine,
    ValueRange,
};
use crate::indicator::{Indicator, IndicatorOutput, close_prices, line_points};
use crate::model::Candle;

/// Rate of change: percent move of close versus `period` bars ago.
pub struct Roc {
    definition: IndicatorDefinition,
}

impl Roc {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "roc",
                name: "Rate of Change",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("period", "Period", 12.0, 1.0, 200.0),
                    ParamDef::color("color", "Color", "#2962FF"),
                ],
                outputs: vec![OutputDef::line("roc", "#2962FF")],
                min_data_points: 2,
                reference_lines: vec![ReferenceLine::dashed(0.0, "#787B86")],
                value_range: Some(ValueRange::SymmetricAroundZero),
            },
        }
    }
}

impl Default for Roc {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Roc {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period") + 1
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let period = config.period("period");
        let closes = close_prices(candles);
        let values: Vec<Option<f64>> = closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let past = closes[i.checked_sub(period)?];
                // A zero base has no defined percentage
                if past == 0.0 {
                    return None;
                }
                Some((close - past) / past * 100.0)
            })
            .collect();

        IndicatorOutput::Line(line_points(candles, &values))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::indicator::ParamValue;
    use crate::model::test_support::candles_from_closes;

    #[test]
    fn roc_known_values() {
        let roc = Roc::new();
        let raw = HashMap::from([("period".to_owned(), ParamValue::Number(2.0))]);
        let config = IndicatorConfig::resolve(roc.definition(), &raw);
        let IndicatorOutput::Line(points) =
            roc.calculate(&candles_from_closes(&[10.0, 11.0, 12.0, 9.9]), &config)
        else {
            panic!("line output expected");
        };
        assert_eq!(points.len(), 2);
        assert!((points[0].value - 20.0).abs() < 1e-9);
        assert!((points[1].value + 10.0).abs() < 1e-9);
    }

    #[test]
    fn roc_skips_zero_base() {
        let roc = Roc::new();
        let raw = HashMap::from([("period".to_owned(), ParamValue::Number(1.0))]);
        let config = IndicatorConfig::resolve(roc.definition(), &raw);
        let output = roc.calculate(&candles_from_closes(&[0.0, 1.0, 2.0]), &config);
        assert_eq!(output.len(), 1);
    }
}
