use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ReferenceLine,
    ValueRange,
};
use crate::indicator::{Indicator, IndicatorOutput, close_prices, line_points};
use crate::model::Candle;

/// Momentum: close minus the close `period` bars ago.
pub struct Momentum {
    definition: IndicatorDefinition,
}

impl Momentum {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "momentum",
                name: "Momentum",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("period", "Period", 10.0, 1.0, 200.0),
                    ParamDef::color("color", "Color", "#FF6D00"),
                ],
                outputs: vec![OutputDef::line("momentum", "#FF6D00")],
                min_data_points: 2,
                reference_lines: vec![ReferenceLine::dashed(0.0, "#787B86")],
                value_range: Some(ValueRange::SymmetricAroundZero),
            },
        }
    }
}

impl Default for Momentum {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Momentum {
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
            .map(|(i, close)| Some(close - closes[i.checked_sub(period)?]))
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
    fn momentum_is_price_difference() {
        let momentum = Momentum::new();
        let raw = HashMap::from([("period".to_owned(), ParamValue::Number(2.0))]);
        let config = IndicatorConfig::resolve(momentum.definition(), &raw);
        let candles = candles_from_closes(&[10.0, 11.0, 15.0, 9.0]);
        let IndicatorOutput::Line(points) = momentum.calculate(&candles, &config) else {
            panic!("line output expected");
        };
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5.0, -2.0]);
        assert_eq!(points[0].time, candles[2].chart_time());
    }
}
