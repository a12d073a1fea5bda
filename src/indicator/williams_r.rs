use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ReferenceLine,
    ValueRange,
};
use crate::indicator::{Indicator, IndicatorOutput, highs, line_points, lows};
use crate::math;
use crate::model::Candle;

/// Williams %R: close relative to the trailing high, in `-100..=0`.
pub struct WilliamsR {
    definition: IndicatorDefinition,
}

impl WilliamsR {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "williams_r",
                name: "Williams %R",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("period", "Period", 14.0, 1.0, 100.0),
                    ParamDef::color("color", "Color", "#7E57C2"),
                ],
                outputs: vec![OutputDef::line("williams_r", "#7E57C2")],
                min_data_points: 2,
                reference_lines: vec![
                    ReferenceLine::dashed(-20.0, "#EF5350"),
                    ReferenceLine::dashed(-80.0, "#26A69A"),
                ],
                value_range: Some(ValueRange::Fixed {
                    min: -100.0,
                    max: 0.0,
                }),
            },
        }
    }
}

impl Default for WilliamsR {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for WilliamsR {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period")
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let period = config.period("period");
        let highest = math::highest(&highs(candles), period);
        let lowest = math::lowest(&lows(candles), period);

        let values: Vec<Option<f64>> = candles
            .iter()
            .zip(highest.iter().zip(&lowest))
            .map(|(c, (hh, ll))| {
                let (hh, ll) = ((*hh)?, (*ll)?);
                let range = hh - ll;
                if range == 0.0 {
                    return Some(-50.0);
                }
                Some(((hh - c.close) / range * -100.0).clamp(-100.0, 0.0))
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
    use crate::model::test_support::candles_from_hlcv;

    #[test]
    fn close_at_high_is_zero_and_at_low_is_minus_hundred() {
        let wr = WilliamsR::new();
        let raw = HashMap::from([("period".to_owned(), ParamValue::Number(2.0))]);
        let config = IndicatorConfig::resolve(wr.definition(), &raw);
        let candles = candles_from_hlcv(&[
            (10.0, 8.0, 9.0, 1.0),
            (12.0, 9.0, 12.0, 1.0),
            (11.0, 8.5, 8.5, 1.0),
        ]);
        let IndicatorOutput::Line(points) = wr.calculate(&candles, &config) else {
            panic!("line output expected");
        };
        assert_eq!(points.len(), 2);
        assert!(points[0].value.abs() < 1e-9);
        assert!((points[1].value + 100.0).abs() < 1e-9);
    }
}
