use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ReferenceLine,
    ValueRange,
};
use crate::indicator::{Indicator, IndicatorOutput, line_points};
use crate::math;
use crate::model::Candle;

const LAMBERT_CONSTANT: f64 = 0.015;

/// Commodity Channel Index over the typical price.
pub struct Cci {
    definition: IndicatorDefinition,
}

impl Cci {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "cci",
                name: "Commodity Channel Index",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("period", "Period", 20.0, 2.0, 200.0),
                    ParamDef::color("color", "Color", "#00BCD4"),
                ],
                outputs: vec![OutputDef::line("cci", "#00BCD4")],
                min_data_points: 2,
                reference_lines: vec![
                    ReferenceLine::dashed(100.0, "#EF5350"),
                    ReferenceLine::dashed(0.0, "#787B86"),
                    ReferenceLine::dashed(-100.0, "#26A69A"),
                ],
                value_range: Some(ValueRange::SymmetricAroundZero),
            },
        }
    }
}

impl Default for Cci {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Cci {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period")
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let period = config.period("period");
        let typical: Vec<f64> = candles.iter().map(Candle::typical_price).collect();
        let means = math::sma(&typical, period);

        let values: Vec<Option<f64>> = means
            .iter()
            .enumerate()
            .map(|(i, mean)| {
                let mean = (*mean)?;
                let window = &typical[i + 1 - period..=i];
                let mean_dev =
                    window.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;
                if mean_dev == 0.0 {
                    return Some(0.0);
                }
                Some((typical[i] - mean) / (LAMBERT_CONSTANT * mean_dev))
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
    fn cci_known_value() {
        let cci = Cci::new();
        let raw = HashMap::from([("period".to_owned(), ParamValue::Number(3.0))]);
        let config = IndicatorConfig::resolve(cci.definition(), &raw);
        // flat candles: typical price == close; window 1,2,3 -> mean 2, md 2/3
        let IndicatorOutput::Line(points) =
            cci.calculate(&candles_from_closes(&[1.0, 2.0, 3.0]), &config)
        else {
            panic!("line output expected");
        };
        assert_eq!(points.len(), 1);
        let expected = (3.0 - 2.0) / (0.015 * (2.0 / 3.0));
        assert!((points[0].value - expected).abs() < 1e-9);
    }

    #[test]
    fn cci_flat_prices_is_zero() {
        let cci = Cci::new();
        let config = IndicatorConfig::defaults(cci.definition());
        let IndicatorOutput::Line(points) =
            cci.calculate(&candles_from_closes(&[5.0; 25]), &config)
        else {
            panic!("line output expected");
        };
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| p.value == 0.0));
    }
}
