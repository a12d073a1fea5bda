use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement,
};
use crate::indicator::{Indicator, IndicatorOutput, close_prices};
use crate::math;
use crate::model::{BandPoint, Candle};

/// Bollinger Bands: SMA middle band with standard-deviation envelopes.
pub struct BollingerBands {
    definition: IndicatorDefinition,
}

impl BollingerBands {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "bollinger",
                name: "Bollinger Bands",
                placement: Placement::Overlay,
                parameters: vec![
                    ParamDef::number("period", "Period", 20.0, 2.0, 200.0),
                    ParamDef::stepped("std_dev", "Std Dev", 2.0, 0.1, 5.0, 0.1),
                    ParamDef::color("upper_color", "Upper Color", "#2962FF"),
                    ParamDef::color("middle_color", "Middle Color", "#FF6D00"),
                    ParamDef::color("lower_color", "Lower Color", "#2962FF"),
                ],
                outputs: vec![
                    OutputDef::band("upper", "#2962FF"),
                    OutputDef::band("middle", "#FF6D00"),
                    OutputDef::band("lower", "#2962FF"),
                ],
                min_data_points: 2,
                reference_lines: Vec::new(),
                value_range: None,
            },
        }
    }
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self::new()
    }
}

/// Upper, middle and lower band values over `prices`.
pub fn bands(prices: &[f64], period: usize, multiplier: f64) -> Vec<Option<(f64, f64, f64)>> {
    let middle = math::sma(prices, period);
    let deviation = math::std_dev(prices, period);
    middle
        .iter()
        .zip(&deviation)
        .map(|(m, sd)| {
            let (m, sd) = ((*m)?, (*sd)?);
            Some((m + multiplier * sd, m, m - multiplier * sd))
        })
        .collect()
}

impl Indicator for BollingerBands {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period")
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let values = bands(
            &close_prices(candles),
            config.period("period"),
            config.number("std_dev"),
        );
        let points = candles
            .iter()
            .zip(values)
            .filter_map(|(c, band)| {
                let (upper, middle, lower) = band?;
                Some(BandPoint {
                    time: c.chart_time(),
                    upper,
                    middle,
                    lower,
                })
            })
            .collect();
        IndicatorOutput::Band(points)
    }
}
