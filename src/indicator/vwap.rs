use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement,
};
use crate::indicator::{Indicator, IndicatorOutput, line_points};
use crate::model::Candle;

/// Volume-weighted average price accumulated from the first supplied candle.
pub struct Vwap {
    definition: IndicatorDefinition,
}

impl Vwap {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "vwap",
                name: "VWAP",
                placement: Placement::Overlay,
                parameters: vec![ParamDef::color("color", "Color", "#E91E63")],
                outputs: vec![OutputDef::line("vwap", "#E91E63")],
                min_data_points: 1,
                reference_lines: Vec::new(),
                value_range: None,
            },
        }
    }
}

impl Default for Vwap {
    fn default() -> Self {
        Self::new()
    }
}

/// Cumulative VWAP; bars before any volume has traded have no value.
pub fn vwap_values(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut price_volume = 0.0;
    let mut volume = 0.0;
    candles
        .iter()
        .map(|c| {
            price_volume += c.typical_price() * c.volume;
            volume += c.volume;
            (volume > 0.0).then(|| price_volume / volume)
        })
        .collect()
}

impl Indicator for Vwap {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, _config: &IndicatorConfig) -> usize {
        1
    }

    fn calculate(&self, candles: &[Candle], _config: &IndicatorConfig) -> IndicatorOutput {
        IndicatorOutput::Line(line_points(candles, &vwap_values(candles)))
    }
}
