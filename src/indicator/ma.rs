use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement,
};
use crate::indicator::{Indicator, IndicatorOutput, close_prices, line_points};
use crate::math;
use crate::model::{Candle, PriceSource};

const PRICE_SOURCES: &[&str] = &["close", "open", "high", "low", "hl2", "hlc3", "ohlc4"];

fn overlay_definition(
    id: &'static str,
    name: &'static str,
    color: &'static str,
    with_source: bool,
) -> IndicatorDefinition {
    let mut parameters = vec![ParamDef::number("period", "Period", 20.0, 1.0, 500.0)];
    if with_source {
        parameters.push(ParamDef::select("source", "Source", "close", PRICE_SOURCES));
    }
    parameters.push(ParamDef::color("color", "Color", color));

    IndicatorDefinition {
        id,
        name,
        placement: Placement::Overlay,
        parameters,
        outputs: vec![OutputDef::line(id, color)],
        min_data_points: 1,
        reference_lines: Vec::new(),
        value_range: None,
    }
}

/// Simple Moving Average of close.
pub struct Sma {
    definition: IndicatorDefinition,
}

impl Sma {
    pub fn new() -> Self {
        Self {
            definition: overlay_definition("sma", "Simple Moving Average", "#2962FF", false),
        }
    }
}

impl Default for Sma {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Sma {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period")
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let values = math::sma(&close_prices(candles), config.period("period"));
        IndicatorOutput::Line(line_points(candles, &values))
    }
}

/// Exponential Moving Average over a configurable price source.
pub struct Ema {
    definition: IndicatorDefinition,
}

impl Ema {
    pub fn new() -> Self {
        Self {
            definition: overlay_definition("ema", "Exponential Moving Average", "#FF6D00", true),
        }
    }
}

impl Default for Ema {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Ema {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period")
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let source = PriceSource::from_key(config.text("source")).unwrap_or_default();
        let prices: Vec<f64> = candles.iter().map(|c| source.extract(c)).collect();
        let values = math::ema(&prices, config.period("period"));
        IndicatorOutput::Line(line_points(candles, &values))
    }
}

/// Linearly weighted moving average of close.
pub struct Wma {
    definition: IndicatorDefinition,
}

impl Wma {
    pub fn new() -> Self {
        Self {
            definition: overlay_definition("wma", "Weighted Moving Average", "#00BCD4", false),
        }
    }
}

impl Default for Wma {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Wma {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period")
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let values = math::wma(&close_prices(candles), config.period("period"));
        IndicatorOutput::Line(line_points(candles, &values))
    }
}
