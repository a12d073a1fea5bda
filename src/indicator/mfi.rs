use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement, ReferenceLine,
    ValueRange,
};
use crate::indicator::{Indicator, IndicatorOutput, line_points};
use crate::model::Candle;

/// Money Flow Index: volume-weighted RSI over typical-price money flow.
pub struct Mfi {
    definition: IndicatorDefinition,
}

impl Mfi {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "mfi",
                name: "Money Flow Index",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("period", "Period", 14.0, 1.0, 100.0),
                    ParamDef::color("color", "Color", "#AB47BC"),
                ],
                outputs: vec![OutputDef::line("mfi", "#AB47BC")],
                min_data_points: 3,
                reference_lines: vec![
                    ReferenceLine::dashed(80.0, "#EF5350"),
                    ReferenceLine::dashed(20.0, "#26A69A"),
                ],
                value_range: Some(ValueRange::Fixed {
                    min: 0.0,
                    max: 100.0,
                }),
            },
        }
    }
}

impl Default for Mfi {
    fn default() -> Self {
        Self::new()
    }
}

/// Full-length MFI series; the first value sits at index `period`.
pub fn mfi_values(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < period + 1 {
        return out;
    }

    let typical: Vec<f64> = candles.iter().map(Candle::typical_price).collect();
    // (positive, negative) raw money flow of each bar versus its predecessor
    let flows: Vec<(f64, f64)> = typical
        .windows(2)
        .zip(&candles[1..])
        .map(|(w, candle)| {
            let raw = w[1] * candle.volume;
            if w[1] > w[0] {
                (raw, 0.0)
            } else if w[1] < w[0] {
                (0.0, raw)
            } else {
                (0.0, 0.0)
            }
        })
        .collect();

    for (i, window) in flows.windows(period).enumerate() {
        let (positive, negative) = window
            .iter()
            .fold((0.0, 0.0), |(p, n), (pos, neg)| (p + pos, n + neg));
        let value = if negative == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + positive / negative)
        };
        out[i + period] = Some(value.clamp(0.0, 100.0));
    }

    out
}

impl Indicator for Mfi {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period") + 1
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let values = mfi_values(candles, config.period("period"));
        IndicatorOutput::Line(line_points(candles, &values))
    }
}
