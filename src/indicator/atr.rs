use crate::indicator::definition::{
    IndicatorConfig, IndicatorDefinition, OutputDef, ParamDef, Placement,
};
use crate::indicator::{Indicator, IndicatorOutput, line_points};
use crate::math;
use crate::model::Candle;

const SMOOTHING: &[&str] = &["sma", "wilder"];

/// Average True Range.
pub struct Atr {
    definition: IndicatorDefinition,
}

impl Atr {
    pub fn new() -> Self {
        Self {
            definition: IndicatorDefinition {
                id: "atr",
                name: "Average True Range",
                placement: Placement::Panel,
                parameters: vec![
                    ParamDef::number("period", "Period", 14.0, 1.0, 100.0),
                    ParamDef::select("smoothing", "Smoothing", "sma", SMOOTHING),
                    ParamDef::color("color", "Color", "#FF5252"),
                ],
                outputs: vec![OutputDef::line("atr", "#FF5252")],
                min_data_points: 2,
                reference_lines: Vec::new(),
                value_range: None,
            },
        }
    }
}

impl Default for Atr {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling mean of the true range, or Wilder's recurrence seeded with that
/// mean when `wilder` is set.
pub fn atr_values(candles: &[Candle], period: usize, wilder: bool) -> Vec<Option<f64>> {
    let tr = math::true_range(candles);
    let mut out = math::sma(&tr, period);
    if !wilder {
        return out;
    }

    let (start, _) = math::defined_tail(&out);
    let Some(mut prev) = out.get(start).copied().flatten() else {
        return out;
    };
    for i in start + 1..tr.len() {
        prev = (prev * (period - 1) as f64 + tr[i]) / period as f64;
        out[i] = Some(prev);
    }
    out
}

impl Indicator for Atr {
    fn definition(&self) -> &IndicatorDefinition {
        &self.definition
    }

    fn required_candles(&self, config: &IndicatorConfig) -> usize {
        config.period("period")
    }

    fn calculate(&self, candles: &[Candle], config: &IndicatorConfig) -> IndicatorOutput {
        let wilder = config.text("smoothing") == "wilder";
        let values = atr_values(candles, config.period("period"), wilder);
        IndicatorOutput::Line(line_points(candles, &values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::candles_from_hlcv;

    fn fixture() -> Vec<Candle> {
        candles_from_hlcv(&[
            (10.0, 8.0, 9.0, 1.0),
            (12.0, 9.0, 11.0, 1.0),
            (11.5, 10.0, 10.5, 1.0),
            (14.0, 10.5, 13.0, 1.0),
        ])
    }

    #[test]
    fn atr_is_rolling_mean_of_true_range() {
        // true ranges 2, 3, 1.5, 3.5
        let values = atr_values(&fixture(), 2, false);
        assert_eq!(values[0], None);
        assert_eq!(values[1], Some(2.5));
        assert_eq!(values[2], Some(2.25));
        assert_eq!(values[3], Some(2.5));
    }

    #[test]
    fn wilder_smoothing_carries_previous_value() {
        let values = atr_values(&fixture(), 2, true);
        assert_eq!(values[1], Some(2.5));
        // (2.5 * 1 + 1.5) / 2, then (2.0 * 1 + 3.5) / 2
        assert_eq!(values[2], Some(2.0));
        assert_eq!(values[3], Some(2.75));
    }

    #[test]
    fn atr_short_input_is_empty() {
        assert!(atr_values(&fixture()[..1], 2, true).iter().all(Option::is_none));
    }
}
