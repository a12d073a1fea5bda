//! Declarative schema every calculator publishes: typed parameters with
//! defaults, named outputs, data gating and display metadata.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Where the indicator is drawn relative to the price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Overlay,
    Panel,
}

/// Control type and default of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamKind {
    Number {
        default: f64,
        min: f64,
        max: f64,
        step: f64,
    },
    Color {
        default: &'static str,
    },
    Select {
        default: &'static str,
        options: &'static [&'static str],
    },
    Boolean {
        default: bool,
    },
}

impl ParamKind {
    pub fn default_value(&self) -> ParamValue {
        match self {
            Self::Number { default, .. } => ParamValue::Number(*default),
            Self::Color { default } | Self::Select { default, .. } => {
                ParamValue::Text((*default).to_owned())
            }
            Self::Boolean { default } => ParamValue::Bool(*default),
        }
    }

    /// Accept `value` if it fits this kind, clamping numbers into range.
    fn accept(&self, value: &ParamValue) -> Option<ParamValue> {
        match (self, value) {
            (Self::Number { min, max, .. }, ParamValue::Number(n)) if n.is_finite() => {
                Some(ParamValue::Number(n.clamp(*min, *max)))
            }
            (Self::Color { .. }, ParamValue::Text(s)) if !s.is_empty() => {
                Some(ParamValue::Text(s.clone()))
            }
            (Self::Select { options, .. }, ParamValue::Text(s)) if options.contains(&s.as_str()) => {
                Some(ParamValue::Text(s.clone()))
            }
            (Self::Boolean { .. }, ParamValue::Bool(b)) => Some(ParamValue::Bool(*b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDef {
    pub key: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: ParamKind,
}

impl ParamDef {
    pub fn number(key: &'static str, label: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self::stepped(key, label, default, min, max, 1.0)
    }

    pub fn stepped(
        key: &'static str,
        label: &'static str,
        default: f64,
        min: f64,
        max: f64,
        step: f64,
    ) -> Self {
        Self {
            key,
            label,
            kind: ParamKind::Number {
                default,
                min,
                max,
                step,
            },
        }
    }

    pub fn color(key: &'static str, label: &'static str, default: &'static str) -> Self {
        Self {
            key,
            label,
            kind: ParamKind::Color { default },
        }
    }

    pub fn select(
        key: &'static str,
        label: &'static str,
        default: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            key,
            label,
            kind: ParamKind::Select { default, options },
        }
    }

    pub fn boolean(key: &'static str, label: &'static str, default: bool) -> Self {
        Self {
            key,
            label,
            kind: ParamKind::Boolean { default },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Line,
    Histogram,
    Band,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

/// One named series an indicator emits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputDef {
    pub key: &'static str,
    pub kind: OutputKind,
    pub color: &'static str,
    pub line_width: u8,
    pub style: LineStyle,
}

impl OutputDef {
    pub fn line(key: &'static str, color: &'static str) -> Self {
        Self {
            key,
            kind: OutputKind::Line,
            color,
            line_width: 2,
            style: LineStyle::Solid,
        }
    }

    pub fn histogram(key: &'static str, color: &'static str) -> Self {
        Self {
            key,
            kind: OutputKind::Histogram,
            color,
            line_width: 1,
            style: LineStyle::Solid,
        }
    }

    pub fn band(key: &'static str, color: &'static str) -> Self {
        Self {
            key,
            kind: OutputKind::Band,
            color,
            line_width: 1,
            style: LineStyle::Solid,
        }
    }
}

/// Horizontal guide drawn in an indicator panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub value: f64,
    pub color: &'static str,
    pub style: LineStyle,
}

impl ReferenceLine {
    pub fn dashed(value: f64, color: &'static str) -> Self {
        Self {
            value,
            color,
            style: LineStyle::Dashed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueRange {
    Fixed { min: f64, max: f64 },
    SymmetricAroundZero,
}

/// Static metadata of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub placement: Placement,
    pub parameters: Vec<ParamDef>,
    pub outputs: Vec<OutputDef>,
    pub min_data_points: usize,
    pub reference_lines: Vec<ReferenceLine>,
    pub value_range: Option<ValueRange>,
}

impl IndicatorDefinition {
    pub fn parameter(&self, key: &str) -> Option<&ParamDef> {
        self.parameters.iter().find(|p| p.key == key)
    }
}

/// A parameter value as produced by a settings UI or a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

/// Parameter values validated against one definition: exactly one entry per
/// declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorConfig {
    values: BTreeMap<&'static str, ParamValue>,
}

impl IndicatorConfig {
    pub fn defaults(definition: &IndicatorDefinition) -> Self {
        Self::resolve(definition, &HashMap::new())
    }

    /// Overlay `raw` onto the defaults. Unknown keys are dropped; values of
    /// the wrong type or outside the option list fall back to the default.
    pub fn resolve(definition: &IndicatorDefinition, raw: &HashMap<String, ParamValue>) -> Self {
        let values = definition
            .parameters
            .iter()
            .map(|param| {
                let value = raw
                    .get(param.key)
                    .and_then(|v| param.kind.accept(v))
                    .unwrap_or_else(|| param.kind.default_value());
                (param.key, value)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn number(&self, key: &str) -> f64 {
        match self.values.get(key) {
            Some(ParamValue::Number(n)) => *n,
            _ => 0.0,
        }
    }

    /// Numeric parameter interpreted as a window length (at least 1).
    pub fn period(&self, key: &str) -> usize {
        self.number(key).round().max(1.0) as usize
    }

    pub fn text(&self, key: &str) -> &str {
        match self.values.get(key) {
            Some(ParamValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(ParamValue::Bool(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> IndicatorDefinition {
        IndicatorDefinition {
            id: "demo",
            name: "Demo",
            placement: Placement::Panel,
            parameters: vec![
                ParamDef::number("period", "Period", 14.0, 2.0, 100.0),
                ParamDef::color("color", "Color", "#7E57C2"),
                ParamDef::select("source", "Source", "close", &["close", "open"]),
                ParamDef::boolean("show", "Show", false),
            ],
            outputs: vec![OutputDef::line("demo", "#7E57C2")],
            min_data_points: 2,
            reference_lines: vec![],
            value_range: None,
        }
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config = IndicatorConfig::defaults(&definition());
        assert_eq!(config.period("period"), 14);
        assert_eq!(config.text("color"), "#7E57C2");
        assert_eq!(config.text("source"), "close");
        assert!(!config.flag("show"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let raw = HashMap::from([("bogus".to_owned(), ParamValue::Number(3.0))]);
        let config = IndicatorConfig::resolve(&definition(), &raw);
        assert!(config.get("bogus").is_none());
    }

    #[test]
    fn numbers_are_clamped_into_range() {
        let raw = HashMap::from([("period".to_owned(), ParamValue::Number(500.0))]);
        assert_eq!(IndicatorConfig::resolve(&definition(), &raw).period("period"), 100);
        let raw = HashMap::from([("period".to_owned(), ParamValue::Number(-4.0))]);
        assert_eq!(IndicatorConfig::resolve(&definition(), &raw).period("period"), 2);
    }

    #[test]
    fn mismatched_values_fall_back() {
        let raw = HashMap::from([
            ("period".to_owned(), ParamValue::Text("ten".into())),
            ("source".to_owned(), ParamValue::Text("median".into())),
            ("show".to_owned(), ParamValue::Number(1.0)),
        ]);
        let config = IndicatorConfig::resolve(&definition(), &raw);
        assert_eq!(config.period("period"), 14);
        assert_eq!(config.text("source"), "close");
        assert!(!config.flag("show"));
    }

    #[test]
    fn valid_overrides_are_kept() {
        let raw = HashMap::from([
            ("source".to_owned(), ParamValue::Text("open".into())),
            ("show".to_owned(), ParamValue::Bool(true)),
        ]);
        let config = IndicatorConfig::resolve(&definition(), &raw);
        assert_eq!(config.text("source"), "open");
        assert!(config.flag("show"));
    }

    #[test]
    fn param_value_deserializes_untagged() {
        let v: ParamValue = serde_json::from_str("14").unwrap();
        assert_eq!(v, ParamValue::Number(14.0));
        let v: ParamValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, ParamValue::Bool(true));
        let v: ParamValue = serde_json::from_str("\"#fff\"").unwrap();
        assert_eq!(v, ParamValue::Text("#fff".into()));
    }
}
