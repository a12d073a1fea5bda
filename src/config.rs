use std::collections::HashMap;
use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::indicator::{IndicatorRegistry, ParamValue};
use crate::model::Timeframe;
use crate::pipeline::PipelineSettings;
use crate::series::{ColorMode, SeriesType};
use crate::source::MAX_PAGE_LIMIT;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_requests_per_second() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_initial_limit() -> usize {
    1000
}

fn default_latest_limit() -> usize {
    10
}

fn default_refresh_interval_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    pub source: SourceConfig,
    pub chart: ChartConfig,
    #[serde(default)]
    pub indicators: Vec<IndicatorEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct ChartConfig {
    pub asset_id: u64,
    /// Bucket size in minutes.
    pub timeframe: u32,
    #[serde(default = "default_initial_limit")]
    pub initial_limit: usize,
    #[serde(default = "default_latest_limit")]
    pub latest_limit: usize,
    /// Extra history pages loaded after the initial page.
    #[serde(default)]
    pub history_pages: usize,
    #[serde(default)]
    pub auto_refresh: bool,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub series_type: SeriesType,
    #[serde(default)]
    pub color_mode: ColorMode,
}

impl ChartConfig {
    pub fn timeframe(&self) -> Option<Timeframe> {
        Timeframe::from_minutes(self.timeframe)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            initial_limit: self.initial_limit.min(MAX_PAGE_LIMIT),
            history_limit: self.initial_limit.min(MAX_PAGE_LIMIT),
            latest_limit: self.latest_limit.min(MAX_PAGE_LIMIT),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IndicatorEntry {
    pub id: String,
    #[serde(default)]
    pub params: HashMap<String, ParamValue>,
    #[serde(default = "default_true")]
    pub visible: bool,
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path, registry: &IndicatorRegistry) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config, registry)?;

    Ok(config)
}

const LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig, registry: &IndicatorRegistry) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_source(config)?;
    validate_chart(config)?;
    validate_indicators(config, registry)?;
    Ok(())
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" is not one of text, json",
                config.general.log_format
            ),
        }));
    }
    Ok(())
}

fn validate_source(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.source.base_url.trim().is_empty() {
        return Err(Report::new(ConfigError::Validation {
            field: "source.base_url must not be empty".into(),
        }));
    }
    if config.source.requests_per_second == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "source.requests_per_second must be > 0".into(),
        }));
    }
    Ok(())
}

fn validate_chart(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let chart = &config.chart;
    if chart.timeframe().is_none() {
        let supported: Vec<String> = Timeframe::ALL
            .iter()
            .map(|tf| tf.minutes().to_string())
            .collect();
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "chart.timeframe: unsupported value {} (expected one of {})",
                chart.timeframe,
                supported.join(", ")
            ),
        }));
    }
    if chart.initial_limit == 0 || chart.latest_limit == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "chart.initial_limit and chart.latest_limit must be > 0".into(),
        }));
    }
    if chart.auto_refresh && chart.refresh_interval_secs == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "chart.refresh_interval_secs must be > 0 when auto_refresh is on".into(),
        }));
    }
    Ok(())
}

fn validate_indicators(
    config: &AppConfig,
    registry: &IndicatorRegistry,
) -> Result<(), Report<ConfigError>> {
    for (index, entry) in config.indicators.iter().enumerate() {
        if !registry.contains(&entry.id) {
            return Err(Report::new(ConfigError::Validation {
                field: format!("indicators[{index}].id: unknown indicator \"{}\"", entry.id),
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    const MINIMAL: &str = r#"
[source]
base_url = "http://localhost:8000"

[chart]
asset_id = 1
timeframe = 60
"#;

    #[test]
    fn valid_full_config_parses() {
        let toml = r##"
[general]
log_level = "debug"
log_format = "json"

[source]
base_url = "https://charts.example.com"
requests_per_second = 4
timeout_secs = 3

[chart]
asset_id = 42
timeframe = 240
initial_limit = 20000
latest_limit = 5
history_pages = 2
auto_refresh = true
refresh_interval_secs = 10
series_type = "price"
color_mode = "neutral"

[[indicators]]
id = "rsi"
params = { period = 7, color = "#FFFFFF" }

[[indicators]]
id = "obv"
params = { show_signal = true }
visible = false
"##;
        let config = parse(toml);
        validate(&config, &IndicatorRegistry::with_builtins()).unwrap();

        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.source.requests_per_second, 4);
        assert_eq!(config.chart.timeframe(), Some(Timeframe::Hour4));
        assert_eq!(config.chart.series_type, SeriesType::Price);
        assert_eq!(config.chart.color_mode, ColorMode::Neutral);
        assert_eq!(config.indicators.len(), 2);
        assert_eq!(config.indicators[0].params["period"], ParamValue::Number(7.0));
        assert_eq!(config.indicators[1].params["show_signal"], ParamValue::Bool(true));
        assert!(!config.indicators[1].visible);

        let settings = config.chart.pipeline_settings();
        assert_eq!(settings.initial_limit, MAX_PAGE_LIMIT);
        assert_eq!(settings.latest_limit, 5);
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let config = parse(MINIMAL);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.source.requests_per_second, 8);
        assert_eq!(config.source.timeout_secs, 10);
        assert_eq!(config.chart.initial_limit, 1000);
        assert_eq!(config.chart.latest_limit, 10);
        assert_eq!(config.chart.history_pages, 0);
        assert!(!config.chart.auto_refresh);
        assert_eq!(config.chart.refresh_interval_secs, 5);
        assert_eq!(config.chart.series_type, SeriesType::Ohlc);
        assert_eq!(config.chart.color_mode, ColorMode::Directional);
        assert!(config.indicators.is_empty());
    }

    #[test]
    fn unknown_timeframe_rejected() {
        let config = parse(&MINIMAL.replace("timeframe = 60", "timeframe = 2"));
        assert!(validate(&config, &IndicatorRegistry::with_builtins()).is_err());
    }

    #[test]
    fn unknown_indicator_rejected() {
        let toml = format!("{MINIMAL}\n[[indicators]]\nid = \"ichimoku\"\n");
        let config = parse(&toml);
        let report = validate(&config, &IndicatorRegistry::with_builtins()).unwrap_err();
        assert!(matches!(
            report.current_context(),
            ConfigError::Validation { field } if field.contains("ichimoku")
        ));
    }

    #[test]
    fn zero_rate_rejected() {
        let toml = MINIMAL.replace(
            "base_url = \"http://localhost:8000\"",
            "base_url = \"http://localhost:8000\"\nrequests_per_second = 0",
        );
        assert!(validate(&parse(&toml), &IndicatorRegistry::with_builtins()).is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let toml = format!("[general]\nlog_format = \"xml\"\n{MINIMAL}");
        assert!(validate(&parse(&toml), &IndicatorRegistry::with_builtins()).is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let report = load(
            Path::new("/nonexistent/chart-feed.toml"),
            &IndicatorRegistry::with_builtins(),
        )
        .unwrap_err();
        assert!(matches!(report.current_context(), ConfigError::ReadFile));
    }
}
