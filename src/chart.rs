//! One chart: a candle pipeline, its derived series and the indicator
//! instances drawn over it.

use std::collections::HashMap;
use std::sync::Arc;

use error_stack::Report;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::IndicatorError;
use crate::indicator::definition::Placement;
use crate::indicator::{
    IndicatorConfig, IndicatorOutput, IndicatorRegistry, ParamValue, ReferenceLine,
};
use crate::model::{AssetId, Candle, HistogramPoint, SeriesPoint, Timeframe};
use crate::pipeline::{CandlePipeline, PipelineSnapshot};
use crate::series::{self, ColorMode, SeriesInput, SeriesSnapshot, SeriesType};

/// An indicator placed on a chart with its own parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorInstance {
    pub instance_id: Uuid,
    pub indicator_id: String,
    /// Parameters as supplied, before resolution.
    pub params: HashMap<String, ParamValue>,
    pub config: IndicatorConfig,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorFrame {
    pub instance_id: Uuid,
    pub indicator_id: String,
    pub name: &'static str,
    pub placement: Placement,
    pub reference_lines: Vec<ReferenceLine>,
    pub output: IndicatorOutput,
}

/// Everything the renderer needs for one redraw.
#[derive(Debug, Clone, Serialize)]
pub struct ChartFrame {
    pub asset_id: Option<AssetId>,
    pub timeframe: Option<Timeframe>,
    pub series_type: SeriesType,
    pub series: Vec<SeriesPoint>,
    pub volume: Vec<HistogramPoint>,
    pub has_valid_volume: bool,
    pub indicators: Vec<IndicatorFrame>,
    pub has_more: bool,
    pub error: Option<String>,
}

pub struct ChartSession {
    registry: Arc<IndicatorRegistry>,
    pipeline: CandlePipeline,
    series_type: SeriesType,
    color_mode: ColorMode,
    series: Option<Arc<SeriesSnapshot>>,
    instances: Vec<IndicatorInstance>,
}

impl ChartSession {
    pub fn new(
        registry: Arc<IndicatorRegistry>,
        pipeline: CandlePipeline,
        series_type: SeriesType,
        color_mode: ColorMode,
    ) -> Self {
        Self {
            registry,
            pipeline,
            series_type,
            color_mode,
            series: None,
            instances: Vec::new(),
        }
    }

    pub fn pipeline(&self) -> &CandlePipeline {
        &self.pipeline
    }

    pub fn instances(&self) -> &[IndicatorInstance] {
        &self.instances
    }

    pub fn set_series_type(&mut self, series_type: SeriesType) {
        self.series_type = series_type;
    }

    pub fn set_color_mode(&mut self, color_mode: ColorMode) {
        self.color_mode = color_mode;
    }

    /// Place indicator `indicator_id` on the chart; returns the new instance id.
    pub fn add_indicator(
        &mut self,
        indicator_id: &str,
        params: HashMap<String, ParamValue>,
    ) -> Result<Uuid, Report<IndicatorError>> {
        let config = self.registry.resolve_config(indicator_id, &params)?;
        let instance_id = Uuid::new_v4();
        self.instances.push(IndicatorInstance {
            instance_id,
            indicator_id: indicator_id.to_owned(),
            params,
            config,
            visible: true,
        });
        debug!(%instance_id, indicator_id, "indicator added");
        Ok(instance_id)
    }

    pub fn remove_indicator(
        &mut self,
        instance_id: Uuid,
    ) -> Result<IndicatorInstance, Report<IndicatorError>> {
        let index = self
            .instances
            .iter()
            .position(|i| i.instance_id == instance_id)
            .ok_or_else(|| unknown_instance(instance_id))?;
        Ok(self.instances.remove(index))
    }

    /// Replace an instance's parameters; they are resolved against the
    /// indicator's definition again.
    pub fn update_config(
        &mut self,
        instance_id: Uuid,
        params: HashMap<String, ParamValue>,
    ) -> Result<(), Report<IndicatorError>> {
        let registry = Arc::clone(&self.registry);
        let instance = self.instance_mut(instance_id)?;
        instance.config = registry.resolve_config(&instance.indicator_id, &params)?;
        instance.params = params;
        Ok(())
    }

    pub fn set_visible(
        &mut self,
        instance_id: Uuid,
        visible: bool,
    ) -> Result<(), Report<IndicatorError>> {
        self.instance_mut(instance_id)?.visible = visible;
        Ok(())
    }

    /// Candles the visible indicators need before all of them draw.
    pub fn required_candles(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.visible)
            .filter_map(|i| {
                let indicator = self.registry.get(&i.indicator_id)?;
                let gate = indicator.definition().min_data_points;
                Some(indicator.required_candles(&i.config).max(gate))
            })
            .max()
            .unwrap_or(0)
    }

    /// Render the pipeline's current state.
    pub async fn frame(&mut self) -> ChartFrame {
        let snapshot = self.pipeline.snapshot().await;
        self.render(&snapshot)
    }

    /// Render `state`. Hidden instances are not computed.
    pub fn render(&mut self, state: &PipelineSnapshot) -> ChartFrame {
        let input = SeriesInput {
            asset_id: state.asset_id,
            timeframe: state.timeframe,
            candles: &state.candles,
            series_type: self.series_type,
            color_mode: self.color_mode,
        };
        let (snapshot, path) = series::derive(self.series.as_ref(), &input);
        self.series = Some(Arc::clone(&snapshot));

        let chronological: Vec<Candle> = state.candles.iter().rev().cloned().collect();
        let indicators: Vec<IndicatorFrame> = self
            .instances
            .iter()
            .filter(|i| i.visible)
            .filter_map(|instance| self.compute(instance, &chronological))
            .collect();

        debug!(
            ?path,
            points = snapshot.len(),
            indicators = indicators.len(),
            "chart frame rendered"
        );

        ChartFrame {
            asset_id: state.asset_id,
            timeframe: state.timeframe,
            series_type: self.series_type,
            series: snapshot.series_data(),
            volume: snapshot.volume_data(),
            has_valid_volume: snapshot.has_valid_volume(),
            indicators,
            has_more: state.has_more,
            error: state.error.clone(),
        }
    }

    fn compute(&self, instance: &IndicatorInstance, candles: &[Candle]) -> Option<IndicatorFrame> {
        let indicator = self.registry.get(&instance.indicator_id)?;
        let definition = indicator.definition();
        match self
            .registry
            .calculate(&instance.indicator_id, candles, &instance.config)
        {
            Ok(output) => Some(IndicatorFrame {
                instance_id: instance.instance_id,
                indicator_id: instance.indicator_id.clone(),
                name: definition.name,
                placement: definition.placement,
                reference_lines: indicator.reference_lines(&instance.config),
                output,
            }),
            Err(report) => {
                warn!(error = ?report, "indicator calculation failed");
                None
            }
        }
    }

    fn instance_mut(
        &mut self,
        instance_id: Uuid,
    ) -> Result<&mut IndicatorInstance, Report<IndicatorError>> {
        self.instances
            .iter_mut()
            .find(|i| i.instance_id == instance_id)
            .ok_or_else(|| unknown_instance(instance_id))
    }
}

fn unknown_instance(instance_id: Uuid) -> Report<IndicatorError> {
    Report::new(IndicatorError::UnknownInstance {
        instance_id: instance_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::{base_time, candle_at};
    use crate::pipeline::PipelineSettings;
    use crate::source::scripted::{ScriptedSource, Step, page};

    /// Three one-minute candles, closes 11, 12, 14, served newest-first.
    fn fixture() -> Vec<Candle> {
        [(0, 10.0, 11.0, 1000.0), (1, 11.0, 12.0, 1500.0), (2, 12.0, 14.0, 1600.0)]
            .into_iter()
            .rev()
            .map(|(minute, open, close, volume)| Candle {
                timestamp: base_time() + chrono::Duration::minutes(minute),
                open,
                high: close + 0.5,
                low: open - 0.5,
                close,
                volume,
                trade_count: None,
                vwap: None,
            })
            .collect()
    }

    async fn session(series_type: SeriesType) -> ChartSession {
        let source = Arc::new(ScriptedSource::new([Step::Page(page(fixture(), None))]));
        let pipeline = CandlePipeline::new(source, PipelineSettings::default());
        pipeline.load_initial(7, Timeframe::Min1).await;
        ChartSession::new(
            Arc::new(IndicatorRegistry::with_builtins()),
            pipeline,
            series_type,
            ColorMode::Directional,
        )
    }

    fn period(value: f64) -> HashMap<String, ParamValue> {
        HashMap::from([("period".to_owned(), ParamValue::Number(value))])
    }

    #[tokio::test]
    async fn ohlc_series_has_one_bar_per_candle() {
        let mut chart = session(SeriesType::Ohlc).await;
        let frame = chart.frame().await;

        assert_eq!(frame.series.len(), 3);
        for (point, candle) in frame.series.iter().zip(fixture().iter().rev()) {
            let SeriesPoint::Bar(bar) = point else {
                panic!("bar point expected");
            };
            assert_eq!(bar.time, candle.chart_time());
            assert_eq!(
                (bar.open, bar.high, bar.low, bar.close),
                (candle.open, candle.high, candle.low, candle.close)
            );
        }
        assert_eq!(frame.volume.len(), 3);
        assert!(frame.has_valid_volume);
        assert_eq!(frame.asset_id, Some(7));
    }

    #[tokio::test]
    async fn price_series_carries_close_only() {
        let mut chart = session(SeriesType::Price).await;
        let frame = chart.frame().await;
        let closes: Vec<_> = frame
            .series
            .iter()
            .map(|p| match p {
                SeriesPoint::Line(line) => line.value,
                other => panic!("line point expected, got {other:?}"),
            })
            .collect();
        assert_eq!(closes, vec![11.0, 12.0, 14.0]);
    }

    #[tokio::test]
    async fn switching_series_type_and_colors_rebuilds() {
        let mut chart = session(SeriesType::Ohlc).await;
        chart.frame().await;

        chart.set_series_type(SeriesType::Volume);
        chart.set_color_mode(ColorMode::Neutral);
        let frame = chart.frame().await;
        let volumes: Vec<_> = frame.series.iter().filter_map(SeriesPoint::value).collect();
        assert_eq!(volumes, vec![1000.0, 1500.0, 1600.0]);
        assert!(
            frame
                .volume
                .iter()
                .all(|bar| bar.color == series::VOLUME_NEUTRAL_COLOR)
        );
    }

    fn closes(frame: &ChartFrame) -> Vec<f64> {
        frame.series.iter().filter_map(SeriesPoint::value).collect()
    }

    #[tokio::test]
    async fn switching_asset_never_reuses_previous_series() {
        // same timestamps and an identical flat newest bar on both assets
        let first = vec![candle_at(2, 5.0, 0.0), candle_at(1, 10.0, 0.0), candle_at(0, 20.0, 0.0)];
        let second = vec![candle_at(2, 5.0, 0.0), candle_at(1, 99.0, 0.0), candle_at(0, 77.0, 0.0)];
        let source = Arc::new(ScriptedSource::new([
            Step::Page(page(first, None)),
            Step::Page(page(second, None)),
        ]));
        let pipeline = CandlePipeline::new(source, PipelineSettings::default());
        pipeline.load_initial(1, Timeframe::Min1).await;
        let mut chart = ChartSession::new(
            Arc::new(IndicatorRegistry::with_builtins()),
            pipeline,
            SeriesType::Price,
            ColorMode::Directional,
        );
        assert_eq!(closes(&chart.frame().await), vec![20.0, 10.0, 5.0]);

        chart.pipeline().switch_to(2, Timeframe::Min1).await;
        let frame = chart.frame().await;
        assert_eq!(frame.asset_id, Some(2));
        assert_eq!(closes(&frame), vec![77.0, 99.0, 5.0]);
    }

    #[tokio::test]
    async fn no_active_indicators_means_no_outputs() {
        let mut chart = session(SeriesType::Ohlc).await;
        assert!(chart.frame().await.indicators.is_empty());
    }

    #[tokio::test]
    async fn rsi_and_ema_draw_within_candle_count() {
        let mut chart = session(SeriesType::Ohlc).await;
        chart.add_indicator("rsi", period(2.0)).unwrap();
        chart.add_indicator("ema", period(2.0)).unwrap();

        let frame = chart.frame().await;
        assert_eq!(frame.indicators.len(), 2);
        for indicator in &frame.indicators {
            assert!(!indicator.output.is_empty(), "{} is empty", indicator.indicator_id);
            assert!(indicator.output.len() <= 3);
        }
        assert_eq!(frame.indicators[0].placement, Placement::Panel);
        assert_eq!(frame.indicators[0].reference_lines.len(), 3);
        assert!(frame.indicators[1].reference_lines.is_empty());
        assert_eq!(frame.indicators[1].placement, Placement::Overlay);
    }

    #[tokio::test]
    async fn default_periods_gate_to_empty_outputs() {
        let mut chart = session(SeriesType::Ohlc).await;
        chart.add_indicator("macd", HashMap::new()).unwrap();
        let frame = chart.frame().await;
        assert!(frame.indicators[0].output.is_empty());
    }

    #[tokio::test]
    async fn hidden_instances_are_skipped_and_editable() {
        let mut chart = session(SeriesType::Ohlc).await;
        let rsi = chart.add_indicator("rsi", period(2.0)).unwrap();
        let sma = chart.add_indicator("sma", period(2.0)).unwrap();

        chart.set_visible(rsi, false).unwrap();
        let frame = chart.frame().await;
        assert_eq!(frame.indicators.len(), 1);
        assert_eq!(frame.indicators[0].instance_id, sma);

        chart.update_config(sma, period(3.0)).unwrap();
        assert_eq!(chart.frame().await.indicators[0].output.len(), 1);
        assert_eq!(chart.required_candles(), 3);

        let removed = chart.remove_indicator(sma).unwrap();
        assert_eq!(removed.indicator_id, "sma");
        assert!(chart.frame().await.indicators.is_empty());
        assert_eq!(chart.instances().len(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_rejected() {
        let mut chart = session(SeriesType::Ohlc).await;
        assert!(chart.add_indicator("ichimoku", HashMap::new()).is_err());
        assert!(chart.set_visible(Uuid::new_v4(), false).is_err());
        assert!(chart.remove_indicator(Uuid::new_v4()).is_err());
        assert!(chart.update_config(Uuid::new_v4(), HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn frame_serializes_to_json() {
        let mut chart = session(SeriesType::Price).await;
        chart.add_indicator("macd", HashMap::new()).unwrap();
        let json = serde_json::to_value(chart.frame().await).unwrap();
        assert_eq!(json["timeframe"], 1);
        assert_eq!(json["series"][0]["value"], 11.0);
        assert_eq!(json["indicators"][0]["output"]["kind"], "multi_series");
    }
}
