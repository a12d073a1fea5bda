use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chart_feed::chart::{ChartFrame, ChartSession};
use chart_feed::config::{self, AppConfig};
use chart_feed::indicator::IndicatorRegistry;
use chart_feed::pipeline::refresh::AutoRefresh;
use chart_feed::pipeline::{CandlePipeline, LoadStatus};
use chart_feed::source::http::HttpCandleSource;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("candle source error")]
    Source,
    #[display("initial candle load failed")]
    InitialLoad,
    #[display("failed to write chart frame")]
    Output,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "chart-feed", about = "Candle chart feed with technical indicators")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "chart-feed.toml")]
    config: String,
    /// Print one chart frame as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let registry = Arc::new(IndicatorRegistry::with_builtins());
    let config = config::load(Path::new(&cli.config), &registry)
        .change_context(AppError::Config)?;

    init_tracing(&config);

    let timeframe = config
        .chart
        .timeframe()
        .ok_or_else(|| Report::new(AppError::Config))
        .attach_with(|| format!("chart.timeframe: {}", config.chart.timeframe))?;

    // ── Source and pipeline ───────────────────────────────────────────────────
    let source = HttpCandleSource::new(&config.source).change_context(AppError::Source)?;
    let pipeline = CandlePipeline::new(Arc::new(source), config.chart.pipeline_settings());

    // ── Chart session ─────────────────────────────────────────────────────────
    let mut session = ChartSession::new(
        Arc::clone(&registry),
        pipeline.clone(),
        config.chart.series_type,
        config.chart.color_mode,
    );
    for entry in &config.indicators {
        let instance_id = session
            .add_indicator(&entry.id, entry.params.clone())
            .change_context(AppError::Config)?;
        if !entry.visible {
            session
                .set_visible(instance_id, false)
                .change_context(AppError::Config)?;
        }
    }

    // ── Initial load and backfill ─────────────────────────────────────────────
    let asset_id = config.chart.asset_id;
    if pipeline.load_initial(asset_id, timeframe).await == LoadStatus::Failed {
        let reason = pipeline.snapshot().await.error.unwrap_or_default();
        return Err(Report::new(AppError::InitialLoad)
            .attach(format!("asset_id: {asset_id}, timeframe: {timeframe}"))
            .attach(reason));
    }
    backfill(&pipeline, &session, config.chart.history_pages).await;

    if cli.once {
        let frame = session.frame().await;
        let json = serde_json::to_string_pretty(&frame).change_context(AppError::Output)?;
        println!("{json}");
        return Ok(());
    }

    log_frame(&session.frame().await, None);
    if !config.chart.auto_refresh {
        return Ok(());
    }

    // ── Auto-refresh ──────────────────────────────────────────────────────────
    let period = Duration::from_secs(config.chart.refresh_interval_secs);
    let (refresh, mut ticks) = AutoRefresh::start(pipeline.clone(), period);
    info!(interval_secs = period.as_secs(), "auto-refresh started");

    loop {
        tokio::select! {
            status = ticks.recv() => {
                let Some(status) = status else { break };
                log_frame(&session.frame().await, Some(status));
            }
            signal = tokio::signal::ctrl_c() => {
                signal.change_context(AppError::Runtime)?;
                info!("ctrl+c received, shutting down");
                break;
            }
        }
    }

    refresh.stop().await;
    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Load older pages until `history_pages` are in and the widest visible
/// indicator has its lookback, or the source runs out.
async fn backfill(pipeline: &CandlePipeline, session: &ChartSession, history_pages: usize) {
    let required = session.required_candles();
    let pages = pipeline.backfill(history_pages, required).await;

    let loaded = pipeline.candles().await.len();
    if loaded < required {
        warn!(loaded, required, "history shorter than the widest indicator lookback");
    }
    info!(loaded, pages, "backfill complete");
}

fn log_frame(frame: &ChartFrame, status: Option<LoadStatus>) {
    info!(
        asset_id = ?frame.asset_id,
        timeframe = ?frame.timeframe,
        ?status,
        points = frame.series.len(),
        has_more = frame.has_more,
        "chart frame"
    );
    for indicator in &frame.indicators {
        let latest: Vec<String> = indicator
            .output
            .latest_values()
            .into_iter()
            .map(|(name, value)| format!("{name}={value:.4}"))
            .collect();
        info!(
            instance_id = %indicator.instance_id,
            indicator = %indicator.indicator_id,
            latest = %latest.join(" "),
            "indicator"
        );
    }
}
