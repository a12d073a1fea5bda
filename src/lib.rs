//! Candle ingestion, chart-ready series and technical indicators for one
//! asset chart.

pub mod chart;
pub mod config;
pub mod error;
pub mod indicator;
pub mod math;
pub mod model;
pub mod pipeline;
pub mod series;
pub mod source;

pub use chart::{ChartFrame, ChartSession};
pub use indicator::{Indicator, IndicatorOutput, IndicatorRegistry};
pub use model::{Candle, Timeframe};
pub use pipeline::{CandlePipeline, LoadStatus};
