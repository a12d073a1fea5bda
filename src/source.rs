pub mod http;
pub mod wire;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::SourceError;
use crate::model::{AssetId, Candle, Timeframe};

/// Largest page the data source serves in one response.
pub const MAX_PAGE_LIMIT: usize = 5000;

/// One cursor-paginated candle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub asset_id: AssetId,
    pub timeframe: Timeframe,
    pub limit: usize,
    /// Opaque continuation token from the previous page; `None` asks for the
    /// most recent candles.
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn latest(asset_id: AssetId, timeframe: Timeframe, limit: usize) -> Self {
        Self {
            asset_id,
            timeframe,
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            cursor: None,
        }
    }

    pub fn older(asset_id: AssetId, timeframe: Timeframe, limit: usize, cursor: String) -> Self {
        Self {
            cursor: Some(cursor),
            ..Self::latest(asset_id, timeframe, limit)
        }
    }
}

/// Decoded page, candles newest-first as served.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandlePage {
    pub candles: Vec<Candle>,
    pub next_cursor: Option<String>,
    pub has_next: bool,
}

/// External collaborator that serves candle pages.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn CandleSource`).
pub trait CandleSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, Result<CandlePage, Report<SourceError>>>;
}
