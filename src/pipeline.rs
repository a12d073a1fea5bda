//! Candle ingestion: initial load, cursor backfill and latest-window merge
//! over one [`CandleSource`].
//!
//! Fetch failures never escape as errors. Each operation returns a
//! [`LoadStatus`] and applies its state transition: an initial-load failure
//! surfaces through [`PipelineSnapshot::error`], a backfill failure stops
//! pagination and a refresh failure is ignored until the next tick.

pub mod refresh;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::model::{AssetId, Candle, Timeframe};
use crate::source::{CandleSource, PageRequest};

/// Appends above this size yield to the scheduler before being applied.
const LARGE_APPEND: usize = 500;

/// Outcome of one pipeline operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    /// Applied; `count` candles were added or updated.
    Loaded { count: usize },
    /// Preconditions not met, nothing was fetched.
    Skipped,
    /// A newer initial load reset the state while this fetch was in flight;
    /// its result was discarded.
    Superseded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub initial_limit: usize,
    pub history_limit: usize,
    pub latest_limit: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            initial_limit: 1000,
            history_limit: 1000,
            latest_limit: 10,
        }
    }
}

#[derive(Debug)]
struct PipelineState {
    asset_id: Option<AssetId>,
    timeframe: Option<Timeframe>,
    /// Newest-first, timestamps unique.
    candles: Arc<Vec<Candle>>,
    next_cursor: Option<String>,
    has_more: bool,
    loading_initial: bool,
    loading_more: bool,
    error: Option<String>,
    /// Bumped by every reset; in-flight results from an older generation are
    /// dropped on arrival.
    generation: u64,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            asset_id: None,
            timeframe: None,
            candles: Arc::default(),
            next_cursor: None,
            has_more: true,
            loading_initial: false,
            loading_more: false,
            error: None,
            generation: 0,
        }
    }
}

impl PipelineState {
    fn target(&self) -> Option<(AssetId, Timeframe)> {
        Some((self.asset_id?, self.timeframe?))
    }
}

/// Point-in-time copy of the pipeline state. The candle list is shared, not
/// copied.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub asset_id: Option<AssetId>,
    pub timeframe: Option<Timeframe>,
    /// Newest-first.
    pub candles: Arc<Vec<Candle>>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub loading_initial: bool,
    pub loading_more: bool,
    pub error: Option<String>,
}

/// Candle set of one chart. Clones share the same state.
#[derive(Clone)]
pub struct CandlePipeline {
    source: Arc<dyn CandleSource>,
    settings: PipelineSettings,
    state: Arc<Mutex<PipelineState>>,
}

impl CandlePipeline {
    pub fn new(source: Arc<dyn CandleSource>, settings: PipelineSettings) -> Self {
        Self {
            source,
            settings,
            state: Arc::default(),
        }
    }

    pub async fn snapshot(&self) -> PipelineSnapshot {
        let state = self.state.lock().await;
        PipelineSnapshot {
            asset_id: state.asset_id,
            timeframe: state.timeframe,
            candles: Arc::clone(&state.candles),
            next_cursor: state.next_cursor.clone(),
            has_more: state.has_more,
            loading_initial: state.loading_initial,
            loading_more: state.loading_more,
            error: state.error.clone(),
        }
    }

    /// Current candles, newest-first.
    pub async fn candles(&self) -> Arc<Vec<Candle>> {
        Arc::clone(&self.state.lock().await.candles)
    }

    /// Switch to another asset or timeframe: clear everything, then load.
    pub async fn switch_to(&self, asset_id: AssetId, timeframe: Timeframe) -> LoadStatus {
        info!(asset_id, timeframe = %timeframe, "switching chart target");
        self.load_initial(asset_id, timeframe).await
    }

    /// Replace the candle set with a fresh page of the most recent candles.
    ///
    /// State is reset before the fetch is awaited, so any in-flight backfill
    /// or refresh result is discarded when it arrives.
    pub async fn load_initial(&self, asset_id: AssetId, timeframe: Timeframe) -> LoadStatus {
        let generation = {
            let mut state = self.state.lock().await;
            let generation = state.generation + 1;
            *state = PipelineState {
                asset_id: Some(asset_id),
                timeframe: Some(timeframe),
                loading_initial: true,
                generation,
                ..PipelineState::default()
            };
            generation
        };

        let request = PageRequest::latest(asset_id, timeframe, self.settings.initial_limit);
        let result = self.source.fetch_page(request).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(asset_id, timeframe = %timeframe, "initial load superseded");
            return LoadStatus::Superseded;
        }
        state.loading_initial = false;

        match result {
            Ok(page) => {
                let mut seen = HashSet::with_capacity(page.candles.len());
                let candles: Vec<Candle> = page
                    .candles
                    .into_iter()
                    .filter(|c| seen.insert(c.timestamp))
                    .collect();
                let count = candles.len();
                state.candles = Arc::new(candles);
                state.next_cursor = page.next_cursor;
                state.has_more = page.has_next;
                info!(
                    asset_id,
                    timeframe = %timeframe,
                    fetched = count,
                    has_more = state.has_more,
                    source = self.source.name(),
                    "initial candles loaded"
                );
                LoadStatus::Loaded { count }
            }
            Err(report) => {
                warn!(
                    asset_id,
                    timeframe = %timeframe,
                    error = ?report,
                    "initial candle load failed"
                );
                state.error = Some(report.current_context().to_string());
                LoadStatus::Failed
            }
        }
    }

    /// Fetch the page older than the stored cursor and append it.
    ///
    /// No-op while another load is in flight, once the source reported no
    /// more history, or before a cursor exists. Failure ends pagination.
    pub async fn load_more_historical_data(&self) -> LoadStatus {
        let (request, generation) = {
            let mut state = self.state.lock().await;
            if state.loading_more || state.loading_initial || !state.has_more {
                return LoadStatus::Skipped;
            }
            let (Some((asset_id, timeframe)), Some(cursor)) =
                (state.target(), state.next_cursor.clone())
            else {
                return LoadStatus::Skipped;
            };
            state.loading_more = true;
            let request =
                PageRequest::older(asset_id, timeframe, self.settings.history_limit, cursor);
            (request, state.generation)
        };

        let asset_id = request.asset_id;
        let timeframe = request.timeframe;
        let result = self.source.fetch_page(request).await;

        if let Ok(page) = &result
            && page.candles.len() > LARGE_APPEND
        {
            tokio::task::yield_now().await;
        }

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(asset_id, timeframe = %timeframe, "history page superseded");
            return LoadStatus::Superseded;
        }
        state.loading_more = false;

        match result {
            Ok(page) => {
                let mut seen: HashSet<_> = state.candles.iter().map(|c| c.timestamp).collect();
                let fetched = page.candles.len();
                let older: Vec<Candle> = page
                    .candles
                    .into_iter()
                    .filter(|c| seen.insert(c.timestamp))
                    .collect();
                let appended = older.len();
                Arc::make_mut(&mut state.candles).extend(older);
                state.next_cursor = page.next_cursor;
                state.has_more = page.has_next;
                debug!(
                    asset_id,
                    timeframe = %timeframe,
                    fetched,
                    appended,
                    total = state.candles.len(),
                    has_more = state.has_more,
                    "history page appended"
                );
                LoadStatus::Loaded { count: appended }
            }
            Err(report) => {
                warn!(
                    asset_id,
                    timeframe = %timeframe,
                    error = ?report,
                    "history page failed, pagination stopped"
                );
                state.has_more = false;
                LoadStatus::Failed
            }
        }
    }

    /// Page back through history until at least `min_pages` pages and
    /// `min_candles` candles are loaded, or the source has nothing older.
    /// Returns the number of pages loaded.
    pub async fn backfill(&self, min_pages: usize, min_candles: usize) -> usize {
        let mut pages = 0;
        loop {
            let (loaded, has_more) = {
                let state = self.state.lock().await;
                (state.candles.len(), state.has_more)
            };
            if !has_more || (pages >= min_pages && loaded >= min_candles) {
                break;
            }

            match self.load_more_historical_data().await {
                // a page of pure overlap still advances the cursor
                LoadStatus::Loaded { .. } => pages += 1,
                status => {
                    debug!(?status, pages, "backfill stopped");
                    break;
                }
            }
        }
        pages
    }

    /// Merge the most recent candles into the set by timestamp.
    ///
    /// Existing candles are overwritten in place; the set is re-sorted only
    /// when a timestamp not seen before was inserted.
    pub async fn fetch_latest(&self) -> LoadStatus {
        let (request, generation) = {
            let state = self.state.lock().await;
            let Some((asset_id, timeframe)) = state.target() else {
                return LoadStatus::Skipped;
            };
            let request = PageRequest::latest(asset_id, timeframe, self.settings.latest_limit);
            (request, state.generation)
        };

        let asset_id = request.asset_id;
        let timeframe = request.timeframe;
        let result = self.source.fetch_page(request).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            return LoadStatus::Superseded;
        }

        let page = match result {
            Ok(page) => page,
            Err(report) => {
                warn!(
                    asset_id,
                    timeframe = %timeframe,
                    error = ?report,
                    "latest candle refresh failed"
                );
                return LoadStatus::Failed;
            }
        };

        let (inserted, updated) = merge_latest(Arc::make_mut(&mut state.candles), page.candles);
        debug!(
            asset_id,
            timeframe = %timeframe,
            inserted,
            updated,
            total = state.candles.len(),
            "latest candles merged"
        );
        LoadStatus::Loaded {
            count: inserted + updated,
        }
    }
}

/// Merge `latest` into newest-first `candles`; returns `(inserted, updated)`.
fn merge_latest(candles: &mut Vec<Candle>, latest: Vec<Candle>) -> (usize, usize) {
    let mut index: HashMap<_, usize> = candles
        .iter()
        .enumerate()
        .map(|(i, c)| (c.timestamp, i))
        .collect();

    let mut inserted = 0;
    let mut updated = 0;
    for candle in latest {
        match index.get(&candle.timestamp) {
            Some(&i) => {
                if candles[i] != candle {
                    candles[i] = candle;
                    updated += 1;
                }
            }
            None => {
                index.insert(candle.timestamp, candles.len());
                candles.push(candle);
                inserted += 1;
            }
        }
    }

    // Timestamps are immutable keys, so value updates cannot reorder the set.
    if inserted > 0 {
        candles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
    (inserted, updated)
}
