use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::pipeline::{CandlePipeline, LoadStatus};

/// Fixed-period `fetch_latest` timer.
///
/// Every tick's [`LoadStatus`] is offered on the returned channel; statuses
/// are dropped while the channel is full or closed. The timer stops only on
/// [`AutoRefresh::stop`] or on drop.
pub struct AutoRefresh {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AutoRefresh {
    pub fn start(pipeline: CandlePipeline, period: Duration) -> (Self, mpsc::Receiver<LoadStatus>) {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // skip immediate first tick

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("auto-refresh cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let status = pipeline.fetch_latest().await;
                        debug!(?status, "auto-refresh tick");
                        if let Err(TrySendError::Full(status)) = tx.try_send(status) {
                            debug!(?status, "auto-refresh status dropped, receiver lagging");
                        }
                    }
                }
            }
        });

        let refresh = Self {
            cancel,
            handle: Some(handle),
        };
        (refresh, rx)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the timer and wait for the task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
