use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::source::wire::{self, WirePage};
use crate::source::{CandlePage, CandleSource, PageRequest};

const SOURCE_NAME: &str = "candles_v3";

/// REST client for `GET /api/assets/{id}/candles_v3/`.
pub struct HttpCandleSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl HttpCandleSource {
    pub fn new(config: &SourceConfig) -> Result<Self, Report<SourceError>> {
        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            Report::new(SourceError::Request {
                source_name: SOURCE_NAME.into(),
            })
            .attach("requests_per_second must be > 0")
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .change_context(SourceError::Request {
                source_name: SOURCE_NAME.into(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    fn candles_url(&self, request: &PageRequest) -> String {
        format!("{}/api/assets/{}/candles_v3/", self.base_url, request.asset_id)
    }

    async fn get_page(&self, request: PageRequest) -> Result<CandlePage, Report<SourceError>> {
        // Wait for rate limiter before making the request
        self.rate_limiter.until_ready().await;

        let url = self.candles_url(&request);
        let response = self
            .client
            .get(&url)
            .query(&query_params(&request))
            .send()
            .await
            .change_context(SourceError::Request {
                source_name: SOURCE_NAME.into(),
            })
            .attach_with(|| format!("url: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Report::new(SourceError::Status {
                source_name: SOURCE_NAME.into(),
                status: status.as_u16(),
            })
            .attach(format!("url: {url}")));
        }

        let body: WirePage = response
            .json()
            .await
            .change_context(SourceError::ResponseParse {
                source_name: SOURCE_NAME.into(),
            })?;

        let page = wire::decode_page(body)?;
        debug!(
            asset_id = request.asset_id,
            timeframe = %request.timeframe,
            cursor = request.cursor.as_deref().unwrap_or("-"),
            fetched = page.candles.len(),
            has_next = page.has_next,
            "candle page fetched"
        );
        Ok(page)
    }
}

fn query_params(request: &PageRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("timeframe", request.timeframe.minutes().to_string()),
        ("limit", request.limit.to_string()),
        ("format", "compact".to_owned()),
    ];
    if let Some(cursor) = &request.cursor {
        params.push(("cursor", cursor.clone()));
    }
    params
}

impl CandleSource for HttpCandleSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, Result<CandlePage, Report<SourceError>>> {
        Box::pin(self.get_page(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Timeframe;

    fn config(base_url: &str) -> SourceConfig {
        SourceConfig {
            base_url: base_url.to_owned(),
            requests_per_second: 8,
            timeout_secs: 5,
        }
    }

    #[test]
    fn url_and_query_follow_endpoint_shape() {
        let source = HttpCandleSource::new(&config("http://localhost:8000/")).unwrap();
        let request = PageRequest::older(42, Timeframe::Hour1, 20_000, "c1".into());
        assert_eq!(
            source.candles_url(&request),
            "http://localhost:8000/api/assets/42/candles_v3/"
        );
        assert_eq!(
            query_params(&request),
            vec![
                ("timeframe", "60".to_owned()),
                ("limit", "5000".to_owned()),
                ("format", "compact".to_owned()),
                ("cursor", "c1".to_owned()),
            ]
        );
    }

    #[test]
    fn zero_rate_is_rejected() {
        let mut cfg = config("http://localhost:8000");
        cfg.requests_per_second = 0;
        assert!(HttpCandleSource::new(&cfg).is_err());
    }

    /// Integration test: requires a running data service. Run with
    /// `CHART_FEED_BASE_URL=... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_page() {
        let base_url =
            std::env::var("CHART_FEED_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".into());
        let source = HttpCandleSource::new(&config(&base_url)).unwrap();
        let page = source
            .fetch_page(PageRequest::latest(1, Timeframe::Min1, 10))
            .await
            .unwrap();
        assert!(page.candles.len() <= 10);
        for pair in page.candles.windows(2) {
            assert!(pair[0].timestamp > pair[1].timestamp);
        }
    }
}
