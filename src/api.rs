use parking_lot::Mutex;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, LimitsConfig};
use crate::error::DashboardError;
use crate::metrics::Metrics;
use crate::models::{Company, CompanyDetail, CompanyDividend, DividendEvent, Envelope, Stats};
use crate::throttle::{wait_seconds, RequestThrottle};

/// Largest batch the recent-dividends endpoint will return.
pub const MAX_RECENT_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Status(u16),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limit exceeded. Please wait {wait_secs} seconds.")]
    RateLimited { wait_secs: u64 },
}

/// Client for the DivScout JSON API. Every call passes through the
/// request throttle first.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    throttle: Mutex<RequestThrottle>,
    metrics: Arc<Metrics>,
}

impl ApiClient {
    pub fn new(
        api: &ApiConfig,
        limits: &LimitsConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self, DashboardError> {
        let throttle = RequestThrottle::new(limits.max_requests, Duration::from_millis(limits.window_ms))?;
        info!(
            "Request throttle: {} requests per {:?}",
            throttle.max_requests(),
            throttle.window()
        );

        let base_url = Url::parse(&api.base_url)
            .map_err(|e| DashboardError::Config(format!("invalid api.base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DashboardError::Config(format!(
                "api.base_url cannot be a base: {}",
                api.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(api.timeout_ms))
            .build()
            .map_err(ApiError::Http)?;

        Ok(Self {
            client,
            base_url,
            throttle: Mutex::new(throttle),
            metrics,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked at construction
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn admit(&self, what: &str) -> Result<(), ApiError> {
        // Read the clock under the lock so admissions are recorded in order
        let mut throttle = self.throttle.lock();
        let now = Instant::now();
        if throttle.try_admit(now) {
            return Ok(());
        }

        let wait_secs = wait_seconds(throttle.time_until_next_slot(now));
        drop(throttle);

        self.metrics.inc_throttle_denials();
        warn!("Throttled request to {}, next slot in {}s", what, wait_secs);
        Err(ApiError::RateLimited { wait_secs })
    }

    async fn get<R: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<R, ApiError> {
        let url = self.endpoint(segments);
        self.admit(url.path())?;
        self.metrics.inc_upstream_requests();

        let result = self.fetch(url.clone(), query).await;
        match &result {
            Ok(_) => debug!("Fetched {}", url.path()),
            Err(ApiError::NotFound(_)) => {}
            Err(e) => {
                self.metrics.inc_upstream_failures();
                warn!("API call to {} failed: {}", url.path(), e);
            }
        }
        result
    }

    async fn fetch<R: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<R, ApiError> {
        let path = url.path().to_string();
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path));
        }
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let envelope = response.json::<Envelope<R>>().await?;
        if !envelope.success {
            return Err(ApiError::Upstream(
                envelope
                    .error
                    .unwrap_or_else(|| "Unknown error occurred".into()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| ApiError::InvalidResponse("Missing data".into()))
    }

    pub async fn stats(&self) -> Result<Stats, ApiError> {
        self.get(&["stats"], &[]).await
    }

    pub async fn companies(&self) -> Result<Vec<Company>, ApiError> {
        self.get(&["companies"], &[]).await
    }

    pub async fn company(&self, ticker: &str) -> Result<CompanyDetail, ApiError> {
        self.get(&["companies", ticker], &[]).await
    }

    pub async fn company_dividends(&self, ticker: &str) -> Result<Vec<CompanyDividend>, ApiError> {
        self.get(&["companies", ticker, "dividends"], &[]).await
    }

    pub async fn recent_dividends(&self, limit: usize) -> Result<Vec<DividendEvent>, ApiError> {
        let limit = limit.min(MAX_RECENT_LIMIT);
        self.get(&["dividends", "recent"], &[("limit", limit.to_string())])
            .await
    }

    pub async fn calendar(
        &self,
        start_date: chrono::NaiveDate,
        end_date: chrono::NaiveDate,
    ) -> Result<Vec<DividendEvent>, ApiError> {
        self.get(
            &["dividends", "calendar"],
            &[
                ("start_date", start_date.to_string()),
                ("end_date", end_date.to_string()),
            ],
        )
        .await
    }

    pub fn remaining_requests(&self) -> u32 {
        self.throttle.lock().remaining(Instant::now())
    }
}
