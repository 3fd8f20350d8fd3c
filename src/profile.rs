use chrono::NaiveDate;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};
use crate::error::DashboardError;
use crate::format::{format_currency, format_date};
use crate::metrics::Metrics;
use crate::models::{CompanyDetail, CompanyDividend};

#[derive(Debug, Clone, Serialize)]
pub struct CompanyProfile {
    pub company: CompanyDetail,
    pub total_dividends: usize,
    pub average_amount: f64,
    pub average_amount_display: String,
    pub last_payment_date: Option<NaiveDate>,
    pub last_payment_display: String,
    pub history: Vec<CompanyDividend>,
    pub truncated: bool,
}

impl CompanyProfile {
    /// `dividends` is expected newest first, as the API returns them.
    pub fn build(company: CompanyDetail, dividends: Vec<CompanyDividend>, history_rows: usize) -> Self {
        let total_dividends = dividends.len();
        let total_amount: f64 = dividends.iter().filter_map(|d| d.amount).sum();
        let average_amount = if total_dividends > 0 {
            total_amount / total_dividends as f64
        } else {
            0.0
        };
        let last_payment_date = dividends.first().and_then(|d| d.payment_date);

        let mut history = dividends;
        history.truncate(history_rows);

        Self {
            company,
            total_dividends,
            average_amount,
            average_amount_display: format_currency(Some(average_amount)),
            last_payment_date,
            last_payment_display: match last_payment_date {
                Some(_) => format_date(last_payment_date),
                None => "N/A".to_string(),
            },
            truncated: total_dividends > history.len(),
            history,
        }
    }
}

#[derive(Clone)]
struct CachedProfile {
    profile: CompanyProfile,
    cached_at: Instant,
}

/// Company profiles keyed by upper-cased ticker, each kept for a fixed TTL.
pub struct ProfileStore {
    client: Arc<ApiClient>,
    metrics: Arc<Metrics>,
    entries: DashMap<String, CachedProfile>,
    ttl: Duration,
    history_rows: usize,
}

impl ProfileStore {
    pub fn new(client: Arc<ApiClient>, metrics: Arc<Metrics>, ttl: Duration, history_rows: usize) -> Self {
        Self {
            client,
            metrics,
            entries: DashMap::new(),
            ttl,
            history_rows,
        }
    }

    pub async fn get(&self, ticker: &str) -> Result<CompanyProfile, DashboardError> {
        let key = ticker.to_uppercase();

        if let Some(cached) = self.cached(&key) {
            self.metrics.inc_profile_cache_hits();
            debug!("Profile cache hit for {}", key);
            return Ok(cached);
        }

        let company = match self.client.company(&key).await {
            Ok(c) => c,
            Err(ApiError::NotFound(_)) => {
                return Err(DashboardError::NotFound(format!("Company not found: {}", key)))
            }
            Err(e) => return Err(e.into()),
        };

        let dividends = match self.client.company_dividends(&key).await {
            Ok(d) => d,
            // Upstream reports a missing history as a failed envelope
            Err(ApiError::Upstream(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let profile = CompanyProfile::build(company, dividends, self.history_rows);
        if !self.ttl.is_zero() {
            self.entries.insert(
                key,
                CachedProfile {
                    profile: profile.clone(),
                    cached_at: Instant::now(),
                },
            );
        }
        Ok(profile)
    }

    fn cached(&self, key: &str) -> Option<CompanyProfile> {
        let entry = self.entries.get(key)?;
        if entry.cached_at.elapsed() < self.ttl {
            Some(entry.profile.clone())
        } else {
            None
        }
    }

    pub fn cleanup_expired(&self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            info!("Evicted {} expired company profiles", removed);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
