use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::metrics::Metrics;
use crate::models::Company;

/// Criteria for the companies view. Empty strings mean "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyFilter {
    pub search: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub sectors: Vec<String>,
    pub industries: Vec<String>,
}

/// Cached list of active companies shared by search and the companies view.
pub struct CompanyDirectory {
    client: Arc<ApiClient>,
    metrics: Arc<Metrics>,
    refresh_interval: Duration,
    search_limit: usize,
    sender: watch::Sender<Arc<Vec<Company>>>,
}

impl CompanyDirectory {
    pub fn new(
        client: Arc<ApiClient>,
        metrics: Arc<Metrics>,
        refresh_interval: Duration,
        search_limit: usize,
    ) -> Self {
        let (sender, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            client,
            metrics,
            refresh_interval,
            search_limit,
            sender,
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Company>> {
        self.sender.borrow().clone()
    }

    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let companies = self.client.companies().await?;
        let count = companies.len();
        self.sender.send_replace(Arc::new(companies));
        self.metrics.inc_directory_refreshes();
        info!("Company directory loaded: {} companies", count);
        Ok(count)
    }

    /// Returns the current snapshot, fetching it first if nothing has
    /// been loaded yet.
    pub async fn ensure_loaded(&self) -> Result<Arc<Vec<Company>>, ApiError> {
        let current = self.snapshot();
        if !current.is_empty() {
            return Ok(current);
        }
        self.refresh().await?;
        Ok(self.snapshot())
    }

    pub fn search(&self, query: &str) -> Vec<Company> {
        search_companies(&self.snapshot(), query, self.search_limit)
    }

    pub async fn run(self: Arc<Self>) {
        info!("Company directory refresher starting");

        let mut ticker = interval(self.refresh_interval);
        let mut loaded = false;

        loop {
            ticker.tick().await;
            match self.refresh().await {
                Ok(_) => loaded = true,
                Err(e) if !loaded => error!("Initial company directory load failed: {}", e),
                Err(e) => warn!("Company directory refresh failed, keeping previous list: {}", e),
            }
        }
    }
}

fn matches_term(company: &Company, lower_term: &str) -> bool {
    company.ticker.to_lowercase().contains(lower_term)
        || company.company_name.to_lowercase().contains(lower_term)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub fn search_companies(companies: &[Company], query: &str, limit: usize) -> Vec<Company> {
    if query.is_empty() {
        return Vec::new();
    }

    let lower = query.to_lowercase();
    companies
        .iter()
        .filter(|c| matches_term(c, &lower))
        .take(limit)
        .cloned()
        .collect()
}

pub fn filter_companies(companies: &[Company], filter: &CompanyFilter) -> Vec<Company> {
    let term = non_empty(&filter.search).map(str::to_lowercase);
    let sector = non_empty(&filter.sector);
    let industry = non_empty(&filter.industry);

    companies
        .iter()
        .filter(|c| term.as_deref().map_or(true, |t| matches_term(c, t)))
        .filter(|c| sector.map_or(true, |s| c.sector.as_deref() == Some(s)))
        .filter(|c| industry.map_or(true, |i| c.industry.as_deref() == Some(i)))
        .cloned()
        .collect()
}

pub fn facets(companies: &[Company]) -> Facets {
    Facets {
        sectors: distinct(companies.iter().filter_map(|c| c.sector.as_ref())),
        industries: distinct(companies.iter().filter_map(|c| c.industry.as_ref())),
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
