use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::api::ApiClient;
use crate::error::DashboardError;
use crate::format::DividendRow;
use crate::models::DividendEvent;
use crate::page::{PageWindow, PaginationSummary};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentPage {
    pub rows: Vec<DividendRow>,
    pub pagination: PaginationSummary,
    pub page_size: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

struct RecentState {
    window: PageWindow<DividendEvent>,
    loaded: bool,
}

/// The recent-dividends table: one fetched batch, paged locally.
pub struct RecentDividends {
    client: Arc<ApiClient>,
    fetch_limit: usize,
    state: Mutex<RecentState>,
}

impl RecentDividends {
    pub fn new(client: Arc<ApiClient>, page_size: usize, fetch_limit: usize) -> Result<Self, DashboardError> {
        Ok(Self {
            client,
            fetch_limit,
            state: Mutex::new(RecentState {
                window: PageWindow::new(page_size)?,
                loaded: false,
            }),
        })
    }

    /// Serves the requested page. A new page size or an explicit refresh
    /// re-fetches the batch; plain page changes never do. A failed fetch
    /// leaves the current window untouched.
    pub async fn view(&self, query: RecentQuery) -> Result<RecentPage, DashboardError> {
        if query.limit == Some(0) {
            return Err(DashboardError::BadRequest("limit must be positive".into()));
        }

        let (needs_fetch, resize) = {
            let state = self.state.lock();
            let resize = query
                .limit
                .filter(|&l| l != state.window.page_size());
            (query.refresh || !state.loaded || resize.is_some(), resize)
        };

        let fetched = if needs_fetch {
            let rows = self.client.recent_dividends(self.fetch_limit).await?;
            info!("Loaded {} recent dividends", rows.len());
            Some(rows)
        } else {
            None
        };

        let mut state = self.state.lock();
        if let Some(page_size) = resize {
            state.window.set_page_size(page_size)?;
        }
        if let Some(rows) = fetched {
            state.window.load(rows);
            state.loaded = true;
        }

        let page = match (resize, query.page) {
            (Some(_), _) => 1,
            (None, Some(p)) => p,
            (None, None) => state.window.page_index(),
        };
        let rows = state
            .window
            .go_to_page(page)
            .iter()
            .cloned()
            .map(DividendRow::from)
            .collect();

        Ok(RecentPage {
            rows,
            pagination: state.window.summary(),
            page_size: state.window.page_size(),
            has_previous: state.window.has_previous(),
            has_next: state.window.has_next(),
        })
    }
}
