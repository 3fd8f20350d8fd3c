use anyhow::Result;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::ApiClient;
use crate::calendar::{group_by_ex_date, CalendarDay, CalendarRange};
use crate::config::{Config, DashboardConfig};
use crate::dashboard::{RecentDividends, RecentPage, RecentQuery};
use crate::directory::{facets, filter_companies, CompanyDirectory, CompanyFilter};
use crate::error::DashboardError;
use crate::metrics::Metrics;
use crate::models::{Company, Envelope, Stats};
use crate::profile::{CompanyProfile, ProfileStore};

type ApiResult<T> = Result<Json<Envelope<T>>, DashboardError>;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ApiClient>,
    pub directory: Arc<CompanyDirectory>,
    pub recent: Arc<RecentDividends>,
    pub profiles: Arc<ProfileStore>,
    pub metrics: Arc<Metrics>,
    pub dashboard: Arc<DashboardConfig>,
}

impl AppState {
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Result<Self, DashboardError> {
        let dashboard = &config.dashboard;
        let client = Arc::new(ApiClient::new(&config.api, &config.limits, metrics.clone())?);

        let directory = Arc::new(CompanyDirectory::new(
            client.clone(),
            metrics.clone(),
            Duration::from_millis(dashboard.directory_refresh_interval_ms),
            dashboard.search_results,
        ));
        let recent = Arc::new(RecentDividends::new(
            client.clone(),
            dashboard.page_size,
            dashboard.recent_fetch_limit,
        )?);
        let profiles = Arc::new(ProfileStore::new(
            client.clone(),
            metrics.clone(),
            Duration::from_millis(dashboard.profile_cache_ttl_ms),
            dashboard.history_rows,
        ));

        Ok(Self {
            client,
            directory,
            recent,
            profiles,
            metrics,
            dashboard: Arc::new(dashboard.clone()),
        })
    }
}

#[derive(Debug, Serialize)]
struct CompaniesView {
    companies: Vec<Company>,
    sectors: Vec<String>,
    industries: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CalendarView {
    #[serde(flatten)]
    range: CalendarRange,
    total: usize,
    days: Vec<CalendarDay>,
}

#[derive(Debug, Serialize)]
struct StatusView {
    remaining_requests: u32,
    directory_size: usize,
    cached_profiles: usize,
}

#[derive(Debug, Deserialize)]
struct CalendarQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(status_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/dividends/recent", get(recent_handler))
        .route("/api/companies", get(companies_handler))
        .route("/api/companies/:ticker", get(profile_handler))
        .route("/api/calendar", get(calendar_handler))
        .route("/api/search", get(search_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
        )
        .with_state(state)
}

pub async fn run(config: Config, state: AppState) -> Result<()> {
    let app = router(state);

    let addr: SocketAddr = config.server.bind_addr.parse()?;
    info!("Dashboard listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn status_handler(State(state): State<AppState>) -> Json<Envelope<StatusView>> {
    Json(Envelope::ok(StatusView {
        remaining_requests: state.client.remaining_requests(),
        directory_size: state.directory.snapshot().len(),
        cached_profiles: state.profiles.len(),
    }))
}

async fn stats_handler(State(state): State<AppState>) -> ApiResult<Stats> {
    state.metrics.inc_page_views();
    let stats = state.client.stats().await?;
    Ok(Json(Envelope::ok(stats)))
}

async fn recent_handler(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<RecentPage> {
    let Query(query) = query?;
    state.metrics.inc_page_views();
    let page = state.recent.view(query).await?;
    let count = page.rows.len();
    Ok(Json(Envelope::ok(page).with_count(count)))
}

async fn companies_handler(
    State(state): State<AppState>,
    filter: Result<Query<CompanyFilter>, QueryRejection>,
) -> ApiResult<CompaniesView> {
    let Query(filter) = filter?;
    state.metrics.inc_page_views();
    let all = state.directory.ensure_loaded().await?;
    let facets = facets(&all);
    let companies = filter_companies(&all, &filter);
    let count = companies.len();

    Ok(Json(
        Envelope::ok(CompaniesView {
            companies,
            sectors: facets.sectors,
            industries: facets.industries,
        })
        .with_count(count),
    ))
}

async fn profile_handler(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> ApiResult<CompanyProfile> {
    state.metrics.inc_page_views();
    let profile = state.profiles.get(&ticker).await?;
    Ok(Json(Envelope::ok(profile)))
}

async fn calendar_handler(
    State(state): State<AppState>,
    query: Result<Query<CalendarQuery>, QueryRejection>,
) -> ApiResult<CalendarView> {
    let Query(query) = query?;
    state.metrics.inc_page_views();
    let default = CalendarRange::around(
        Local::now().date_naive(),
        state.dashboard.calendar_lookback_days,
        state.dashboard.calendar_lookahead_days,
    );
    let range = CalendarRange::resolve(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        default,
    )?;

    let rows = state.client.calendar(range.start_date, range.end_date).await?;
    let total = rows.len();
    Ok(Json(Envelope::ok(CalendarView {
        range,
        total,
        days: group_by_ex_date(rows),
    })))
}

async fn search_handler(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Vec<Company>> {
    let Query(query) = query?;
    state.metrics.inc_search_queries();
    let results = state.directory.search(&query.q);
    let count = results.len();
    Ok(Json(Envelope::ok(results).with_count(count)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
