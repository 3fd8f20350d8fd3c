//! In-process stand-in for the upstream DivScout API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::{ApiConfig, Config, DashboardConfig, LimitsConfig, MetricsConfig, ServerConfig};
use crate::models::{Company, DividendEvent};

pub const RECENT_ROWS: usize = 45;
pub const AAPL_HISTORY_ROWS: usize = 25;

#[derive(Clone, Default)]
pub struct Upstream {
    hits: Arc<AtomicUsize>,
    recent_limit: Arc<Mutex<Option<usize>>>,
    calendar_range: Arc<Mutex<Option<(String, String)>>>,
}

impl Upstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_recent_limit(&self) -> Option<usize> {
        *self.recent_limit.lock()
    }

    pub fn last_calendar_range(&self) -> Option<(String, String)> {
        self.calendar_range.lock().clone()
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/stats", get(stats))
            .route("/api/companies", get(companies))
            .route("/api/companies/:ticker", get(company))
            .route("/api/companies/:ticker/dividends", get(company_dividends))
            .route("/api/dividends/recent", get(recent))
            .route("/api/dividends/calendar", get(calendar))
            .with_state(self.clone())
    }
}

pub fn stub_upstream() -> Upstream {
    Upstream::default()
}

pub async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/api", addr)
}

pub fn test_config(base_url: &str) -> Config {
    Config {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".into(),
        },
        api: ApiConfig {
            base_url: base_url.into(),
            timeout_ms: 5_000,
        },
        limits: LimitsConfig::default(),
        dashboard: DashboardConfig::default(),
        metrics: MetricsConfig {
            enable: false,
            bind_addr: "127.0.0.1:0".into(),
            path: "/metrics".into(),
        },
    }
}

pub fn sample_companies() -> Vec<Company> {
    let company = |id, ticker: &str, name: &str, sector: Option<&str>, industry: Option<&str>| Company {
        company_id: id,
        ticker: ticker.into(),
        company_name: name.into(),
        sector: sector.map(Into::into),
        industry: industry.map(Into::into),
        is_active: true,
    };

    vec![
        company(1, "AAPL", "Apple Inc.", Some("Technology"), Some("Consumer Electronics")),
        company(2, "KO", "Coca-Cola Co", Some("Consumer Staples"), Some("Beverages")),
        company(3, "O", "Realty Income Corp", Some("Real Estate"), None),
    ]
}

/// Newest first, ex-dividend dates one day apart ending 2024-03-31.
pub fn sample_recent() -> Vec<DividendEvent> {
    let tickers = [("AAPL", "Apple Inc."), ("KO", "Coca-Cola Co"), ("O", "Realty Income Corp")];
    let frequencies = ["quarterly", "monthly", "annual", "special"];
    let last = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();

    (0..RECENT_ROWS)
        .map(|i| {
            let (ticker, name) = tickers[i % tickers.len()];
            let ex = last - Duration::days(i as i64);
            DividendEvent {
                ticker: ticker.into(),
                company_name: name.into(),
                ex_dividend_date: Some(ex),
                payment_date: Some(ex + Duration::days(14)),
                amount: Some(0.25 + i as f64 * 0.01),
                frequency: Some(frequencies[i % frequencies.len()].into()),
                dividend_type: Some("cash".into()),
            }
        })
        .collect()
}

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

fn fail(status: StatusCode, error: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "success": false, "error": error })))
}

async fn stats(State(up): State<Upstream>) -> Json<Value> {
    up.hit();
    ok(json!({
        "total_companies": 3,
        "total_dividends": RECENT_ROWS,
        "companies_with_dividends": 3,
    }))
}

async fn companies(State(up): State<Upstream>) -> Json<Value> {
    up.hit();
    ok(serde_json::to_value(sample_companies()).unwrap())
}

async fn company(State(up): State<Upstream>, Path(ticker): Path<String>) -> (StatusCode, Json<Value>) {
    up.hit();
    let ticker = ticker.to_uppercase();
    if ticker == "FAIL" {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve company");
    }
    // Delisted: detail still served, dividends route answers 404
    if ticker == "GONE" {
        return (
            StatusCode::OK,
            ok(json!({
                "company_id": 99,
                "ticker": "GONE",
                "company_name": "Gone Holdings",
                "is_active": false,
            })),
        );
    }

    match sample_companies().into_iter().find(|c| c.ticker == ticker) {
        Some(c) => {
            let cik = (c.ticker == "AAPL").then_some("0000320193");
            (
                StatusCode::OK,
                ok(json!({
                    "company_id": c.company_id,
                    "ticker": c.ticker,
                    "company_name": c.company_name,
                    "cik": cik,
                    "sector": c.sector,
                    "industry": c.industry,
                    "market_cap_category": "large",
                    "is_active": true,
                })),
            )
        }
        None => fail(StatusCode::NOT_FOUND, "Company not found"),
    }
}

async fn company_dividends(
    State(up): State<Upstream>,
    Path(ticker): Path<String>,
) -> (StatusCode, Json<Value>) {
    up.hit();
    let first = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
    let row = |id: usize, amount: Option<f64>| {
        let ex = first - Duration::days(91 * id as i64);
        json!({
            "dividend_id": id,
            "declaration_date": null,
            "ex_dividend_date": ex,
            "record_date": ex + Duration::days(1),
            "payment_date": ex + Duration::days(6),
            "amount": amount,
            "frequency": "quarterly",
            "dividend_type": "cash",
            "fiscal_year": 2024,
            "fiscal_quarter": 1,
            "confidence": 0.95,
        })
    };

    match ticker.to_uppercase().as_str() {
        "AAPL" => (
            StatusCode::OK,
            ok(Value::Array((0..AAPL_HISTORY_ROWS).map(|i| row(i, Some(0.24))).collect())),
        ),
        "KO" => (
            StatusCode::OK,
            ok(json!([row(0, Some(0.5)), row(1, None), row(2, Some(0.4))])),
        ),
        "O" => fail(StatusCode::OK, "Failed to retrieve dividends"),
        _ => fail(StatusCode::NOT_FOUND, "Company not found"),
    }
}

async fn recent(State(up): State<Upstream>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    up.hit();
    let limit = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(20usize);
    *up.recent_limit.lock() = Some(limit);

    let rows: Vec<DividendEvent> = sample_recent().into_iter().take(limit).collect();
    ok(serde_json::to_value(rows).unwrap())
}

async fn calendar(
    State(up): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    up.hit();
    let (Some(start), Some(end)) = (params.get("start_date"), params.get("end_date")) else {
        return fail(StatusCode::BAD_REQUEST, "start_date and end_date parameters required");
    };
    *up.calendar_range.lock() = Some((start.clone(), end.clone()));

    let start: NaiveDate = start.parse().unwrap();
    let end: NaiveDate = end.parse().unwrap();
    let rows: Vec<DividendEvent> = sample_recent()
        .into_iter()
        .filter(|r| r.ex_dividend_date.map_or(false, |d| d >= start && d <= end))
        .collect();
    (StatusCode::OK, ok(serde_json::to_value(rows).unwrap()))
}
