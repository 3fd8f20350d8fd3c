use axum::{routing::get, Router};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::MetricsConfig;

#[derive(Default)]
pub struct Metrics {
    pub upstream_requests: AtomicU64,
    pub upstream_failures: AtomicU64,
    pub throttle_denials: AtomicU64,
    pub page_views: AtomicU64,
    pub search_queries: AtomicU64,
    pub directory_refreshes: AtomicU64,
    pub profile_cache_hits: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_upstream_requests(&self) {
        self.upstream_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_failures(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_throttle_denials(&self) {
        self.throttle_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_page_views(&self) {
        self.page_views.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_search_queries(&self) {
        self.search_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_directory_refreshes(&self) {
        self.directory_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_profile_cache_hits(&self) {
        self.profile_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn format_prometheus(&self) -> String {
        let counters = [
            ("upstream_requests", "Upstream API calls sent", &self.upstream_requests),
            ("upstream_failures", "Upstream API calls that failed", &self.upstream_failures),
            ("throttle_denials", "Calls refused by the request throttle", &self.throttle_denials),
            ("page_views", "Dashboard views served", &self.page_views),
            ("search_queries", "Global search queries", &self.search_queries),
            ("directory_refreshes", "Company directory reloads", &self.directory_refreshes),
            ("profile_cache_hits", "Company profiles served from cache", &self.profile_cache_hits),
        ];

        let mut out = String::new();
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP divscout_{name} {help}\n# TYPE divscout_{name} counter\ndivscout_{name} {}\n",
                value.load(Ordering::Relaxed),
            ));
        }
        out
    }
}

pub async fn run_metrics_server(config: MetricsConfig, metrics: Arc<Metrics>) {
    if !config.enable {
        return;
    }

    let path = config.path.clone();
    let app = Router::new().route(
        &path,
        get(move || {
            let m = metrics.clone();
            async move { m.format_prometheus() }
        }),
    );

    let addr: std::net::SocketAddr = match config.bind_addr.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid metrics bind address: {}", e);
            return;
        }
    };

    info!("Metrics server listening on {}{}", addr, path);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind metrics server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Metrics server error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_output() {
        let metrics = Metrics::new();
        metrics.inc_upstream_requests();
        metrics.inc_upstream_requests();
        metrics.inc_throttle_denials();

        let text = metrics.format_prometheus();
        assert!(text.contains("# TYPE divscout_upstream_requests counter\n"));
        assert!(text.contains("divscout_upstream_requests 2\n"));
        assert!(text.contains("divscout_throttle_denials 1\n"));
        assert!(text.contains("divscout_profile_cache_hits 0\n"));
    }

    #[tokio::test]
    async fn test_server_returns_when_address_is_taken() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = MetricsConfig {
            enable: true,
            bind_addr: taken.local_addr().unwrap().to_string(),
            path: "/metrics".into(),
        };

        let finished = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            run_metrics_server(config, Arc::new(Metrics::new())),
        )
        .await;
        assert!(finished.is_ok());
    }
}
