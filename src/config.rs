use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;

use crate::error::DashboardError;
use crate::throttle::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_ms: DEFAULT_WINDOW.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub page_size: usize,
    pub recent_fetch_limit: usize,
    pub search_results: usize,
    pub history_rows: usize,
    pub directory_refresh_interval_ms: u64,
    pub profile_cache_ttl_ms: u64,
    pub calendar_lookback_days: i64,
    pub calendar_lookahead_days: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            recent_fetch_limit: 100,
            search_results: 10,
            history_rows: 20,
            directory_refresh_interval_ms: 600_000,
            profile_cache_ttl_ms: 1_800_000,
            calendar_lookback_days: 90,
            calendar_lookahead_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enable: bool,
    pub bind_addr: String,
    pub path: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), DashboardError> {
        let checks = [
            ("limits.max_requests", self.limits.max_requests as u64),
            ("limits.window_ms", self.limits.window_ms),
            ("api.timeout_ms", self.api.timeout_ms),
            ("dashboard.page_size", self.dashboard.page_size as u64),
            ("dashboard.recent_fetch_limit", self.dashboard.recent_fetch_limit as u64),
            ("dashboard.search_results", self.dashboard.search_results as u64),
            ("dashboard.history_rows", self.dashboard.history_rows as u64),
            (
                "dashboard.directory_refresh_interval_ms",
                self.dashboard.directory_refresh_interval_ms,
            ),
        ];

        for (name, value) in checks {
            if value == 0 {
                return Err(DashboardError::Config(format!("{} must be positive", name)));
            }
        }

        if self.dashboard.calendar_lookback_days < 0 || self.dashboard.calendar_lookahead_days < 0 {
            return Err(DashboardError::Config(
                "calendar range offsets must not be negative".into(),
            ));
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path))?;

    parse_config(&config_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        bind_addr = "127.0.0.1:8080"

        [api]
        base_url = "http://localhost:5000/api"
        timeout_ms = 5000

        [metrics]
        enable = false
        bind_addr = "127.0.0.1:9100"
        path = "/metrics"
    "#;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.limits.max_requests, 30);
        assert_eq!(config.limits.window_ms, 60_000);
        assert_eq!(config.dashboard.page_size, 20);
        assert_eq!(config.dashboard.recent_fetch_limit, 100);
        assert_eq!(config.dashboard.search_results, 10);
        assert_eq!(config.dashboard.calendar_lookback_days, 90);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let content = format!("{}\n[limits]\nmax_requests = 5\n", MINIMAL);
        let config = parse_config(&content).unwrap();
        assert_eq!(config.limits.max_requests, 5);
        assert_eq!(config.limits.window_ms, 60_000);
    }

    #[test]
    fn test_zero_limits_fail_fast() {
        let content = format!("{}\n[limits]\nmax_requests = 0\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("limits.max_requests"));

        let content = format!("{}\n[dashboard]\npage_size = 0\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("dashboard.page_size"));
    }

    #[test]
    fn test_missing_required_section() {
        assert!(parse_config("[server]\nbind_addr = \"0.0.0.0:80\"\n").is_err());
    }
}
