use serde::Deserialize;

use crate::analytics::DateRangePreset;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

/// Upstream cost API.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

fn default_timeout() -> u64 {
    30
}
fn default_retry_count() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_stale_time")]
    pub stale_time_secs: u64,
    #[serde(default = "default_gc_time")]
    pub gc_time_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: default_stale_time(),
            gc_time_secs: default_gc_time(),
        }
    }
}

fn default_stale_time() -> u64 {
    300
}
fn default_gc_time() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_preset")]
    pub default_preset: DateRangePreset,
    #[serde(default)]
    pub monthly_budget: Option<f64>,
    #[serde(default = "default_max_pie_slices")]
    pub max_pie_slices: usize,
    #[serde(default = "default_max_line_points")]
    pub max_line_points: usize,
    #[serde(default = "default_anomaly_sensitivity")]
    pub anomaly_sensitivity: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_preset: default_preset(),
            monthly_budget: None,
            max_pie_slices: default_max_pie_slices(),
            max_line_points: default_max_line_points(),
            anomaly_sensitivity: default_anomaly_sensitivity(),
        }
    }
}

fn default_preset() -> DateRangePreset {
    DateRangePreset::Last30Days
}
fn default_max_pie_slices() -> usize {
    5
}
fn default_max_line_points() -> usize {
    90
}
fn default_anomaly_sensitivity() -> f64 {
    0.1
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("COSTBOARD").separator("__"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: AppConfig = serde_json::from_str(
            r#"{"api": {"base_url": "https://costs.example.com"}}"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.retry_count, 3);
        assert!(config.api.api_token.is_none());
        assert_eq!(config.cache.stale_time_secs, 300);
        assert_eq!(config.cache.gc_time_secs, 600);
        assert_eq!(config.dashboard.default_preset, DateRangePreset::Last30Days);
        assert_eq!(config.dashboard.max_pie_slices, 5);
        assert!(config.dashboard.monthly_budget.is_none());
    }

    #[test]
    fn test_dashboard_overrides() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "api": {"base_url": "http://localhost:9000", "retry_count": 0},
                "dashboard": {"default_preset": "this_month", "monthly_budget": 5000.0}
            }"#,
        )
        .unwrap();

        assert_eq!(config.api.retry_count, 0);
        assert_eq!(config.dashboard.default_preset, DateRangePreset::ThisMonth);
        assert_eq!(config.dashboard.monthly_budget, Some(5000.0));
    }
}
