use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::{ClientError, CostSource};
use crate::config::ApiConfig;
use crate::models::{CostQuery, CostRecord};

const COSTS_PATH: &str = "/api/v1/costs";
const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// The cost API answers with either a bare array or `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CostResponse {
    Bare(Vec<CostRecord>),
    Wrapped { data: Vec<CostRecord> },
}

impl CostResponse {
    fn into_records(self) -> Vec<CostRecord> {
        match self {
            Self::Bare(records) | Self::Wrapped { data: records } => records,
        }
    }
}

pub struct HttpCostClient {
    client: Client,
    costs_url: String,
    api_token: Option<String>,
    retry_count: u32,
    retry_base: Duration,
}

impl HttpCostClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            costs_url: costs_url(&config.base_url)?,
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            retry_count: config.retry_count,
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// First retry delay; later ones double from it.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    async fn fetch_once(&self, query: &CostQuery) -> Result<Vec<CostRecord>, ClientError> {
        let mut request = self.client.get(&self.costs_url).query(query);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        parse_costs(&body)
    }
}

#[async_trait]
impl CostSource for HttpCostClient {
    async fn fetch_costs(&self, query: &CostQuery) -> Result<Vec<CostRecord>, ClientError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(query).await {
                Ok(records) => {
                    info!(
                        start = %query.start_date,
                        end = %query.end_date,
                        count = records.len(),
                        "Fetched cost records"
                    );
                    return Ok(records);
                }
                Err(e) if e.is_transient() && attempt < self.retry_count => {
                    let delay = retry_delay(self.retry_base, attempt);
                    warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "Cost API request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff from `base` (1s, 2s, 4s, ... by default), capped at 30s.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16)).min(MAX_BACKOFF)
}

fn costs_url(base_url: &str) -> Result<String, ClientError> {
    let base = base_url.trim().trim_end_matches('/');
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
    }
    Ok(format!("{base}{COSTS_PATH}"))
}

pub fn parse_costs(body: &str) -> Result<Vec<CostRecord>, ClientError> {
    let response: CostResponse = serde_json::from_str(body)?;
    let records = response.into_records();
    debug!(count = records.len(), "Decoded cost response");
    Ok(records)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
