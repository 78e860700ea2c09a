//! Access to the upstream cost API.
//!
//! [`CostSource`] is the seam handlers depend on. [`HttpCostClient`] talks to
//! the real API and [`CachedCostSource`] layers the query cache over any
//! source.

pub mod cache;
pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CostQuery, CostRecord};

pub use cache::{CacheStats, CachedCostSource, QueryCache};
pub use http::HttpCostClient;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Cost API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid cost API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid cost API base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl ClientError {
    /// Worth retrying: transport failures, throttling and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => !e.is_builder() && !e.is_decode(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::InvalidBaseUrl(_) => false,
        }
    }
}

#[async_trait]
pub trait CostSource: Send + Sync {
    async fn fetch_costs(&self, query: &CostQuery) -> Result<Vec<CostRecord>, ClientError>;
}
