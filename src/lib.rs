//! Multi-cloud cost aggregation, KPIs, chart shaping and formatting, plus a
//! small HTTP service serving the results to dashboards.

pub mod analytics;
pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod ml;
pub mod models;
