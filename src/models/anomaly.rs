use chrono::NaiveDate;
use serde::Serialize;

use crate::models::types::Severity;

/// A trend bucket whose cost strays from its trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedAnomaly {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub value: f64,
    pub expected: f64,
    pub deviation: f64,
    pub deviation_pct: f64,
    pub score: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalySummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total_impact: f64,
    pub currency: String,
}

impl AnomalySummary {
    pub fn from_anomalies(anomalies: &[DetectedAnomaly], currency: &str) -> Self {
        let count = |s: Severity| anomalies.iter().filter(|a| a.severity == s).count();
        Self {
            total: anomalies.len(),
            critical: count(Severity::Critical),
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
            total_impact: anomalies.iter().map(|a| a.deviation.max(0.0)).sum(),
            currency: currency.to_string(),
        }
    }
}
