use axum::{
    extract::{Query, State},
    Json,
};

use crate::analytics::aggregate::daily_series;
use crate::errors::AppError;
use crate::handlers::costs::nominal_currency;
use crate::handlers::{request_query, AppState};
use crate::ml::anomaly::AnomalyDetector;
use crate::models::{AnomalySummary, DashboardParams};

/// Anomalies on the daily cost series of the requested range. Days without
/// spend count as zero.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (range, query) = request_query(&state, &params)?;
    let records = state.fetch(&query).await?;

    let trend = daily_series(&records, range);
    let detector = AnomalyDetector::new(state.dashboard.anomaly_sensitivity);
    let anomalies = detector.detect_in_trend(&trend);
    let summary = AnomalySummary::from_anomalies(&anomalies, &nominal_currency(&records));

    if summary.critical > 0 {
        tracing::warn!(
            critical = summary.critical,
            start = %range.start,
            end = %range.end,
            "Critical cost anomalies detected"
        );
    }

    Ok(Json(serde_json::json!({
        "start_date": range.start,
        "end_date": range.end,
        "anomalies": anomalies,
        "summary": summary,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{date, march_params, record, state_with};
    use crate::models::CloudProvider;
    use chrono::Duration;

    #[tokio::test]
    async fn test_spike_is_reported_with_date() {
        let start = date(2026, 3, 1);
        let mut records: Vec<_> = (0..14)
            .map(|i| {
                let cost = if i % 2 == 0 { 100.0 } else { 102.0 };
                record(CloudProvider::Aws, "EC2", start + Duration::days(i), cost)
            })
            .collect();
        records.push(record(CloudProvider::Aws, "EC2", date(2026, 3, 15), 300.0));

        let state = state_with(records);
        let params = DashboardParams {
            end_date: Some(date(2026, 3, 15)),
            ..march_params()
        };
        let Json(body) = list(State(state), Query(params)).await.unwrap();

        assert_eq!(body["summary"]["total"], 1);
        assert_eq!(body["summary"]["critical"], 1);
        assert_eq!(body["anomalies"][0]["date"], "2026-03-15");
        assert_eq!(body["anomalies"][0]["expected"], 101.0);
        assert_eq!(body["anomalies"][0]["severity"], "critical");
    }

    #[tokio::test]
    async fn test_day_without_spend_is_a_drop() {
        let start = date(2026, 3, 1);
        let mut records: Vec<_> = (0..14)
            .map(|i| {
                let cost = if i % 2 == 0 { 100.0 } else { 102.0 };
                record(CloudProvider::Aws, "EC2", start + Duration::days(i), cost)
            })
            .collect();
        records.push(record(CloudProvider::Aws, "EC2", date(2026, 3, 16), 100.0));

        let state = state_with(records);
        let params = DashboardParams {
            end_date: Some(date(2026, 3, 16)),
            ..march_params()
        };
        let Json(body) = list(State(state), Query(params)).await.unwrap();

        assert_eq!(body["summary"]["total"], 1);
        assert_eq!(body["anomalies"][0]["date"], "2026-03-15");
        assert_eq!(body["anomalies"][0]["value"], 0.0);
        assert_eq!(body["anomalies"][0]["severity"], "critical");
        assert!(body["anomalies"][0]["deviation"].as_f64().unwrap() < 0.0);
    }

    #[tokio::test]
    async fn test_short_series_has_no_anomalies() {
        let state = state_with(vec![record(CloudProvider::Gcp, "GCE", date(2026, 3, 2), 10.0)]);
        let Json(body) = list(State(state), Query(march_params())).await.unwrap();
        assert_eq!(body["summary"]["total"], 0);
        assert_eq!(body["anomalies"].as_array().map(Vec::len), Some(0));
    }
}
