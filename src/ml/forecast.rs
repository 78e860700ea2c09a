//! Spend forecasting with ETS exponential smoothing (`augurs`), plus a
//! run-rate projection used when the series is too short to fit.

use augurs::ets::AutoETS;
use augurs::prelude::*;
use chrono::NaiveDate;

use crate::models::CostTrendPoint;

pub const MIN_FORECAST_POINTS: usize = 7;

#[derive(Debug, Clone)]
pub struct ForecastResult {
    pub predicted: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub confidence: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("need at least {min} data points, got {0}", min = MIN_FORECAST_POINTS)]
    NotEnoughData(usize),

    #[error("ETS model error: {0}")]
    Model(String),
}

/// Fits an ETS model to a daily cost series and predicts `horizon` more days.
pub fn generate_forecast(data: &[f64], horizon: usize) -> Result<ForecastResult, ForecastError> {
    if data.len() < MIN_FORECAST_POINTS {
        return Err(ForecastError::NotEnoughData(data.len()));
    }

    let ets = AutoETS::non_seasonal();
    let model = ets.fit(data).map_err(|e| ForecastError::Model(e.to_string()))?;
    let forecast = model
        .predict(horizon, 0.95)
        .map_err(|e| ForecastError::Model(e.to_string()))?;

    let predicted = forecast.point;
    // Without model intervals, band the prediction at +/- 15%.
    let (lower, upper) = match forecast.intervals {
        Some(intervals) => (intervals.lower, intervals.upper),
        None => (
            predicted.iter().map(|v| v * 0.85).collect(),
            predicted.iter().map(|v| v * 1.15).collect(),
        ),
    };

    Ok(ForecastResult {
        predicted,
        lower,
        upper,
        confidence: (0.5 + data.len() as f64 * 0.01).min(0.95),
    })
}

/// Spend expected by `period_end`: what the daily trend already shows, plus
/// the predicted cost of the days still to come.
///
/// Uses the ETS model when the trend has enough points, otherwise (or if
/// fitting fails) the average daily cost as a run-rate.
pub fn project_period_end(trend: &[CostTrendPoint], period_end: NaiveDate) -> f64 {
    let spent: f64 = trend.iter().map(|p| p.cost).sum();
    let Some(last) = trend.last() else {
        return 0.0;
    };

    let remaining_days = (period_end - last.date).num_days();
    if remaining_days <= 0 {
        return spent;
    }

    let values: Vec<f64> = trend.iter().map(|p| p.cost).collect();
    let predicted = generate_forecast(&values, remaining_days as usize)
        .map(|f| f.predicted.iter().map(|v| v.max(0.0)).sum::<f64>())
        .unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Falling back to run-rate projection");
            run_rate(&values) * remaining_days as f64
        });

    spent + predicted
}

fn run_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
