pub mod allocations;
pub mod anomalies;
pub mod budgets;
pub mod costs;
pub mod health;
pub mod reports;

use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};

use crate::analytics::DateRangePreset;
use crate::client::CostSource;
use crate::config::DashboardConfig;
use crate::errors::AppError;
use crate::models::{CostQuery, CostRecord, DashboardParams, DateRange, Granularity};

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn CostSource>,
    pub dashboard: DashboardConfig,
}

impl AppState {
    pub fn new(source: Arc<dyn CostSource>, dashboard: DashboardConfig) -> Self {
        Self { source, dashboard }
    }

    pub async fn fetch(&self, query: &CostQuery) -> Result<Vec<CostRecord>, AppError> {
        Ok(self.source.fetch_costs(query).await?)
    }
}

/// Years accepted for explicit `start_date` / `end_date` values.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1900..=9999;

/// Explicit dates win, then the `preset` parameter, then the configured default.
pub fn resolve_range(
    params: &DashboardParams,
    default_preset: DateRangePreset,
    today: NaiveDate,
) -> Result<DateRange, AppError> {
    let preset = match params.preset.as_deref() {
        Some(raw) => raw.parse::<DateRangePreset>().map_err(AppError::bad_request)?,
        None => default_preset,
    };
    let fallback = preset.range(today);

    for date in [params.start_date, params.end_date].into_iter().flatten() {
        if !SUPPORTED_YEARS.contains(&date.year()) {
            return Err(AppError::bad_request(format!(
                "date {date} is outside the supported years {}-{}",
                SUPPORTED_YEARS.start(),
                SUPPORTED_YEARS.end()
            )));
        }
    }

    let range = match (params.start_date, params.end_date) {
        (Some(start), Some(end)) => DateRange::new(start, end),
        (Some(start), None) => DateRange::new(start, today),
        (None, Some(end)) => {
            let start = end
                .checked_sub_signed(Duration::days(fallback.num_days() - 1))
                .ok_or_else(|| AppError::bad_request(format!("end_date {end} is out of range")))?;
            DateRange::new(start, end)
        }
        (None, None) => fallback,
    };

    if range.start > range.end {
        return Err(AppError::bad_request(format!(
            "start_date {} is after end_date {}",
            range.start, range.end
        )));
    }
    Ok(range)
}

/// The equally long period before `range`.
pub fn previous_period(range: DateRange) -> Result<DateRange, AppError> {
    range
        .previous()
        .ok_or_else(|| AppError::bad_request(format!("no period precedes {}", range.start)))
}

pub fn resolve_granularity(params: &DashboardParams) -> Result<Granularity, AppError> {
    params
        .granularity
        .as_deref()
        .map(|g| g.parse::<Granularity>().map_err(AppError::bad_request))
        .transpose()
        .map(Option::unwrap_or_default)
}

pub fn cost_query(params: &DashboardParams, range: DateRange) -> CostQuery {
    let non_empty = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    CostQuery {
        provider: non_empty(&params.provider),
        service: non_empty(&params.service),
        account_id: non_empty(&params.account_id),
        region: non_empty(&params.region),
        ..CostQuery::for_range(range)
    }
}

/// Range and upstream query for a request, resolved against today's date.
pub fn request_query(state: &AppState, params: &DashboardParams) -> Result<(DateRange, CostQuery), AppError> {
    let range = resolve_range(params, state.dashboard.default_preset, Utc::now().date_naive())?;
    Ok((range, cost_query(params, range)))
}
