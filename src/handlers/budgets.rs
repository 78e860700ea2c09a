use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, NaiveDate};

use crate::analytics::aggregate::{
    bucket_start, daily_series, month_over_month, provider_breakdown, service_breakdown, total_cost,
};
use crate::analytics::format::{
    format_compact_currency, format_currency, format_percentage, format_signed_percentage,
};
use crate::analytics::kpi::budget_status;
use crate::errors::AppError;
use crate::handlers::costs::nominal_currency;
use crate::handlers::{request_query, AppState};
use crate::ml::forecast::project_period_end;
use crate::models::{BudgetStatus, CostRecord, DashboardParams, DateRange, Granularity, KpiPanel};

/// The calendar month containing `date`, or `None` at the edge of the
/// representable calendar.
pub fn month_of(date: NaiveDate) -> Option<DateRange> {
    let start = bucket_start(date, Granularity::Monthly);
    let next = bucket_start(start.checked_add_signed(Duration::days(32))?, Granularity::Monthly);
    Some(DateRange::new(start, next.checked_sub_signed(Duration::days(1))?))
}

fn month_range(date: NaiveDate) -> Result<DateRange, AppError> {
    month_of(date).ok_or_else(|| AppError::bad_request(format!("date {date} is out of range")))
}

/// Month-to-date status for `month`, counting spend up to `anchor`. The
/// forecast runs over every calendar day so far, days without spend at 0.
pub fn monthly_budget_status(
    records: &[CostRecord],
    month: DateRange,
    anchor: NaiveDate,
    budget: f64,
) -> BudgetStatus {
    let so_far = DateRange::new(month.start, anchor.min(month.end));
    let month_to_date: Vec<CostRecord> = records
        .iter()
        .filter(|r| so_far.contains(r.usage_date))
        .cloned()
        .collect();

    let spent = total_cost(&month_to_date);
    let forecast = (!month_to_date.is_empty())
        .then(|| project_period_end(&daily_series(&month_to_date, so_far), month.end));

    budget_status(spent, budget, forecast, &nominal_currency(&month_to_date))
}

fn resolve_budget(params: &DashboardParams, state: &AppState) -> Option<f64> {
    params
        .budget
        .or(state.dashboard.monthly_budget)
        .filter(|b| b.is_finite())
}

pub async fn get_kpis(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<KpiPanel>, AppError> {
    let (range, query) = request_query(&state, &params)?;

    // Widen the fetch so the month before range.end is available for MoM.
    let month = month_range(range.end)?;
    let previous_month = month
        .start
        .checked_sub_signed(Duration::days(1))
        .map(month_range)
        .transpose()?
        .ok_or_else(|| AppError::bad_request(format!("no month precedes {}", month.start)))?;
    let fetch_range = DateRange::new(range.start.min(previous_month.start), range.end);
    let records = state.fetch(&query.with_range(fetch_range)).await?;

    let in_range: Vec<CostRecord> = records
        .iter()
        .filter(|r| range.contains(r.usage_date))
        .cloned()
        .collect();

    let currency = nominal_currency(&in_range);
    let total = total_cost(&in_range);
    let mom = month_over_month(&records, range.end);
    let budget = resolve_budget(&params, &state).map(|b| monthly_budget_status(&records, month, range.end, b));

    tracing::debug!(total, records = in_range.len(), "Computed KPI panel");

    Ok(Json(KpiPanel {
        total_cost: total,
        formatted_total: format_currency(total, &currency),
        formatted_total_compact: format_compact_currency(total, &currency),
        formatted_month_over_month: format_signed_percentage(mom.signed_percentage(), 1),
        month_over_month: mom,
        top_service: service_breakdown(&in_range).first().map(|s| s.service.clone()),
        top_provider: provider_breakdown(&in_range)
            .first()
            .map(|p| p.provider.display_name().to_string()),
        formatted_budget_percentage: budget.as_ref().map(|b| format_percentage(b.uncapped_percentage, 1)),
        budget,
        currency,
    }))
}

pub async fn get_budget(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<BudgetStatus>, AppError> {
    let budget = resolve_budget(&params, &state).ok_or_else(|| {
        AppError::bad_request("No budget given and no monthly_budget configured")
    })?;
    let (range, query) = request_query(&state, &params)?;

    let month = month_range(range.end)?;
    let records = state
        .fetch(&query.with_range(DateRange::new(month.start, range.end)))
        .await?;

    Ok(Json(monthly_budget_status(&records, month, range.end, budget)))
}
