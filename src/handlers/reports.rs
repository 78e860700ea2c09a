use axum::{
    extract::{Query, State},
    Json,
};

use crate::analytics::format::format_signed_percentage;
use crate::analytics::{summarize, SummaryOptions};
use crate::errors::AppError;
use crate::handlers::{previous_period, request_query, resolve_granularity, AppState};
use crate::models::{DashboardParams, Variation};

/// Current period against the equally long period before it.
pub async fn cost_comparison(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (range, query) = request_query(&state, &params)?;
    let granularity = resolve_granularity(&params)?;
    let previous_range = previous_period(range)?;

    let previous_query = query.with_range(previous_range);
    let (current, previous) = tokio::try_join!(state.fetch(&query), state.fetch(&previous_query))?;

    let current_summary = summarize(
        &current,
        &SummaryOptions::new(range)
            .granularity(granularity)
            .compare_with(&previous),
    );
    let previous_summary = summarize(
        &previous,
        &SummaryOptions::new(previous_range).granularity(granularity),
    );
    let change = Variation::between(current_summary.total_cost, previous_summary.total_cost);

    Ok(Json(serde_json::json!({
        "current_period": { "start": range.start, "end": range.end, "total": current_summary.total_cost },
        "previous_period": { "start": previous_range.start, "end": previous_range.end, "total": previous_summary.total_cost },
        "change": change,
        "formatted_change": format_signed_percentage(change.signed_percentage(), 1),
        "currency": current_summary.currency,
        "current_breakdown": current_summary.by_service,
        "previous_breakdown": previous_summary.by_service,
        "by_provider": current_summary.by_provider,
    })))
}
