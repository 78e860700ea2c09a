use axum::{
    extract::{Query, State},
    Json,
};

use crate::analytics::aggregate::tag_allocation;
use crate::errors::AppError;
use crate::handlers::{request_query, AppState};
use crate::models::{DashboardParams, TagAllocation};

pub async fn get_allocations(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<TagAllocation>, AppError> {
    let tag_key = params
        .tag_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::bad_request("tag_key is required"))?
        .to_string();

    let (_, query) = request_query(&state, &params)?;
    let records = state.fetch(&query).await?;

    Ok(Json(tag_allocation(&records, &tag_key)))
}
