use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;

use crate::analytics::aggregate::{
    account_breakdown, cost_trend, provider_breakdown, region_breakdown, service_breakdown, total_cost,
};
use crate::analytics::chart::{line_series, pie_slices};
use crate::analytics::{summarize, SummaryOptions};
use crate::errors::AppError;
use crate::handlers::{previous_period, request_query, resolve_granularity, AppState};
use crate::models::{
    BreakdownChart, CloudProvider, CostRecord, CostSummary, DashboardParams, Dimension, TrendSeries,
};

pub async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<CostSummary>, AppError> {
    let (range, query) = request_query(&state, &params)?;
    let granularity = resolve_granularity(&params)?;

    let previous_query = query.with_range(previous_period(range)?);
    let (current, previous) = tokio::try_join!(state.fetch(&query), state.fetch(&previous_query))?;

    let options = SummaryOptions::new(range)
        .granularity(granularity)
        .compare_with(&previous);
    Ok(Json(summarize(&current, &options)))
}

pub async fn get_trend(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<TrendSeries>, AppError> {
    let (_, query) = request_query(&state, &params)?;
    let granularity = resolve_granularity(&params)?;
    let max_points = params.max_points.unwrap_or(state.dashboard.max_line_points);

    let records = state.fetch(&query).await?;
    let trend = cost_trend(&records, granularity);
    let points = line_series(&trend, granularity, Some(max_points));
    let total = total_cost(&records);
    let average_cost = if trend.is_empty() { 0.0 } else { total / trend.len() as f64 };

    Ok(Json(TrendSeries {
        granularity,
        sampled: points.len() < trend.len(),
        points,
        total_cost: total,
        average_cost,
    }))
}

pub async fn get_breakdown(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<BreakdownChart>, AppError> {
    let (_, query) = request_query(&state, &params)?;
    let dimension = params
        .dimension
        .as_deref()
        .map(|d| d.parse::<Dimension>().map_err(AppError::bad_request))
        .transpose()?
        .unwrap_or_default();
    let max_slices = params.max_slices.unwrap_or(state.dashboard.max_pie_slices);

    let records = state.fetch(&query).await?;
    let slices = match dimension {
        Dimension::Provider => pie_slices(&provider_breakdown(&records), max_slices),
        Dimension::Service => pie_slices(&service_breakdown(&records), max_slices),
        Dimension::Account => pie_slices(&account_breakdown(&records), max_slices),
        Dimension::Region => pie_slices(&region_breakdown(&records), max_slices),
    };

    Ok(Json(BreakdownChart {
        dimension,
        total_cost: total_cost(&records),
        currency: nominal_currency(&records),
        slices,
    }))
}

pub async fn export_csv(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, AppError> {
    let (range, query) = request_query(&state, &params)?;
    let records = state.fetch(&query).await?;

    let filename = format!("costs-{}-{}.csv", range.start, range.end);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename={filename}")),
        ],
        records_to_csv(&records)?,
    )
        .into_response())
}

pub(crate) fn nominal_currency(records: &[CostRecord]) -> String {
    records
        .first()
        .map(|r| r.currency.clone())
        .unwrap_or_else(|| "USD".into())
}

const CSV_HEADER: [&str; 7] = ["usage_date", "provider", "account_id", "service", "region", "cost", "currency"];

#[derive(Serialize)]
struct CsvRow<'a> {
    usage_date: NaiveDate,
    provider: CloudProvider,
    account_id: &'a str,
    service: &'a str,
    region: Option<&'a str>,
    cost: f64,
    currency: &'a str,
}

impl<'a> From<&'a CostRecord> for CsvRow<'a> {
    fn from(r: &'a CostRecord) -> Self {
        Self {
            usage_date: r.usage_date,
            provider: r.provider,
            account_id: &r.account_id,
            service: &r.service,
            region: r.region.as_deref(),
            cost: r.cost,
            currency: &r.currency,
        }
    }
}

/// One row per record under a fixed header, written even when there are no rows.
pub fn records_to_csv(records: &[CostRecord]) -> Result<String, AppError> {
    let csv_error = |e: csv::Error| AppError::internal(format!("CSV write error: {e}"));

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_error)?;
    for record in records {
        writer.serialize(CsvRow::from(record)).map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::internal(format!("CSV flush error: {}", e.error())))?;
    String::from_utf8(bytes).map_err(|e| AppError::internal(format!("CSV encoding error: {e}")))
}
