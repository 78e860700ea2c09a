use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Dimension, Granularity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    pub label: String,
    pub cost: f64,
    pub percentage: f64,
    pub color: String,
    pub is_others: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub date: NaiveDate,
    pub cost: f64,
    pub formatted_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub granularity: Granularity,
    pub points: Vec<LinePoint>,
    pub total_cost: f64,
    pub average_cost: f64,
    /// True when points were dropped to respect the point limit.
    pub sampled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownChart {
    pub dimension: Dimension,
    pub total_cost: f64,
    pub currency: String,
    pub slices: Vec<PieSlice>,
}
