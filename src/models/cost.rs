use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::types::{CloudProvider, Tags};
use crate::models::Variation;

/// A single billed-usage line as returned by the cost API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub provider: CloudProvider,
    pub account_id: String,
    pub service: String,
    #[serde(default, deserialize_with = "lenient_region")]
    pub region: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub usage_date: NaiveDate,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub cost: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub tags: Tags,
}

fn default_currency() -> String {
    "USD".into()
}

/// Numbers pass through, numeric strings are parsed, anything else is 0.
fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(parse_amount).unwrap_or(0.0))
}

pub fn parse_amount(value: &serde_json::Value) -> f64 {
    let amount = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}

fn lenient_region<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let region = Option::<String>::deserialize(deserializer)?;
    Ok(region.filter(|r| !r.trim().is_empty()))
}

fn lenient_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_usage_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid usage_date '{raw}'")))
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_usage_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The range of equal length immediately before this one, or `None`
    /// when it would fall before the earliest representable date.
    pub fn previous(&self) -> Option<Self> {
        let prev_end = self.start.checked_sub_signed(chrono::Duration::days(1))?;
        let prev_start = prev_end.checked_sub_signed(chrono::Duration::days(self.num_days() - 1))?;
        Some(Self::new(prev_start, prev_end))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            other => Err(format!("unknown granularity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost: f64,
    pub currency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub by_provider: Vec<ProviderBreakdown>,
    pub by_service: Vec<ServiceBreakdown>,
    pub by_account: Vec<AccountBreakdown>,
    pub by_region: Vec<RegionBreakdown>,
    pub trend: Vec<CostTrendPoint>,
    pub month_over_month: Variation,
}

/// Common view over the four breakdown kinds, used by chart shaping.
pub trait BreakdownEntry {
    fn label(&self) -> String;
    fn cost(&self) -> f64;
    fn percentage(&self) -> f64;

    /// Provider whose brand colour the entry should be drawn with, if any.
    fn brand_provider(&self) -> Option<CloudProvider> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderBreakdown {
    pub provider: CloudProvider,
    pub cost: f64,
    pub percentage: f64,
    pub service_count: usize,
    pub account_count: usize,
    pub trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBreakdown {
    pub service: String,
    pub provider: CloudProvider,
    pub cost: f64,
    pub percentage: f64,
    pub account_count: usize,
    pub region_count: usize,
    pub trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBreakdown {
    pub account_id: String,
    pub provider: CloudProvider,
    pub cost: f64,
    pub percentage: f64,
    pub service_count: usize,
    pub trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBreakdown {
    pub region: String,
    pub cost: f64,
    pub percentage: f64,
    pub service_count: usize,
    pub provider_count: usize,
    pub trend: f64,
}

impl BreakdownEntry for ProviderBreakdown {
    fn label(&self) -> String {
        self.provider.display_name().to_string()
    }
    fn cost(&self) -> f64 {
        self.cost
    }
    fn percentage(&self) -> f64 {
        self.percentage
    }
    fn brand_provider(&self) -> Option<CloudProvider> {
        Some(self.provider)
    }
}

impl BreakdownEntry for ServiceBreakdown {
    fn label(&self) -> String {
        self.service.clone()
    }
    fn cost(&self) -> f64 {
        self.cost
    }
    fn percentage(&self) -> f64 {
        self.percentage
    }
}

impl BreakdownEntry for AccountBreakdown {
    fn label(&self) -> String {
        self.account_id.clone()
    }
    fn cost(&self) -> f64 {
        self.cost
    }
    fn percentage(&self) -> f64 {
        self.percentage
    }
}

impl BreakdownEntry for RegionBreakdown {
    fn label(&self) -> String {
        self.region.clone()
    }
    fn cost(&self) -> f64 {
        self.cost
    }
    fn percentage(&self) -> f64 {
        self.percentage
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostTrendPoint {
    pub date: NaiveDate,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAllocation {
    pub tag_key: String,
    pub entries: Vec<TagAllocationEntry>,
    pub untagged_cost: f64,
    pub untagged_percentage: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAllocationEntry {
    pub value: String,
    pub cost: f64,
    pub percentage: f64,
    pub record_count: usize,
}

impl BreakdownEntry for TagAllocationEntry {
    fn label(&self) -> String {
        self.value.clone()
    }
    fn cost(&self) -> f64 {
        self.cost
    }
    fn percentage(&self) -> f64 {
        self.percentage
    }
}

/// Filter parameters sent to the cost API. Also the query-cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CostQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl CostQuery {
    pub fn for_range(range: DateRange) -> Self {
        Self {
            start_date: range.start,
            end_date: range.end,
            provider: None,
            service: None,
            account_id: None,
            region: None,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Same filters over a different date range.
    pub fn with_range(&self, range: DateRange) -> Self {
        Self {
            start_date: range.start,
            end_date: range.end,
            ..self.clone()
        }
    }
}

/// Breakdown dimension selectable by dashboard charts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Provider,
    #[default]
    Service,
    Account,
    Region,
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "provider" => Ok(Self::Provider),
            "service" => Ok(Self::Service),
            "account" | "account_id" => Ok(Self::Account),
            "region" => Ok(Self::Region),
            other => Err(format!("unknown dimension '{other}'")),
        }
    }
}

/// Query string accepted by the dashboard routes.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub preset: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub provider: Option<String>,
    pub service: Option<String>,
    pub account_id: Option<String>,
    pub region: Option<String>,
    pub granularity: Option<String>,
    pub dimension: Option<String>,
    pub max_slices: Option<usize>,
    pub max_points: Option<usize>,
    pub budget: Option<f64>,
    pub tag_key: Option<String>,
}
