use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRangePreset {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[serde(rename = "this_month")]
    ThisMonth,
    #[serde(rename = "last_month")]
    LastMonth,
}

impl DateRangePreset {
    pub fn range(&self, today: NaiveDate) -> DateRange {
        match self {
            Self::Last7Days => DateRange::new(today - Duration::days(7), today),
            Self::Last30Days => DateRange::new(today - Duration::days(30), today),
            Self::Last90Days => DateRange::new(today - Duration::days(90), today),
            Self::ThisMonth => DateRange::new(first_of_month(today), today),
            Self::LastMonth => {
                let end = first_of_month(today) - Duration::days(1);
                DateRange::new(first_of_month(end), end)
            }
        }
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

impl std::str::FromStr for DateRangePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7d" | "last_7_days" => Ok(Self::Last7Days),
            "30d" | "last_30_days" => Ok(Self::Last30Days),
            "90d" | "last_90_days" => Ok(Self::Last90Days),
            "this_month" => Ok(Self::ThisMonth),
            "last_month" => Ok(Self::LastMonth),
            other => Err(format!("unknown date range preset '{other}'")),
        }
    }
}

impl std::fmt::Display for DateRangePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Last7Days => write!(f, "7d"),
            Self::Last30Days => write!(f, "30d"),
            Self::Last90Days => write!(f, "90d"),
            Self::ThisMonth => write!(f, "this_month"),
            Self::LastMonth => write!(f, "last_month"),
        }
    }
}
