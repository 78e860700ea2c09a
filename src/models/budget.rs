use serde::{Deserialize, Serialize};

use crate::models::types::Direction;

/// Budget consumption tier, drives colour and icon selection.
///
/// Single threshold table: `<= 50` safe, `<= 75` caution, `<= 90` warning,
/// anything above is critical (overspend included).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum BudgetSeverity {
    Safe,
    Caution,
    Warning,
    Critical,
}

const SEVERITY_TABLE: [(f64, BudgetSeverity); 3] = [
    (50.0, BudgetSeverity::Safe),
    (75.0, BudgetSeverity::Caution),
    (90.0, BudgetSeverity::Warning),
];

impl BudgetSeverity {
    pub fn from_percentage(percentage: f64) -> Self {
        if !percentage.is_finite() {
            return if percentage > 0.0 { Self::Critical } else { Self::Safe };
        }
        SEVERITY_TABLE
            .iter()
            .find(|(limit, _)| percentage <= *limit)
            .map(|(_, severity)| *severity)
            .unwrap_or(Self::Critical)
    }
}

impl std::fmt::Display for BudgetSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Caution => write!(f, "caution"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Period-over-period delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub current: f64,
    pub previous: f64,
    pub amount: f64,
    pub percentage: f64,
    pub direction: Direction,
}

impl Variation {
    pub fn between(current: f64, previous: f64) -> Self {
        let amount = current - previous;
        let percentage = if previous != 0.0 {
            amount.abs() / previous.abs() * 100.0
        } else {
            0.0
        };
        let direction = if amount > 0.0 {
            Direction::Increase
        } else if amount < 0.0 {
            Direction::Decrease
        } else {
            Direction::Unchanged
        };

        Self {
            current,
            previous,
            amount,
            percentage: if percentage.is_finite() { percentage } else { 0.0 },
            direction,
        }
    }

    /// Percentage with the sign of the change.
    pub fn signed_percentage(&self) -> f64 {
        match self.direction {
            Direction::Decrease => -self.percentage,
            _ => self.percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub budget: f64,
    pub spent: f64,
    pub remaining: f64,
    /// Capped at 100, for progress bars.
    pub percentage: f64,
    pub uncapped_percentage: f64,
    pub severity: BudgetSeverity,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_variation: Option<Variation>,
}

/// Headline numbers for the dashboard, raw and formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiPanel {
    pub total_cost: f64,
    pub formatted_total: String,
    pub formatted_total_compact: String,
    pub currency: String,
    pub month_over_month: Variation,
    pub formatted_month_over_month: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_budget_percentage: Option<String>,
}
