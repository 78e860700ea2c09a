use crate::models::{BudgetSeverity, BudgetStatus, Variation};

/// Budget consumption for progress bars, clamped to `[0, 100]`.
pub fn budget_percentage(cost: f64, budget: f64) -> f64 {
    uncapped_budget_percentage(cost, budget).clamp(0.0, 100.0)
}

/// Budget consumption as plain text shows it; may exceed 100.
pub fn uncapped_budget_percentage(cost: f64, budget: f64) -> f64 {
    if budget <= 0.0 {
        return 0.0;
    }
    let pct = cost / budget * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

pub fn forecast_variation(forecast: f64, budget: f64) -> Variation {
    Variation::between(forecast, budget)
}

pub fn budget_status(spent: f64, budget: f64, forecast: Option<f64>, currency: &str) -> BudgetStatus {
    let uncapped = uncapped_budget_percentage(spent, budget);
    BudgetStatus {
        budget,
        spent,
        remaining: (budget - spent).max(0.0),
        percentage: budget_percentage(spent, budget),
        uncapped_percentage: uncapped,
        severity: BudgetSeverity::from_percentage(uncapped),
        currency: currency.to_string(),
        forecast,
        forecast_variation: forecast.filter(|_| budget > 0.0).map(|f| forecast_variation(f, budget)),
    }
}
