//! Display formatting for dashboard values (en-US conventions).
//!
//! All functions are pure and total: non-finite inputs render as zero.

use chrono::NaiveDate;

use crate::models::Granularity;

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Prefix and fraction digits for a currency code.
fn currency_style(currency: &str) -> (String, usize) {
    match currency.trim().to_ascii_uppercase().as_str() {
        "USD" => ("$".into(), 2),
        "EUR" => ("€".into(), 2),
        "GBP" => ("£".into(), 2),
        "JPY" => ("¥".into(), 0),
        "" => ("$".into(), 2),
        other => (format!("{other} "), 2),
    }
}

fn format_with_separators(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `format_currency(-1234.5, "USD")` → `-$1,234.50`.
pub fn format_currency(amount: f64, currency: &str) -> String {
    let amount = finite_or_zero(amount);
    let (prefix, decimals) = currency_style(currency);
    let scale = 10u128.pow(decimals as u32);
    let scaled = (amount.abs() * scale as f64).round().min(u128::MAX as f64) as u128;
    let whole = format_with_separators(scaled / scale);
    let sign = if amount < 0.0 && scaled > 0 { "-" } else { "" };

    if decimals == 0 {
        format!("{sign}{prefix}{whole}")
    } else {
        let fraction = scaled % scale;
        format!("{sign}{prefix}{whole}.{fraction:0width$}", width = decimals)
    }
}

pub fn format_percentage(value: f64, decimals: usize) -> String {
    let value = finite_or_zero(value);
    let rounded = format!("{value:.decimals$}");
    // "-0.0" after rounding reads as a decrease that is not there.
    match rounded.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => format!("{rest}%"),
        _ => format!("{rounded}%"),
    }
}

/// Percentage with an explicit `+` for increases, as variation badges show it.
pub fn format_signed_percentage(value: f64, decimals: usize) -> String {
    let formatted = format_percentage(value, decimals);
    let nonzero = formatted.chars().any(|c| c.is_ascii_digit() && c != '0');
    if value > 0.0 && nonzero {
        format!("+{formatted}")
    } else {
        formatted
    }
}

fn trim_fraction(s: String) -> String {
    match s.strip_suffix(".0") {
        Some(trimmed) => trimmed.to_string(),
        None => s,
    }
}

const COMPACT_UNITS: [(f64, &str); 3] = [(1e9, "B"), (1e6, "M"), (1e3, "K")];

fn compact_magnitude(abs: f64) -> String {
    for (i, (threshold, suffix)) in COMPACT_UNITS.iter().enumerate() {
        if abs >= *threshold {
            let scaled = (abs / threshold * 10.0).round() / 10.0;
            // 999_950 rounds to 1000.0K; promote it to the next unit.
            if scaled >= 1000.0 && i > 0 {
                let (up_threshold, up_suffix) = COMPACT_UNITS[i - 1];
                let up = (abs / up_threshold * 10.0).round() / 10.0;
                return format!("{}{up_suffix}", trim_fraction(format!("{up:.1}")));
            }
            return format!("{}{suffix}", trim_fraction(format!("{scaled:.1}")));
        }
    }
    let rounded = (abs * 10.0).round() / 10.0;
    if rounded >= 1000.0 {
        return "1K".into();
    }
    trim_fraction(format!("{rounded:.1}"))
}

/// `1500.0` → `1.5K`, `2_300_000.0` → `2.3M`.
pub fn format_compact(value: f64) -> String {
    let value = finite_or_zero(value);
    let magnitude = compact_magnitude(value.abs());
    if value < 0.0 && magnitude != "0" {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

pub fn format_compact_currency(amount: f64, currency: &str) -> String {
    let amount = finite_or_zero(amount);
    let (prefix, _) = currency_style(currency);
    let magnitude = compact_magnitude(amount.abs());
    if amount < 0.0 && magnitude != "0" {
        format!("-{prefix}{magnitude}")
    } else {
        format!("{prefix}{magnitude}")
    }
}

/// Axis label for a trend bucket.
pub fn format_date(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Daily | Granularity::Weekly => date.format("%b %-d").to_string(),
        Granularity::Monthly => date.format("%b %Y").to_string(),
    }
}

pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}
