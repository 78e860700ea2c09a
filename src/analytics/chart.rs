use crate::analytics::format::format_date;
use crate::models::{BreakdownEntry, CostTrendPoint, Granularity, LinePoint, PieSlice};

pub const OTHERS_LABEL: &str = "Others";
pub const OTHERS_COLOR: &str = "#9CA3AF";

/// Hue ramp colour for the entry at `rank` out of `count` coloured slices.
pub fn ramp_color(rank: usize, count: usize) -> String {
    let hue = if count == 0 { 0 } else { rank * 360 / count };
    format!("hsl({hue}, 65%, 55%)")
}

/// Top `max_slices - 1` entries plus an "Others" slice when the breakdown is
/// longer than `max_slices`. Expects entries sorted descending by cost.
pub fn pie_slices<E: BreakdownEntry>(entries: &[E], max_slices: usize) -> Vec<PieSlice> {
    let max_slices = max_slices.max(1);
    let (head, tail) = if entries.len() > max_slices {
        entries.split_at(max_slices - 1)
    } else {
        (entries, &entries[entries.len()..])
    };

    let mut slices: Vec<PieSlice> = head
        .iter()
        .enumerate()
        .map(|(rank, entry)| PieSlice {
            label: entry.label(),
            cost: entry.cost(),
            percentage: entry.percentage(),
            color: entry
                .brand_provider()
                .and_then(|p| p.brand_color())
                .map(str::to_string)
                .unwrap_or_else(|| ramp_color(rank, head.len())),
            is_others: false,
        })
        .collect();

    if !tail.is_empty() {
        slices.push(PieSlice {
            label: OTHERS_LABEL.to_string(),
            cost: tail.iter().map(|e| e.cost()).sum(),
            percentage: tail.iter().map(|e| e.percentage()).sum(),
            color: OTHERS_COLOR.to_string(),
            is_others: true,
        });
    }

    slices
}

/// Chart points for a trend, sampled with a fixed stride when longer than
/// `max_points`.
pub fn line_series(
    points: &[CostTrendPoint],
    granularity: Granularity,
    max_points: Option<usize>,
) -> Vec<LinePoint> {
    let stride = match max_points {
        Some(max) if max > 0 && points.len() > max => points.len().div_ceil(max),
        _ => 1,
    };

    points
        .iter()
        .step_by(stride)
        .map(|p| LinePoint {
            date: p.date,
            cost: p.cost,
            formatted_date: format_date(p.date, granularity),
        })
        .collect()
}
