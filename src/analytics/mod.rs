//! Pure cost analytics: aggregation, KPIs, chart shaping and formatting.

pub mod aggregate;
pub mod chart;
pub mod format;
pub mod kpi;
pub mod presets;

pub use aggregate::{summarize, SummaryOptions};
pub use presets::DateRangePreset;
