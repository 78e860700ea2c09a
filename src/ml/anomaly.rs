//! Z-score anomaly detection over a cost trend.
//! Each point is compared against the mean and spread of the window before it.

use crate::models::{CostTrendPoint, DetectedAnomaly, Severity};

const DEFAULT_WINDOW: usize = 14;
const MIN_Z_THRESHOLD: f64 = 1.5;

fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

pub struct AnomalyDetector {
    pub window_size: usize,
    pub z_threshold: f64,
}

impl AnomalyDetector {
    /// `sensitivity` in `[0, 1]` lowers the z-score threshold from 3.0 to 1.5.
    pub fn new(sensitivity: f64) -> Self {
        let sensitivity = if sensitivity.is_finite() { sensitivity.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            window_size: DEFAULT_WINDOW,
            z_threshold: (3.0 - sensitivity * 3.0).max(MIN_Z_THRESHOLD),
        }
    }

    pub fn with_window(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(2);
        self
    }

    pub fn detect(&self, data: &[f64]) -> Vec<DetectedAnomaly> {
        data.windows(self.window_size + 1)
            .enumerate()
            .filter_map(|(offset, span)| {
                let (window, value) = span.split_at(self.window_size);
                self.check(offset + self.window_size, window, value[0])
            })
            .collect()
    }

    fn check(&self, index: usize, window: &[f64], value: f64) -> Option<DetectedAnomaly> {
        let (mean, std_dev) = mean_and_std_dev(window);
        // A flat window has no spread to measure against.
        if std_dev < 0.001 {
            return None;
        }

        let z_score = (value - mean) / std_dev;
        if z_score.abs() <= self.z_threshold {
            return None;
        }

        let deviation = value - mean;
        let deviation_pct = if mean.abs() > 0.001 { deviation / mean * 100.0 } else { 0.0 };
        Some(DetectedAnomaly {
            index,
            date: None,
            value,
            expected: mean,
            deviation,
            deviation_pct,
            score: (z_score.abs() / 5.0).min(1.0),
            severity: Severity::from_deviation_pct(deviation_pct.abs()),
        })
    }

    /// Same as [`detect`](Self::detect), with each anomaly dated by its bucket.
    pub fn detect_in_trend(&self, trend: &[CostTrendPoint]) -> Vec<DetectedAnomaly> {
        let values: Vec<f64> = trend.iter().map(|p| p.cost).collect();
        self.detect(&values)
            .into_iter()
            .map(|mut a| {
                a.date = trend.get(a.index).map(|p| p.date);
                a
            })
            .collect()
    }
}
