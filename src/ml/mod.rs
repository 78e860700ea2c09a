pub mod anomaly;
pub mod forecast;
