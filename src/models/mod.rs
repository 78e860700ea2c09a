pub mod anomaly;
pub mod budget;
pub mod chart;
pub mod cost;
pub mod types;

pub use anomaly::*;
pub use budget::*;
pub use chart::*;
pub use cost::*;
pub use types::*;
