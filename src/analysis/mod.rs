pub mod sharing;
pub mod telemetry;

pub use sharing::SharingReport;
pub use telemetry::{ChainStats, TelemetryReport};
