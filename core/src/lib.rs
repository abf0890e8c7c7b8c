//! Post-flight analysis core for ArduPilot DataFlash logs.
//!
//! Data flows one way: bytes are decoded into typed records, records are
//! appended to per-channel time series, and independent detectors turn the
//! channels into anomaly reports. The crate performs no I/O of its own beyond
//! reading the log it is handed.

pub mod analysis;
pub mod dataflash;
pub mod detection;
pub mod math;
pub mod prelude;
pub mod summary;
pub mod telemetry;

pub use analysis::{AnalysisResult, Analyzer, FlightAnalysis};
pub use detection::AnomalyReport;
pub use prelude::{AnalysisConfig, AnalysisError, DecodeError, Detector};
pub use summary::FlightSummary;
pub use telemetry::{DecodeMetrics, FlightTelemetry};
