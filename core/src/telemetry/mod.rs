pub mod aggregator;
pub mod channels;
pub mod log;
pub mod metrics;

pub use aggregator::{aggregate, aggregate_decoded, TelemetryAggregator};
pub use channels::{Channel, FlightTelemetry};
pub use self::log::LogManager;
pub use metrics::{DecodeMetrics, MetricsRecorder};
