use crate::workflow::runner::WorkflowResult;
use flightcore::{AnalysisResult, DecodeMetrics, FlightSummary, FlightTelemetry};
use serde::{Deserialize, Serialize};

/// Latest analysis as served to dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisualizationModel {
    pub source: Option<String>,
    pub telemetry: FlightTelemetry,
    pub result: AnalysisResult,
    pub summary: Option<FlightSummary>,
    pub metrics: DecodeMetrics,
}

impl From<&WorkflowResult> for VisualizationModel {
    fn from(result: &WorkflowResult) -> Self {
        Self {
            source: Some(result.source.clone()),
            telemetry: result.analysis.telemetry.clone(),
            result: result.analysis.result.clone(),
            summary: Some(result.summary.clone()),
            metrics: result.analysis.metrics,
        }
    }
}
