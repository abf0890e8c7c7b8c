use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use flightcore::prelude::AnalysisOutcome;
use flightcore::telemetry::MetricsRecorder;
use flightcore::{Analyzer, DecodeMetrics, FlightAnalysis, FlightSummary};
use serde_json::json;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub source: String,
    pub analysis: FlightAnalysis,
    pub summary: FlightSummary,
}

impl WorkflowResult {
    /// One JSON report line: source, detector reports, decode counters and,
    /// when asked for, the flight summary.
    pub fn to_report(&self, include_summary: bool) -> serde_json::Value {
        let mut report = json!({
            "source": self.source,
            "anomalies": self.analysis.result,
            "metrics": self.analysis.metrics,
        });
        if include_summary {
            report["summary"] = json!(self.summary);
        }
        report
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    analyzer: Arc<Analyzer>,
    metrics: Arc<MetricsRecorder>,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        let analyzer = Analyzer::new(config.to_analysis_config())
            .context("configuring analyzer")?
            .with_parallel_detectors(config.parallel_detectors);
        Ok(Self {
            config,
            analyzer: Arc::new(analyzer),
            metrics: Arc::new(MetricsRecorder::new()),
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn execute(&self, path: &Path) -> anyhow::Result<WorkflowResult> {
        let analysis = self.analyzer.analyze_file(path);
        self.finish(path.display().to_string(), analysis)
            .with_context(|| format!("analyzing {}", path.display()))
    }

    pub fn execute_bytes(&self, source: &str, bytes: &[u8]) -> anyhow::Result<WorkflowResult> {
        let analysis = self.analyzer.analyze_reader(Cursor::new(bytes));
        self.finish(source.to_string(), analysis)
            .with_context(|| format!("analyzing {}", source))
    }

    /// Analyzes independent logs on tokio's blocking pool. Results come back
    /// in input order; a failing log only fails its own entry.
    pub async fn execute_batch(
        &self,
        paths: Vec<PathBuf>,
    ) -> Vec<(PathBuf, anyhow::Result<WorkflowResult>)> {
        let mut handles = Vec::with_capacity(paths.len());
        for path in paths {
            let runner = self.clone();
            let task_path = path.clone();
            let handle = tokio::task::spawn_blocking(move || runner.execute(&task_path));
            handles.push((path, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.metrics.record_failure();
                    Err(anyhow::anyhow!(
                        "analysis task for {} did not complete: {}",
                        path.display(),
                        err
                    ))
                }
            };
            results.push((path, outcome));
        }
        results
    }

    /// `(logs analyzed, failed logs, merged decode counters)` so far.
    pub fn metrics(&self) -> (usize, usize, DecodeMetrics) {
        self.metrics.snapshot()
    }

    fn finish(
        &self,
        source: String,
        analysis: AnalysisOutcome<FlightAnalysis>,
    ) -> anyhow::Result<WorkflowResult> {
        let analysis = match analysis {
            Ok(analysis) => analysis,
            Err(err) => {
                self.metrics.record_failure();
                return Err(err.into());
            }
        };
        self.metrics.record_analyzed(&analysis.metrics);
        log::info!(
            "{}: {} records, anomalies detected: {}",
            source,
            analysis.metrics.records_decoded,
            analysis.result.any_detected()
        );

        let summary = FlightSummary::from_analysis(&analysis.telemetry, &analysis.result);
        Ok(WorkflowResult {
            source,
            analysis,
            summary,
        })
    }
}
