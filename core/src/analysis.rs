//! Runs decoding, aggregation and every detector for one log.

use crate::dataflash::Decoder;
use crate::detection::{
    AnomalyReport, MotorImbalanceDetector, VibrationSpikeDetector, VoltageSagDetector,
    MOTOR_IMBALANCE, VIBRATION_SPIKES, VOLTAGE_SAG,
};
use crate::prelude::{AnalysisConfig, AnalysisOutcome, Detector};
use crate::telemetry::{aggregate_decoded, DecodeMetrics, FlightTelemetry, LogManager};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::thread;

/// Detector name mapped to its report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    reports: BTreeMap<String, AnomalyReport>,
}

impl AnalysisResult {
    pub fn get(&self, detector: &str) -> Option<&AnomalyReport> {
        self.reports.get(detector)
    }

    pub fn voltage_sag(&self) -> Option<&AnomalyReport> {
        self.get(VOLTAGE_SAG)
    }

    pub fn vibration_spikes(&self) -> Option<&AnomalyReport> {
        self.get(VIBRATION_SPIKES)
    }

    pub fn motor_imbalance(&self) -> Option<&AnomalyReport> {
        self.get(MOTOR_IMBALANCE)
    }

    pub fn any_detected(&self) -> bool {
        self.reports.values().any(|report| report.detected)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnomalyReport)> {
        self.reports
            .iter()
            .map(|(name, report)| (name.as_str(), report))
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    fn insert(&mut self, detector: &str, report: AnomalyReport) {
        self.reports.insert(detector.to_string(), report);
    }
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightAnalysis {
    pub telemetry: FlightTelemetry,
    pub result: AnalysisResult,
    pub metrics: DecodeMetrics,
}

pub struct Analyzer {
    config: AnalysisConfig,
    parallel: bool,
    logger: LogManager,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> AnalysisOutcome<Self> {
        config.validate()?;
        Ok(Self {
            config,
            parallel: false,
            logger: LogManager::new("analysis"),
        })
    }

    /// Makes whole-log analyses use [`Analyzer::run_parallel`].
    pub fn with_parallel_detectors(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn detectors(&self) -> Vec<Box<dyn Detector>> {
        vec![
            Box::new(VoltageSagDetector {
                threshold: self.config.voltage_threshold,
            }),
            Box::new(VibrationSpikeDetector {
                z_threshold: self.config.z_threshold,
            }),
            Box::new(MotorImbalanceDetector {
                threshold_pct: self.config.imbalance_threshold_pct,
            }),
        ]
    }

    /// Runs every detector in turn over the same telemetry.
    pub fn run(&self, telemetry: &FlightTelemetry) -> AnalysisResult {
        let mut result = AnalysisResult::default();
        for detector in self.detectors() {
            let report = detector.detect(telemetry);
            self.log_report(detector.name(), &report);
            result.insert(detector.name(), report);
        }
        result
    }

    /// Runs one scoped thread per detector. A detector that panics reports
    /// "not detected" with a failure message; the others are unaffected.
    pub fn run_parallel(&self, telemetry: &FlightTelemetry) -> AnalysisResult {
        self.run_detectors_parallel(&self.detectors(), telemetry)
    }

    fn run_detectors_parallel(
        &self,
        detectors: &[Box<dyn Detector>],
        telemetry: &FlightTelemetry,
    ) -> AnalysisResult {
        let outcomes: Vec<(&'static str, thread::Result<AnomalyReport>)> =
            thread::scope(|scope| {
                let handles: Vec<_> = detectors
                    .iter()
                    .map(|detector| {
                        let name = detector.name();
                        (name, scope.spawn(move || detector.detect(telemetry)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(name, handle)| (name, handle.join()))
                    .collect()
            });

        let mut result = AnalysisResult::default();
        for (name, outcome) in outcomes {
            let report = outcome.unwrap_or_else(|_| {
                self.logger.warn(&format!("detector {} panicked", name));
                AnomalyReport::clear().with_message("detector failed")
            });
            self.log_report(name, &report);
            result.insert(name, report);
        }
        result
    }

    /// Decodes a log from `reader`, aggregates it and runs the detectors.
    pub fn analyze_reader<R: Read>(&self, reader: R) -> AnalysisOutcome<FlightAnalysis> {
        self.analyze_decoder(Decoder::new(reader))
    }

    pub fn analyze_file<P: AsRef<Path>>(&self, path: P) -> AnalysisOutcome<FlightAnalysis> {
        let path = path.as_ref();
        self.logger.record(&format!("analyzing {}", path.display()));
        self.analyze_decoder(Decoder::open(path)?)
    }

    fn analyze_decoder<R: Read>(&self, decoder: Decoder<R>) -> AnalysisOutcome<FlightAnalysis> {
        let (telemetry, metrics) = aggregate_decoded(decoder)?;
        let result = if self.parallel {
            self.run_parallel(&telemetry)
        } else {
            self.run(&telemetry)
        };
        Ok(FlightAnalysis {
            telemetry,
            result,
            metrics,
        })
    }

    fn log_report(&self, name: &str, report: &AnomalyReport) {
        self.logger.record(&format!(
            "{}: detected={} count={}",
            name, report.detected, report.count
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflash::{BatteryRecord, LogWriter, MotorOutputRecord, Record, VibrationRecord};
    use crate::prelude::{AnalysisError, DecodeError};
    use crate::telemetry::Channel;
    use std::io::{self, Cursor, Write};

    fn sample_telemetry() -> FlightTelemetry {
        let mut vibration = vec![10.0; 30];
        vibration.push(90.0);
        FlightTelemetry {
            timestamps: Channel::from(vec![0.0, 1.0, 2.0]),
            battery_voltage: Channel::from(vec![12.1, 7.0, 6.8]),
            battery_current: Channel::from(vec![5.0, 20.0, 22.0]),
            vibration: Channel::from(vibration),
            motor_outputs: [
                Channel::from(vec![1500.0]),
                Channel::from(vec![1500.0]),
                Channel::from(vec![1500.0]),
                Channel::from(vec![1900.0]),
            ],
            ..Default::default()
        }
    }

    fn analyzer() -> Analyzer {
        Analyzer::new(AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn result_has_one_report_per_detector() {
        let result = analyzer().run(&sample_telemetry());
        assert_eq!(result.len(), 3);

        let sag = result.voltage_sag().unwrap();
        assert_eq!((sag.count, sag.extremum), (2, Some(6.8)));

        let spikes = result.vibration_spikes().unwrap();
        assert_eq!((spikes.count, spikes.extremum), (1, Some(90.0)));

        let motors = result.motor_imbalance().unwrap();
        assert!(motors.detected);
        assert_eq!(
            motors.message.as_deref(),
            Some("Motor 4 is +18.8% from average")
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let telemetry = sample_telemetry();
        let analyzer = analyzer();
        assert_eq!(analyzer.run(&telemetry), analyzer.run(&telemetry));
    }

    #[test]
    fn parallel_run_matches_sequential_run() {
        let telemetry = sample_telemetry();
        let analyzer = analyzer();
        assert_eq!(analyzer.run_parallel(&telemetry), analyzer.run(&telemetry));
    }

    struct FaultyDetector;

    impl Detector for FaultyDetector {
        fn name(&self) -> &'static str {
            "faulty"
        }

        fn detect(&self, _telemetry: &FlightTelemetry) -> AnomalyReport {
            panic!("detector bug");
        }
    }

    #[test]
    fn panicking_detector_does_not_affect_the_others() {
        let telemetry = sample_telemetry();
        let analyzer = analyzer();
        let mut detectors = analyzer.detectors();
        detectors.insert(1, Box::new(FaultyDetector));

        let result = analyzer.run_detectors_parallel(&detectors, &telemetry);
        assert_eq!(result.len(), 4);
        assert_eq!(
            result.get("faulty"),
            Some(&AnomalyReport::clear().with_message("detector failed"))
        );

        let expected = analyzer.run(&telemetry);
        assert_eq!(result.voltage_sag(), expected.voltage_sag());
        assert_eq!(result.vibration_spikes(), expected.vibration_spikes());
        assert_eq!(result.motor_imbalance(), expected.motor_imbalance());
    }

    #[test]
    fn empty_telemetry_reports_nothing_detected() {
        let result = analyzer().run(&FlightTelemetry::default());
        assert!(!result.any_detected());
        assert_eq!(
            result.motor_imbalance().unwrap().message.as_deref(),
            Some("Insufficient motor data")
        );
    }

    #[test]
    fn caller_thresholds_are_honoured() {
        let config = AnalysisConfig::default()
            .with_voltage_threshold(6.9)
            .with_imbalance_threshold_pct(20.0);
        let result = Analyzer::new(config).unwrap().run(&sample_telemetry());
        assert_eq!(result.voltage_sag().unwrap().count, 1);
        assert!(!result.motor_imbalance().unwrap().detected);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = AnalysisConfig::default().with_z_threshold(f64::INFINITY);
        assert!(matches!(
            Analyzer::new(config),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn result_serializes_as_a_name_keyed_map() {
        let result = analyzer().run(&sample_telemetry());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["voltage_sag"]["count"], 2);
        assert_eq!(json["motor_imbalance"]["detected"], true);
    }

    fn synthetic_log() -> Vec<u8> {
        let mut writer = LogWriter::new(Vec::new());
        for (i, voltage) in [12.0, 11.5, 7.0].into_iter().enumerate() {
            let time_us = i as u64 * 100_000;
            writer
                .write_record(
                    time_us,
                    &Record::Battery(BatteryRecord {
                        time_us,
                        voltage,
                        current: 10.0,
                    }),
                )
                .unwrap();
            writer
                .write_record(
                    time_us,
                    &Record::Vibration(VibrationRecord {
                        vibe_x: 1.0,
                        vibe_y: 2.0,
                        vibe_z: 2.0,
                    }),
                )
                .unwrap();
            writer
                .write_record(
                    time_us,
                    &Record::MotorOutput(MotorOutputRecord {
                        channels: [Some(1500.0), Some(1500.0), Some(1500.0), Some(1500.0)],
                    }),
                )
                .unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn analyze_reader_runs_the_whole_pipeline() {
        let analysis = analyzer()
            .analyze_reader(Cursor::new(synthetic_log()))
            .unwrap();
        assert_eq!(analysis.telemetry.battery_voltage.len(), 3);
        assert_eq!(analysis.telemetry.vibration.as_slice(), &[3.0, 3.0, 3.0]);
        assert_eq!(analysis.metrics.records_decoded, 9);
        assert_eq!(analysis.result.voltage_sag().unwrap().count, 1);
        assert!(!analysis.result.vibration_spikes().unwrap().detected);
        assert_eq!(
            analysis.result.motor_imbalance().unwrap().message.as_deref(),
            Some("All motors balanced")
        );
    }

    #[test]
    fn parallel_analyzer_gives_the_same_result() {
        let sequential = analyzer()
            .analyze_reader(Cursor::new(synthetic_log()))
            .unwrap();
        let parallel = analyzer()
            .with_parallel_detectors(true)
            .analyze_reader(Cursor::new(synthetic_log()))
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn analyze_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&synthetic_log()).unwrap();
        let analysis = analyzer().analyze_file(file.path()).unwrap();
        assert_eq!(analysis.telemetry.timestamps.as_slice(), &[0.0, 0.1, 0.2]);
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn read_failure_is_distinct_from_a_clean_flight() {
        let outcome = analyzer().analyze_reader(BrokenReader);
        assert!(matches!(
            outcome,
            Err(AnalysisError::Decode(DecodeError::Io(_)))
        ));
    }
}
