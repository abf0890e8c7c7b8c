use crate::detection::report::AnomalyReport;
use crate::math::stats::StatsHelper;
use crate::prelude::Detector;
use crate::telemetry::FlightTelemetry;

pub const MOTOR_IMBALANCE: &str = "motor_imbalance";

pub const INSUFFICIENT_MOTOR_DATA: &str = "Insufficient motor data";
pub const ZERO_MOTOR_AVERAGE: &str = "Insufficient motor data: average output is zero";
pub const MOTORS_BALANCED: &str = "All motors balanced";

/// Signed deviation of one motor from the fleet average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorDeviation {
    /// Zero-based motor index.
    pub index: usize,
    pub average: f64,
    pub deviation_pct: f64,
}

impl MotorDeviation {
    pub fn describe(&self) -> String {
        format!(
            "Motor {} is {:+.1}% from average",
            self.index + 1,
            self.deviation_pct
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImbalanceSummary {
    pub imbalanced: bool,
    pub message: String,
    /// Motors beyond the threshold, in index order.
    pub offenders: Vec<MotorDeviation>,
}

impl ImbalanceSummary {
    fn not_detected(message: &str) -> Self {
        Self {
            imbalanced: false,
            message: message.to_string(),
            offenders: Vec::new(),
        }
    }
}

/// Compares each motor's mean output against the mean of all motor means.
///
/// Motors without samples are left out. Fewer than two motors, or a fleet
/// average of zero, is reported as insufficient data instead of dividing.
pub fn detect_motor_imbalance<M>(motors: &[M], threshold_pct: f64) -> ImbalanceSummary
where
    M: AsRef<[f64]>,
{
    let averages: Vec<(usize, f64)> = motors
        .iter()
        .enumerate()
        .filter_map(|(index, samples)| Some((index, StatsHelper::mean(samples.as_ref())?)))
        .collect();

    if averages.len() < 2 {
        return ImbalanceSummary::not_detected(INSUFFICIENT_MOTOR_DATA);
    }

    let means: Vec<f64> = averages.iter().map(|&(_, average)| average).collect();
    let overall = match StatsHelper::mean(&means) {
        Some(overall) if overall != 0.0 && overall.is_finite() => overall,
        _ => return ImbalanceSummary::not_detected(ZERO_MOTOR_AVERAGE),
    };

    let offenders: Vec<MotorDeviation> = averages
        .into_iter()
        .map(|(index, average)| MotorDeviation {
            index,
            average,
            deviation_pct: (average - overall) / overall * 100.0,
        })
        .filter(|motor| motor.deviation_pct.abs() > threshold_pct)
        .collect();

    if offenders.is_empty() {
        return ImbalanceSummary::not_detected(MOTORS_BALANCED);
    }

    let message = offenders
        .iter()
        .map(MotorDeviation::describe)
        .collect::<Vec<_>>()
        .join("; ");
    ImbalanceSummary {
        imbalanced: true,
        message,
        offenders,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MotorImbalanceDetector {
    pub threshold_pct: f64,
}

impl Detector for MotorImbalanceDetector {
    fn name(&self) -> &'static str {
        MOTOR_IMBALANCE
    }

    fn detect(&self, telemetry: &FlightTelemetry) -> AnomalyReport {
        let summary = detect_motor_imbalance(&telemetry.motor_outputs, self.threshold_pct);
        let worst = summary
            .offenders
            .iter()
            .map(|motor| motor.deviation_pct)
            .reduce(|worst, pct| if pct.abs() > worst.abs() { pct } else { worst });
        AnomalyReport {
            detected: summary.imbalanced,
            count: summary.offenders.len(),
            extremum: worst,
            message: Some(summary.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Channel;

    fn motors(means: [f64; 4]) -> Vec<Vec<f64>> {
        // Two samples per motor averaging to the requested mean.
        means.iter().map(|&m| vec![m - 1.0, m + 1.0]).collect()
    }

    #[test]
    fn single_motor_is_insufficient() {
        let data: [Vec<f64>; 4] = [vec![], vec![1500.0, 1510.0], vec![], vec![]];
        let summary = detect_motor_imbalance(&data, 15.0);
        assert!(!summary.imbalanced);
        assert_eq!(summary.message, INSUFFICIENT_MOTOR_DATA);
    }

    #[test]
    fn balanced_fleet_uses_sentinel_message() {
        let summary = detect_motor_imbalance(&motors([1500.0, 1510.0, 1490.0, 1505.0]), 15.0);
        assert!(!summary.imbalanced);
        assert_eq!(summary.message, MOTORS_BALANCED);
    }

    #[test]
    fn deviations_are_relative_to_mean_of_means() {
        // overall average 12.5: motor 4 sits at +60%, the others at -20%.
        let data = motors([10.0, 10.0, 10.0, 20.0]);

        let summary = detect_motor_imbalance(&data, 25.0);
        assert!(summary.imbalanced);
        assert_eq!(summary.offenders.len(), 1);
        assert_eq!(summary.offenders[0].index, 3);
        assert_eq!(summary.message, "Motor 4 is +60.0% from average");

        let summary = detect_motor_imbalance(&data, 15.0);
        assert_eq!(summary.offenders.len(), 4);
        assert_eq!(
            summary.message,
            "Motor 1 is -20.0% from average; Motor 2 is -20.0% from average; \
             Motor 3 is -20.0% from average; Motor 4 is +60.0% from average"
        );
    }

    #[test]
    fn empty_motors_are_excluded_from_the_average() {
        // Padding motor 2 with zeros would drag the average to 750.
        let data: [Vec<f64>; 4] = [vec![1500.0], vec![], vec![1500.0], vec![1500.0]];
        let summary = detect_motor_imbalance(&data, 15.0);
        assert_eq!(summary.message, MOTORS_BALANCED);
    }

    #[test]
    fn zero_average_is_not_divided() {
        let data: [Vec<f64>; 4] = [vec![0.0], vec![0.0], vec![], vec![]];
        let summary = detect_motor_imbalance(&data, 15.0);
        assert!(!summary.imbalanced);
        assert_eq!(summary.message, ZERO_MOTOR_AVERAGE);

        let opposed: [Vec<f64>; 2] = [vec![-5.0], vec![5.0]];
        assert_eq!(
            detect_motor_imbalance(&opposed, 15.0).message,
            ZERO_MOTOR_AVERAGE
        );
    }

    #[test]
    fn detector_reports_worst_deviation() {
        let channels = motors([10.0, 10.0, 10.0, 20.0]);
        let telemetry = FlightTelemetry {
            motor_outputs: [
                Channel::from(channels[0].clone()),
                Channel::from(channels[1].clone()),
                Channel::from(channels[2].clone()),
                Channel::from(channels[3].clone()),
            ],
            ..Default::default()
        };
        let report = MotorImbalanceDetector {
            threshold_pct: 15.0,
        }
        .detect(&telemetry);

        assert!(report.detected);
        assert_eq!(report.count, 4);
        let worst = report.extremum.unwrap();
        assert!((worst - 60.0).abs() < 1e-9);
    }
}
