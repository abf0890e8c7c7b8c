pub struct StatsHelper;

impl StatsHelper {
    /// Arithmetic mean, `None` for an empty slice.
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Population standard deviation (divides by `n`, not `n - 1`).
    pub fn population_std(samples: &[f64]) -> Option<f64> {
        let mean = Self::mean(samples)?;
        let sum_sq: f64 = samples.iter().map(|&v| (v - mean) * (v - mean)).sum();
        Some((sum_sq / samples.len() as f64).sqrt())
    }

    pub fn min(samples: &[f64]) -> Option<f64> {
        samples.iter().copied().reduce(f64::min)
    }

    pub fn max(samples: &[f64]) -> Option<f64> {
        samples.iter().copied().reduce(f64::max)
    }

    /// Rounds to two decimal places for presentation payloads.
    pub fn round2(value: f64) -> f64 {
        (value * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_has_no_statistics() {
        assert_eq!(StatsHelper::mean(&[]), None);
        assert_eq!(StatsHelper::population_std(&[]), None);
        assert_eq!(StatsHelper::min(&[]), None);
        assert_eq!(StatsHelper::max(&[]), None);
    }

    #[test]
    fn population_std_divides_by_count() {
        // Sample std of this set would be ~2.138; population std is exactly 2.
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(StatsHelper::mean(&samples), Some(5.0));
        assert_eq!(StatsHelper::population_std(&samples), Some(2.0));
    }

    #[test]
    fn constant_sequence_has_zero_spread() {
        assert_eq!(StatsHelper::population_std(&[3.5, 3.5, 3.5]), Some(0.0));
    }

    #[test]
    fn extrema_and_rounding() {
        assert_eq!(StatsHelper::min(&[3.0, -1.0, 2.0]), Some(-1.0));
        assert_eq!(StatsHelper::max(&[3.0, -1.0, 2.0]), Some(3.0));
        assert_eq!(StatsHelper::round2(7.456), 7.46);
    }
}
