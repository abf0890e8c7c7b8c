use anyhow::Context;
use flightcore::dataflash::{
    BarometerRecord, BatteryRecord, GpsRecord, LogWriter, MotorOutputRecord, Record,
    VibrationRecord, MOTOR_COUNT,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

/// Upper bound on synthesized samples per channel (about 28 hours at 10 Hz).
pub const MAX_SAMPLES: usize = 1_000_000;

/// Configuration for synthesizing a DataFlash log of a short hover flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub duration_s: f64,
    pub rate_hz: f64,
    pub seed: u64,
    pub start_voltage: f64,
    pub end_voltage: f64,
    /// Voltage held during the sag window, if any.
    pub sag_voltage: Option<f64>,
    /// Fraction of the flight at which the sag starts.
    pub sag_at: f64,
    pub sag_samples: usize,
    pub current: f64,
    pub vibration_level: f64,
    pub vibration_noise: f64,
    /// Magnitude of a single vibration sample injected mid-flight.
    pub vibration_spike: Option<f64>,
    pub hover_pwm: f64,
    /// Per-motor offset from `hover_pwm`, in percent.
    pub motor_bias_pct: [f64; MOTOR_COUNT],
    pub pwm_noise: f64,
    pub hdop: f64,
    pub cruise_altitude: f64,
    pub description: Option<String>,
    pub scenario: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            duration_s: 60.0,
            rate_hz: 10.0,
            seed: 0,
            start_voltage: 12.6,
            end_voltage: 11.1,
            sag_voltage: None,
            sag_at: 0.5,
            sag_samples: 5,
            current: 12.0,
            vibration_level: 15.0,
            vibration_noise: 1.0,
            vibration_spike: None,
            hover_pwm: 1500.0,
            motor_bias_pct: [0.0; MOTOR_COUNT],
            pwm_noise: 10.0,
            hdop: 0.9,
            cruise_altitude: 30.0,
            description: None,
            scenario: None,
        }
    }
}

impl GeneratorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading generator config {}", path_ref.display()))?;
        let config: GeneratorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing generator config {}", path_ref.display()))?;
        Ok(config)
    }

    fn normalized_rate(&self) -> f64 {
        if self.rate_hz.is_finite() && self.rate_hz > 0.0 {
            self.rate_hz
        } else {
            1.0
        }
    }

    fn sample_count(&self) -> anyhow::Result<usize> {
        let samples = (self.duration_s * self.normalized_rate()).round();
        anyhow::ensure!(
            samples.is_finite() && samples >= 0.0 && samples <= MAX_SAMPLES as f64,
            "generator duration {}s at {}Hz exceeds {} samples",
            self.duration_s,
            self.rate_hz,
            MAX_SAMPLES
        );
        Ok((samples as usize).max(1))
    }

    fn sag_window(&self, samples: usize) -> Option<std::ops::Range<usize>> {
        self.sag_voltage?;
        let start = (self.sag_at.clamp(0.0, 1.0) * samples as f64) as usize;
        let start = start.min(samples.saturating_sub(1));
        Some(start..(start + self.sag_samples).min(samples))
    }
}

fn jitter(rng: &mut StdRng, amplitude: f64) -> f64 {
    if amplitude > 0.0 && amplitude.is_finite() {
        rng.gen_range(-amplitude..amplitude)
    } else {
        0.0
    }
}

fn build_samples(config: &GeneratorConfig) -> anyhow::Result<Vec<(u64, Vec<Record>)>> {
    let samples = config.sample_count()?;
    let rate = config.normalized_rate();
    let sag_window = config.sag_window(samples);
    let spike_index = samples / 2;
    let axis = 3f64.sqrt();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut frames = Vec::with_capacity(samples);

    for index in 0..samples {
        let time_us = (index as f64 / rate * 1_000_000.0).round() as u64;
        let progress = index as f64 / (samples.max(2) - 1) as f64;

        let voltage = match (&sag_window, config.sag_voltage) {
            (Some(window), Some(sag)) if window.contains(&index) => sag,
            _ => {
                config.start_voltage
                    + (config.end_voltage - config.start_voltage) * progress
                    + jitter(&mut rng, 0.02)
            }
        };
        let current = config.current + jitter(&mut rng, 0.5);

        let level = match config.vibration_spike {
            Some(spike) if index == spike_index => spike,
            _ => config.vibration_level + jitter(&mut rng, config.vibration_noise),
        };
        let per_axis = level.max(0.0) / axis;

        let mut channels = [None; MOTOR_COUNT];
        for (motor, bias) in channels.iter_mut().zip(config.motor_bias_pct.iter()) {
            let pwm = config.hover_pwm * (1.0 + bias / 100.0) + jitter(&mut rng, config.pwm_noise);
            *motor = Some(pwm.clamp(0.0, u16::MAX as f64));
        }

        let altitude = config.cruise_altitude * (PI * progress).sin();

        frames.push((
            time_us,
            vec![
                Record::Battery(BatteryRecord {
                    time_us,
                    voltage,
                    current,
                }),
                Record::Vibration(VibrationRecord {
                    vibe_x: per_axis,
                    vibe_y: per_axis,
                    vibe_z: per_axis,
                }),
                Record::Gps(GpsRecord {
                    hdop_raw: (config.hdop * 100.0).round(),
                }),
                Record::MotorOutput(MotorOutputRecord { channels }),
                Record::Barometer(BarometerRecord { altitude }),
            ],
        ));
    }

    Ok(frames)
}

pub fn build_log_from_config(config: &GeneratorConfig) -> anyhow::Result<Vec<u8>> {
    let frames = build_samples(config)?;
    let mut writer = LogWriter::new(Vec::new());
    for (time_us, records) in &frames {
        for record in records {
            writer
                .write_record(*time_us, record)
                .context("encoding synthetic record")?;
        }
    }
    Ok(writer.into_inner())
}

pub fn build_log(duration_s: f64, rate_hz: f64) -> anyhow::Result<Vec<u8>> {
    let config = GeneratorConfig {
        duration_s,
        rate_hz,
        ..Default::default()
    };
    build_log_from_config(&config)
}
