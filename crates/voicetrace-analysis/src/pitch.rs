//! Pitch-based gender estimation
//!
//! Estimates the mean fundamental frequency (F0) of the voiced frames in a
//! waveform and maps it to a gender label with a fixed threshold. Coarse
//! but deterministic; it is the gender source whenever no remote model
//! attached speaker metadata.

use voicetrace_types::Gender;

/// Analysis frame length in milliseconds
const FRAME_MS: usize = 40;

/// Frames quieter than this RMS level carry no usable pitch
const VOICED_RMS_FLOOR: f64 = 1e-3;

/// Minimum normalized autocorrelation peak for a frame to count as voiced
const MIN_PEAK_CORR: f64 = 0.5;

/// A lag qualifies as the period if its correlation reaches this fraction
/// of the frame peak; taking the smallest such lag avoids octave-down errors
const PERIOD_TOLERANCE: f64 = 0.95;

/// Pitch classifier configuration
#[derive(Debug, Clone)]
pub struct PitchConfig {
    /// Lower bound of the plausible voice band (Hz)
    pub min_hz: f32,
    /// Upper bound of the plausible voice band (Hz)
    pub max_hz: f32,
    /// Mean F0 strictly below this is labeled male, at or above female (Hz)
    pub threshold_hz: f32,
    /// Inputs shorter than this are too short to estimate F0 (ms)
    pub min_window_ms: u32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            min_hz: 60.0,
            max_hz: 400.0,
            threshold_hz: 165.0,
            min_window_ms: 100,
        }
    }
}

/// Classify a waveform's speaker gender from its mean fundamental frequency.
///
/// Total: returns `Gender::Unknown` for inputs that are too short, silent,
/// or unvoiced, and never panics.
pub fn classify_gender(samples: &[f32], sample_rate: u32, config: &PitchConfig) -> Gender {
    if sample_rate == 0 {
        return Gender::Unknown;
    }

    let min_len = (sample_rate as u64 * config.min_window_ms as u64 / 1000) as usize;
    if samples.len() < min_len.max(1) {
        return Gender::Unknown;
    }

    let frame_len = sample_rate as usize * FRAME_MS / 1000;
    if frame_len == 0 || samples.len() < frame_len {
        return Gender::Unknown;
    }
    let hop = (frame_len / 2).max(1);

    let mut estimates: Vec<f64> = Vec::new();
    let mut start = 0;
    while start + frame_len <= samples.len() {
        if let Some(f0) = frame_f0(&samples[start..start + frame_len], sample_rate, config) {
            estimates.push(f0);
        }
        start += hop;
    }

    if estimates.is_empty() {
        return Gender::Unknown;
    }

    let mean = estimates.iter().sum::<f64>() / estimates.len() as f64;
    tracing::debug!(
        "pitch: {} voiced frames, mean F0 {:.1} Hz",
        estimates.len(),
        mean
    );

    if mean < config.threshold_hz as f64 {
        Gender::Male
    } else {
        Gender::Female
    }
}

/// Estimate one frame's F0 via normalized autocorrelation, restricted to
/// the configured voice band. Returns `None` for silent or unvoiced frames.
fn frame_f0(frame: &[f32], sample_rate: u32, config: &PitchConfig) -> Option<f64> {
    let n = frame.len();

    let rms = (frame.iter().map(|s| (*s as f64) * (*s as f64)).sum::<f64>() / n as f64).sqrt();
    if rms < VOICED_RMS_FLOOR {
        return None;
    }

    let min_lag = ((sample_rate as f32 / config.max_hz) as usize).max(1);
    let max_lag = ((sample_rate as f32 / config.min_hz).ceil() as usize).min(n.saturating_sub(1));
    if max_lag <= min_lag {
        return None;
    }

    let mut corrs: Vec<f64> = Vec::with_capacity(max_lag - min_lag + 1);
    let mut peak = 0.0f64;
    for lag in min_lag..=max_lag {
        let m = n - lag;
        let mut dot = 0.0f64;
        let mut energy_a = 0.0f64;
        let mut energy_b = 0.0f64;
        for i in 0..m {
            let a = frame[i] as f64;
            let b = frame[i + lag] as f64;
            dot += a * b;
            energy_a += a * a;
            energy_b += b * b;
        }
        let corr = if energy_a > 0.0 && energy_b > 0.0 {
            dot / (energy_a.sqrt() * energy_b.sqrt())
        } else {
            0.0
        };
        corrs.push(corr);
        peak = peak.max(corr);
    }

    if peak < MIN_PEAK_CORR {
        return None;
    }

    let cutoff = peak * PERIOD_TOLERANCE;
    for (i, &corr) in corrs.iter().enumerate() {
        if corr >= cutoff {
            let f0 = sample_rate as f64 / (min_lag + i) as f64;
            if f0 >= config.min_hz as f64 && f0 <= config.max_hz as f64 {
                return Some(f0);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 16000;

    fn sine(freq: f32, seconds: f32) -> Vec<f32> {
        let count = (seconds * SAMPLE_RATE as f32) as usize;
        (0..count)
            .map(|i| {
                (i as f32 * 2.0 * std::f32::consts::PI * freq / SAMPLE_RATE as f32).sin() * 0.5
            })
            .collect()
    }

    #[test]
    fn low_pitch_is_male() {
        let samples = sine(150.0, 1.0);
        assert_eq!(
            classify_gender(&samples, SAMPLE_RATE, &PitchConfig::default()),
            Gender::Male
        );
    }

    #[test]
    fn high_pitch_is_female() {
        let samples = sine(220.0, 1.0);
        assert_eq!(
            classify_gender(&samples, SAMPLE_RATE, &PitchConfig::default()),
            Gender::Female
        );
    }

    #[test]
    fn short_input_is_unknown() {
        // 50 ms is below the 100 ms minimum viable window
        let samples = sine(150.0, 0.05);
        assert_eq!(
            classify_gender(&samples, SAMPLE_RATE, &PitchConfig::default()),
            Gender::Unknown
        );
    }

    #[test]
    fn silence_is_unknown() {
        let samples = vec![0.0f32; SAMPLE_RATE as usize];
        assert_eq!(
            classify_gender(&samples, SAMPLE_RATE, &PitchConfig::default()),
            Gender::Unknown
        );
    }

    #[test]
    fn noise_is_unknown() {
        // Deterministic pseudo-noise has no periodic structure in the voice band
        let mut state = 0x2545F4914F6CDD1Du64;
        let samples: Vec<f32> = (0..SAMPLE_RATE as usize)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
            })
            .collect();
        assert_eq!(
            classify_gender(&samples, SAMPLE_RATE, &PitchConfig::default()),
            Gender::Unknown
        );
    }

    #[test]
    fn empty_and_zero_rate_are_unknown() {
        assert_eq!(
            classify_gender(&[], SAMPLE_RATE, &PitchConfig::default()),
            Gender::Unknown
        );
        assert_eq!(
            classify_gender(&sine(150.0, 1.0), 0, &PitchConfig::default()),
            Gender::Unknown
        );
    }

    #[test]
    fn threshold_is_configurable() {
        let config = PitchConfig {
            threshold_hz: 140.0,
            ..PitchConfig::default()
        };
        // 150 Hz sits above a lowered threshold
        assert_eq!(
            classify_gender(&sine(150.0, 1.0), SAMPLE_RATE, &config),
            Gender::Female
        );
    }
}
