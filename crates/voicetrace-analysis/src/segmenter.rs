//! Silence-based speech segmentation
//!
//! Partitions a waveform into alternating speech/pause intervals with an
//! amplitude-threshold method: short windows are marked silent below a
//! dBFS level, silent runs shorter than the minimum duration are absorbed
//! into the surrounding speech, and the resulting runs tile the full
//! duration with no gaps and no overlaps.

use voicetrace_types::{SegmentKind, TimedSpan};

/// Silence segmenter configuration
#[derive(Debug, Clone)]
pub struct SilenceConfig {
    /// Silent runs shorter than this are merged into adjacent speech (ms)
    pub min_silence_ms: u64,
    /// Windows below this level count as silent (dBFS)
    pub threshold_dbfs: f64,
    /// Analysis window length (ms)
    pub window_ms: u64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            min_silence_ms: 500,
            threshold_dbfs: -40.0,
            window_ms: 10,
        }
    }
}

/// Partition a waveform into speech/pause spans tiling `[0, duration]`.
///
/// Returns an empty vector only for empty input; otherwise the spans are
/// contiguous, start at 0.0, and end exactly at the waveform duration.
pub fn segment(samples: &[f32], sample_rate: u32, config: &SilenceConfig) -> Vec<TimedSpan> {
    if samples.is_empty() || sample_rate == 0 {
        return Vec::new();
    }

    let window = ((sample_rate as u64 * config.window_ms) / 1000).max(1) as usize;
    let duration = samples.len() as f64 / sample_rate as f64;

    let flags: Vec<bool> = samples
        .chunks(window)
        .map(|w| is_silent(w, config.threshold_dbfs))
        .collect();

    let window_ms = config.window_ms.max(1);
    let min_silence_windows = ((config.min_silence_ms + window_ms - 1) / window_ms).max(1) as usize;

    // Run-length encode the per-window flags
    let mut runs: Vec<(bool, usize)> = Vec::new();
    for &silent in &flags {
        match runs.last_mut() {
            Some((kind, count)) if *kind == silent => *count += 1,
            _ => runs.push((silent, 1)),
        }
    }

    // Brief dips mid-sentence do not fragment a speech segment
    for run in &mut runs {
        if run.0 && run.1 < min_silence_windows {
            run.0 = false;
        }
    }

    let mut spans: Vec<TimedSpan> = Vec::new();
    let mut window_idx = 0usize;
    for (silent, count) in runs {
        let start = window_idx as f64 * window as f64 / sample_rate as f64;
        window_idx += count;
        let end = if window_idx >= flags.len() {
            duration
        } else {
            window_idx as f64 * window as f64 / sample_rate as f64
        };
        let kind = if silent {
            SegmentKind::Pause
        } else {
            SegmentKind::Speech
        };
        match spans.last_mut() {
            Some(prev) if prev.kind == kind => prev.end = end,
            _ => spans.push(TimedSpan { kind, start, end }),
        }
    }

    spans
}

fn is_silent(window: &[f32], threshold_dbfs: f64) -> bool {
    if window.is_empty() {
        return true;
    }
    let rms = (window.iter().map(|s| (*s as f64) * (*s as f64)).sum::<f64>()
        / window.len() as f64)
        .sqrt();
    if rms <= 0.0 {
        return true;
    }
    20.0 * rms.log10() < threshold_dbfs
}
