//! External diarization adapter
//!
//! Wraps a standalone diarizer binary as a subprocess (each call = new
//! process, no model state held in this process). The binary receives the
//! audio path and prints speaker turns as JSON on stdout. The capability
//! is optional: when no binary can be found, construction fails and the
//! strategy selector substitutes the single-speaker fallback.

use crate::pitch::{classify_gender, PitchConfig};
use crate::traits::DiarizationEngine;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use voicetrace_audio::DecodedAudio;
use voicetrace_types::{SpeakerInfo, SpeakerTurn};

/// Name of the diarizer binary searched on PATH
const DIARIZER_BINARY: &str = "voicetrace-diarizer";

/// Diarization adapter configuration
#[derive(Debug, Clone, Default)]
pub struct DiarizerConfig {
    /// Path to the diarizer binary (auto-detected if not set)
    pub binary_path: Option<String>,
}

/// JSON output of the diarizer binary
#[derive(Debug, Deserialize)]
struct DiarizerOutput {
    #[serde(default)]
    segments: Vec<DiarizerSegment>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiarizerSegment {
    speaker: String,
    start: f64,
    end: f64,
}

/// Subprocess-based speaker diarization engine
pub struct ExternalDiarizationEngine {
    binary_path: PathBuf,
}

impl ExternalDiarizationEngine {
    /// Create a new engine; fails when the diarizer binary is not present
    pub fn new(config: DiarizerConfig) -> Result<Self> {
        let binary_path = match config.binary_path {
            Some(ref path) => PathBuf::from(path),
            None => Self::find_binary()?,
        };

        if !binary_path.is_file() {
            anyhow::bail!("diarizer binary not found at {}", binary_path.display());
        }

        tracing::info!(
            "ExternalDiarizationEngine: using binary at {}",
            binary_path.display()
        );

        Ok(Self { binary_path })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(DiarizerConfig::default())
    }

    /// Locate the diarizer binary on PATH or next to the executable
    fn find_binary() -> Result<PathBuf> {
        if let Ok(path) = which::which(DIARIZER_BINARY) {
            return Ok(path);
        }

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        let candidates = [
            exe_dir.as_ref().map(|d| d.join(DIARIZER_BINARY)),
            Some(PathBuf::from(format!("resources/{DIARIZER_BINARY}"))),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file() {
                tracing::debug!("found {} at {}", DIARIZER_BINARY, candidate.display());
                return Ok(candidate);
            }
        }

        anyhow::bail!("{} not found on PATH or in known locations", DIARIZER_BINARY)
    }

    /// Check whether the capability is present in this environment
    pub fn is_available() -> bool {
        Self::find_binary().is_ok()
    }
}

impl DiarizationEngine for ExternalDiarizationEngine {
    fn name(&self) -> &str {
        "external"
    }

    fn diarize(&self, audio_path: &Path) -> Result<Vec<SpeakerTurn>> {
        let start_time = std::time::Instant::now();

        let output = Command::new(&self.binary_path)
            .arg("--audio")
            .arg(audio_path)
            .output()
            .context("Failed to start diarizer process")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("diarizer failed: {}", stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let turns = parse_diarizer_output(&stdout)?;

        tracing::info!(
            "diarized {} into {} turns in {:.2}s",
            audio_path.display(),
            turns.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(turns)
    }
}

/// Parse the diarizer's JSON output into ordered speaker turns
fn parse_diarizer_output(raw: &str) -> Result<Vec<SpeakerTurn>> {
    let output: DiarizerOutput =
        serde_json::from_str(raw).context("Failed to parse diarizer output")?;

    if let Some(error) = output.error {
        anyhow::bail!("diarizer error: {}", error);
    }

    let mut turns: Vec<SpeakerTurn> = output
        .segments
        .into_iter()
        .map(|s| SpeakerTurn {
            speaker: s.speaker,
            start: s.start,
            end: s.end.max(s.start),
        })
        .collect();

    // Turns are expected ordered by start; re-sort defensively
    turns.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));

    Ok(turns)
}

/// Classify each speaker's gender from its first encountered turn.
///
/// Every speaker appearing in `turns` gets an entry; turns too short for
/// pitch estimation are recorded as unknown rather than skipped.
pub fn speaker_genders(
    audio: &DecodedAudio,
    turns: &[SpeakerTurn],
    config: &PitchConfig,
) -> BTreeMap<String, SpeakerInfo> {
    let mut speakers = BTreeMap::new();
    for turn in turns {
        if speakers.contains_key(&turn.speaker) {
            continue;
        }
        let gender = classify_gender(turn_slice(audio, turn), audio.sample_rate, config);
        speakers.insert(turn.speaker.clone(), SpeakerInfo { gender });
    }
    speakers
}

fn turn_slice<'a>(audio: &'a DecodedAudio, turn: &SpeakerTurn) -> &'a [f32] {
    let rate = audio.sample_rate as f64;
    let len = audio.samples.len();
    let start = ((turn.start.max(0.0) * rate) as usize).min(len);
    let end = ((turn.end.max(0.0) * rate) as usize).clamp(start, len);
    &audio.samples[start..end]
}
