//! Engine traits

use anyhow::Result;
use std::path::Path;
use voicetrace_types::SpeakerTurn;

/// Trait for speaker diarization engines
pub trait DiarizationEngine: Send + Sync {
    /// Engine name
    fn name(&self) -> &str;

    /// Diarize an audio file and return speaker turns ordered by start time
    fn diarize(&self, audio_path: &Path) -> Result<Vec<SpeakerTurn>>;
}
