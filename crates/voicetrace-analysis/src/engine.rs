//! Analysis strategy selection
//!
//! Picks exactly one analysis pipeline for a file (remote batch job,
//! external diarizer, or whole-file fallback), runs it, and guarantees a
//! canonical result even on total failure. No error escapes this module:
//! every failure is folded into an `AnalysisResult` with the `error`
//! field set and a `debug` trail naming the stage reached.

use crate::diarization::{speaker_genders, DiarizerConfig, ExternalDiarizationEngine};
use crate::error::AnalysisError;
use crate::normalize;
use crate::pitch::{classify_gender, PitchConfig};
use crate::remote::{RemoteConfig, RemoteJobClient};
use crate::segmenter::{segment, SilenceConfig};
use crate::traits::DiarizationEngine;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use voicetrace_audio::{load_audio_file, DecodedAudio};
use voicetrace_types::AnalysisResult;

/// Synthetic speaker id used when no diarization ran
const FALLBACK_SPEAKER: &str = "SPEAKER_00";

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    /// Remote orchestrator settings; `None` disables the remote strategy
    pub remote: Option<RemoteConfig>,
    /// Pitch classifier tuning
    pub pitch: PitchConfig,
    /// Silence segmenter tuning
    pub silence: SilenceConfig,
    /// Diarization adapter settings
    pub diarizer: DiarizerConfig,
}

/// Analysis engine: one call in, one canonical result out
pub struct AnalysisEngine {
    config: AnalysisConfig,
    remote: Option<RemoteJobClient>,
}

impl AnalysisEngine {
    /// Create an engine; the remote strategy is enabled when configured
    pub fn new(config: AnalysisConfig) -> Self {
        let remote = config.remote.clone().map(RemoteJobClient::new);
        Self { config, remote }
    }

    /// Create an engine with an explicit remote client (used by tests to
    /// inject a mock transport)
    pub fn with_remote_client(config: AnalysisConfig, client: RemoteJobClient) -> Self {
        Self {
            config,
            remote: Some(client),
        }
    }

    /// Analyze one audio file. Never fails: analysis-time errors are
    /// reported inside the returned result.
    pub async fn analyze(&self, audio_path: &Path) -> AnalysisResult {
        let mut debug = BTreeMap::new();

        if !audio_path.is_file() {
            return failure_result(
                format!("audio file not found: {}", audio_path.display()),
                debug,
            );
        }

        if let Ok(meta) = std::fs::metadata(audio_path) {
            tracing::debug!("analyzing {} ({} bytes)", audio_path.display(), meta.len());
            debug.insert("fileSizeBytes".to_string(), json!(meta.len()));
        }

        let outcome = if let Some(client) = &self.remote {
            debug.insert("strategy".to_string(), json!("remote"));
            self.run_remote(client, audio_path, &mut debug).await
        } else {
            match ExternalDiarizationEngine::new(self.config.diarizer.clone()) {
                Ok(engine) => {
                    debug.insert("strategy".to_string(), json!("diarization"));
                    self.run_diarized(&engine, audio_path, &mut debug)
                }
                Err(reason) => {
                    let unavailable =
                        AnalysisError::CapabilityUnavailable(format!("{reason:#}"));
                    tracing::info!("{unavailable}; using single-speaker fallback");
                    debug.insert("strategy".to_string(), json!("fallback"));
                    self.run_fallback(audio_path, &mut debug)
                }
            }
        };

        match outcome {
            Ok(mut result) => {
                debug.append(&mut result.debug);
                result.debug = debug;
                result
            }
            Err(error) => {
                tracing::error!("analysis of {} failed: {error}", audio_path.display());
                failure_result(error.to_string(), debug)
            }
        }
    }

    async fn run_remote(
        &self,
        client: &RemoteJobClient,
        audio_path: &Path,
        debug: &mut BTreeMap<String, serde_json::Value>,
    ) -> Result<AnalysisResult, AnalysisError> {
        debug.insert("stage".to_string(), json!("submit"));
        let job_id = client.submit(audio_path).await?;
        debug.insert("jobId".to_string(), json!(job_id));

        debug.insert("stage".to_string(), json!("poll"));
        client.await_completion(&job_id).await?;

        debug.insert("stage".to_string(), json!("fetch"));
        let payload = client.fetch_predictions(&job_id).await?;

        debug.insert("stage".to_string(), json!("normalize"));
        let duration = load_audio_file(audio_path)
            .ok()
            .map(|audio| audio.duration_seconds());
        normalize::from_batch_predictions(&payload, duration)
    }

    fn run_diarized(
        &self,
        engine: &dyn DiarizationEngine,
        audio_path: &Path,
        debug: &mut BTreeMap<String, serde_json::Value>,
    ) -> Result<AnalysisResult, AnalysisError> {
        debug.insert("stage".to_string(), json!("decode"));
        let audio = decode(audio_path)?;

        debug.insert("stage".to_string(), json!("diarize"));
        let turns = engine
            .diarize(audio_path)
            .map_err(|e| AnalysisError::Diarization(format!("{e:#}")))?;

        debug.insert("stage".to_string(), json!("classify"));
        let speakers = speaker_genders(&audio, &turns, &self.config.pitch);

        debug.insert("stage".to_string(), json!("normalize"));
        Ok(normalize::from_speaker_turns(&turns, speakers))
    }

    fn run_fallback(
        &self,
        audio_path: &Path,
        debug: &mut BTreeMap<String, serde_json::Value>,
    ) -> Result<AnalysisResult, AnalysisError> {
        debug.insert("stage".to_string(), json!("decode"));
        let audio = decode(audio_path)?;

        debug.insert("stage".to_string(), json!("classify"));
        let gender = classify_gender(&audio.samples, audio.sample_rate, &self.config.pitch);

        debug.insert("stage".to_string(), json!("segment"));
        let spans = segment(&audio.samples, audio.sample_rate, &self.config.silence);

        debug.insert("stage".to_string(), json!("normalize"));
        Ok(normalize::from_silence_spans(
            &spans,
            FALLBACK_SPEAKER,
            gender,
            audio.duration_seconds(),
        ))
    }
}

fn decode(audio_path: &Path) -> Result<DecodedAudio, AnalysisError> {
    load_audio_file(audio_path).map_err(|e| AnalysisError::Decode(format!("{e:#}")))
}

fn failure_result(
    error: String,
    debug: BTreeMap<String, serde_json::Value>,
) -> AnalysisResult {
    AnalysisResult {
        error: Some(error),
        debug,
        ..Default::default()
    }
}
