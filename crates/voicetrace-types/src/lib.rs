//! Shared types for VoiceTrace
//!
//! This crate contains the data structures shared across the VoiceTrace
//! crates, most importantly the canonical [`AnalysisResult`] that every
//! analysis strategy is normalized into and that the CLI serializes to
//! stdout as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Analysis Result
// ============================================================================

/// Canonical result of one analysis invocation.
///
/// This value always exists and is always serializable: analysis failures
/// are reported through the `error` field, never as an escaping error.
/// A result may carry both populated `segments` and a `debug` trail
/// (partial success), or an `error` alongside empty `speakers`/`segments`
/// (total failure).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Speaker id -> speaker metadata, for every speaker appearing in `segments`
    pub speakers: BTreeMap<String, SpeakerInfo>,
    /// Timed segments, sorted by start time (stable order on ties)
    pub segments: Vec<Segment>,
    /// Concatenated segment text, present only when a transcribing strategy ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// Per-segment emotion summary, present only when an emotion-scoring strategy ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<EmotionPoint>>,
    /// Analysis-time failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form diagnostic key/values (strategy picked, stage reached, job id, ...)
    #[serde(default)]
    pub debug: BTreeMap<String, serde_json::Value>,
}

/// Per-speaker metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerInfo {
    pub gender: Gender,
}

/// Inferred speaker gender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

// ============================================================================
// Segments
// ============================================================================

/// Segment kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Speech,
    Pause,
}

/// A speaker-attributed time interval
///
/// Invariant: `end >= start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Speaker id (always has a matching entry in `AnalysisResult::speakers`)
    pub speaker: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Segment kind
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    /// Transcribed text, when the strategy produced any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Raw emotion scores attached to this segment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<EmotionScore>>,
}

/// A single named emotion score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionScore {
    pub name: String,
    pub score: f64,
}

/// Per-segment emotion summary: the highest-scoring emotion observed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionPoint {
    pub speaker: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub dominant_emotion: String,
    /// Score of the dominant emotion, in [0, 1]
    pub confidence: f64,
}

// ============================================================================
// Speaker Turns & Silence Spans
// ============================================================================

/// Speaker turn from diarization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerTurn {
    /// Speaker id (e.g., "SPEAKER_00")
    pub speaker: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

/// Speech or pause interval from silence segmentation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimedSpan {
    pub kind: SegmentKind,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

// ============================================================================
// Remote Job Types
// ============================================================================

/// Remote batch job status
///
/// Transitions only move forward; a terminal status never reverts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
    TimedOut,
}

impl JobStatus {
    /// Whether the job can no longer make progress
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled | JobStatus::TimedOut
        )
    }
}

/// Remote batch job handle, ephemeral and owned by the orchestrator
/// for the duration of one analysis call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
}
