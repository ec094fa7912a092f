//! Analysis engine for VoiceTrace
//!
//! Orchestrates speech analysis over one of three interchangeable
//! strategies and normalizes their very different output shapes into the
//! canonical `AnalysisResult`:
//!
//! - **Remote batch job**: submit/poll/fetch against the hosted
//!   expression-measurement API (speakers, gender, emotions, transcript)
//! - **External diarizer**: speaker turns from a local diarization
//!   binary, per-speaker gender from pitch
//! - **Whole-file fallback**: silence segmentation plus a single
//!   pitch-classified speaker
//!
//! The engine never lets an error escape: every failure degrades into a
//! serializable result with the `error` field set.

pub mod diarization;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod pitch;
pub mod remote;
pub mod segmenter;
pub mod traits;

pub use engine::{AnalysisConfig, AnalysisEngine};
pub use error::AnalysisError;
pub use pitch::{classify_gender, PitchConfig};
pub use remote::{BatchJobTransport, JobState, RemoteConfig, RemoteJobClient};
pub use segmenter::{segment, SilenceConfig};
