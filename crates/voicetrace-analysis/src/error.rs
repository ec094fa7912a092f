//! Engine error taxonomy
//!
//! Every variant is caught at the strategy-selector boundary and folded
//! into the uniform result shape; none terminates the process.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the analysis components
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Remote job could not be started (credentials, transport, malformed ack)
    #[error("job submission failed: {0}")]
    Submission(String),

    /// Provider reported terminal failure or cancellation
    #[error("remote job failed: {0}")]
    JobFailed(String),

    /// Deadline elapsed while polling the remote job
    #[error("remote job timed out after {}s", .0.as_secs())]
    JobTimeout(Duration),

    /// Transient transport failure while polling or fetching
    #[error("transport error: {0}")]
    Transport(String),

    /// Diarization capability not present in this environment; recoverable,
    /// the selector falls back instead of surfacing it
    #[error("diarization capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Diarizer ran but did not produce usable turns
    #[error("diarization failed: {0}")]
    Diarization(String),

    /// Raw prediction payload missing expected structure
    #[error("prediction payload missing expected structure: {0}")]
    Extraction(String),

    /// Audio file could not be decoded
    #[error("audio decode failed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_stage() {
        let err = AnalysisError::Submission("connection refused".to_string());
        assert!(err.to_string().contains("submission"));

        let err = AnalysisError::JobTimeout(Duration::from_secs(300));
        assert!(err.to_string().contains("300"));
    }
}
