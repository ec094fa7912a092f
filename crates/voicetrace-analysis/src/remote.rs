//! Hume expression-measurement batch API client
//!
//! Drives an asynchronous batch inference job to completion: submit the
//! audio file, poll the job status on a fixed interval under a deadline,
//! then fetch the raw prediction payload once. The payload's internal
//! shape is opaque here; extraction is the normalizer's job.
//!
//! Docs: https://dev.hume.ai/reference/expression-measurement-api/batch

use crate::error::AnalysisError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use voicetrace_types::{Job, JobStatus};

const HUME_BATCH_URL: &str = "https://api.hume.ai/v0/batch/jobs";

/// Remote orchestrator configuration
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API key for the batch endpoint (required)
    pub api_key: String,
    /// Batch jobs endpoint
    pub base_url: String,
    /// Also request transcription (adds per-segment text to the payload)
    pub transcription: bool,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Deadline for the whole polling phase
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Create a configuration with the given API key and default tuning
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: HUME_BATCH_URL.to_string(),
            transcription: true,
            poll_interval: Duration::from_millis(1500),
            timeout: Duration::from_secs(300),
        }
    }
}

/// One observed job state
#[derive(Debug, Clone)]
pub struct JobState {
    pub status: JobStatus,
    /// Provider message, populated on failure
    pub message: Option<String>,
}

/// Transport seam for the batch job API; mocked in tests
#[async_trait]
pub trait BatchJobTransport: Send + Sync {
    /// Upload the file and start a job, returning its id
    async fn submit_job(&self, audio_path: &Path) -> Result<String, AnalysisError>;

    /// Fetch the current job status
    async fn job_status(&self, job_id: &str) -> Result<JobState, AnalysisError>;

    /// Retrieve the raw prediction payload of a completed job
    async fn fetch_predictions(&self, job_id: &str) -> Result<serde_json::Value, AnalysisError>;
}

// ============================================================================
// HTTP transport
// ============================================================================

/// Submission acknowledgment
#[derive(Debug, Deserialize)]
struct SubmitAck {
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobDetails {
    state: Option<JobStateWire>,
}

#[derive(Debug, Deserialize)]
struct JobStateWire {
    status: Option<String>,
    message: Option<String>,
}

/// reqwest-backed transport
pub struct HttpBatchTransport {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl HttpBatchTransport {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/{}", self.config.base_url, job_id)
    }

    /// Model configuration sent alongside the file: prosody with speaker
    /// identification, plus transcription when enabled
    fn models_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "models": {
                "prosody": {
                    "identify_speakers": true,
                },
            },
        });
        if self.config.transcription {
            body["transcription"] = serde_json::json!({ "identify_speakers": true });
        }
        body
    }
}

#[async_trait]
impl BatchJobTransport for HttpBatchTransport {
    async fn submit_job(&self, audio_path: &Path) -> Result<String, AnalysisError> {
        if self.config.api_key.is_empty() {
            return Err(AnalysisError::Submission("API key is empty".to_string()));
        }

        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| AnalysisError::Submission(format!("failed to read audio file: {e}")))?;

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(guess_mime(audio_path))
            .map_err(|e| AnalysisError::Submission(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("json", self.models_json().to_string())
            .part("file", file_part);

        let response = self
            .client
            .post(&self.config.base_url)
            .header("X-Hume-Api-Key", &self.config.api_key)
            .multipart(form)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| AnalysisError::Submission(format!("upload failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Submission(format!("HTTP {status}: {body}")));
        }

        let ack: SubmitAck = response
            .json()
            .await
            .map_err(|e| AnalysisError::Submission(format!("malformed acknowledgment: {e}")))?;

        ack.job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AnalysisError::Submission("acknowledgment missing job identifier".to_string())
            })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobState, AnalysisError> {
        let response = self
            .client
            .get(self.job_url(job_id))
            .header("X-Hume-Api-Key", &self.config.api_key)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Transport(format!("HTTP {status}: {body}")));
        }

        let details: JobDetails = response
            .json()
            .await
            .map_err(|e| AnalysisError::Transport(format!("malformed status response: {e}")))?;

        let state = details.state.unwrap_or(JobStateWire {
            status: None,
            message: None,
        });
        Ok(JobState {
            status: state.status.as_deref().map_or(JobStatus::Pending, parse_status),
            message: state.message,
        })
    }

    async fn fetch_predictions(&self, job_id: &str) -> Result<serde_json::Value, AnalysisError> {
        let response = self
            .client
            .get(format!("{}/predictions", self.job_url(job_id)))
            .header("X-Hume-Api-Key", &self.config.api_key)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Transport(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisError::Transport(format!("malformed predictions: {e}")))
    }
}

/// Map a wire status string onto the job lifecycle; unrecognized strings
/// count as still pending so polling continues until the deadline
fn parse_status(raw: &str) -> JobStatus {
    match raw.to_ascii_uppercase().as_str() {
        "PENDING" | "QUEUED" => JobStatus::Pending,
        "RUNNING" | "IN_PROGRESS" => JobStatus::Running,
        "COMPLETED" => JobStatus::Completed,
        "FAILED" => JobStatus::Failed,
        "CANCELED" | "CANCELLED" => JobStatus::Canceled,
        other => {
            tracing::debug!("unrecognized job status {other:?}, treating as pending");
            JobStatus::Pending
        }
    }
}

/// Guess the upload MIME type from the file extension
fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "wav" | "wave" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" | "aac" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Client
// ============================================================================

/// Batch job orchestrator: submit, await completion, fetch predictions.
///
/// Owns its job exclusively for the duration of one analysis call.
pub struct RemoteJobClient {
    config: RemoteConfig,
    transport: Box<dyn BatchJobTransport>,
}

impl RemoteJobClient {
    /// Create a client over the HTTP transport
    pub fn new(config: RemoteConfig) -> Self {
        let transport = Box::new(HttpBatchTransport::new(config.clone()));
        Self { config, transport }
    }

    /// Create a client over a custom transport (used by tests)
    pub fn with_transport(config: RemoteConfig, transport: Box<dyn BatchJobTransport>) -> Self {
        Self { config, transport }
    }

    /// Upload the file and start a job
    pub async fn submit(&self, audio_path: &Path) -> Result<String, AnalysisError> {
        let job_id = self.transport.submit_job(audio_path).await?;
        tracing::info!("submitted batch job {job_id}");
        Ok(job_id)
    }

    /// Poll until the job completes, fails, or the deadline elapses.
    ///
    /// Transport errors while polling are transient and retried; a
    /// provider-reported failure is terminal immediately. The deadline is
    /// checked before each network call so a late poll is never issued.
    pub async fn await_completion(&self, job_id: &str) -> Result<(), AnalysisError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut job = Job {
            id: job_id.to_string(),
            status: JobStatus::Pending,
        };

        loop {
            if Instant::now() >= deadline {
                job.status = JobStatus::TimedOut;
                tracing::warn!("job {} timed out after {:?}", job.id, self.config.timeout);
                return Err(AnalysisError::JobTimeout(self.config.timeout));
            }

            match self.transport.job_status(&job.id).await {
                Ok(state) => {
                    job.status = state.status;
                    match state.status {
                        JobStatus::Completed => {
                            tracing::info!("job {} completed", job.id);
                            return Ok(());
                        }
                        JobStatus::Failed | JobStatus::Canceled => {
                            let message = state
                                .message
                                .unwrap_or_else(|| format!("job ended as {:?}", state.status));
                            return Err(AnalysisError::JobFailed(message));
                        }
                        _ => {
                            tracing::debug!("job {} still {:?}", job.id, job.status);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("poll failed, will retry: {e}");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Retrieve the raw prediction payload after completion was observed
    pub async fn fetch_predictions(
        &self,
        job_id: &str,
    ) -> Result<serde_json::Value, AnalysisError> {
        self.transport.fetch_predictions(job_id).await
    }
}
