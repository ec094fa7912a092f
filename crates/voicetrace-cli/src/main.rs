//! VoiceTrace CLI
//!
//! Reads one audio path argument, runs the analysis engine, and prints
//! the serialized result on stdout. Logs go to stderr so stdout stays a
//! clean machine-readable channel for the calling pipeline.
//!
//! Analysis-time failures are reported inside the JSON result; only a
//! usage error exits non-zero.

use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voicetrace_analysis::{AnalysisConfig, AnalysisEngine, RemoteConfig};

#[tokio::main]
async fn main() {
    // Tracing to stderr (stdout carries the result)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(audio_path), None) = (args.next(), args.next()) else {
        eprintln!("Usage: voicetrace <audio-path>");
        std::process::exit(1);
    };

    let engine = AnalysisEngine::new(config_from_env());
    let result = engine.analyze(Path::new(&audio_path)).await;

    match serde_json::to_string(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("failed to serialize result: {e}");
            println!(
                "{}",
                serde_json::json!({
                    "speakers": {},
                    "segments": [],
                    "error": format!("failed to serialize result: {e}"),
                    "debug": {},
                })
            );
        }
    }
}

/// Build the engine configuration from process environment.
///
/// Credential retrieval stays here at the edge; the engine itself only
/// sees explicit configuration values.
fn config_from_env() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();

    match std::env::var("HUME_API_KEY") {
        Ok(api_key) if !api_key.is_empty() => {
            let mut remote = RemoteConfig::new(api_key);
            if let Some(secs) = env_seconds("HUME_ANALYZE_TIMEOUT") {
                remote.timeout = secs;
            }
            if let Some(secs) = env_seconds("HUME_ANALYZE_POLL_SECONDS") {
                remote.poll_interval = secs;
            }
            config.remote = Some(remote);
        }
        _ => {
            tracing::debug!("HUME_API_KEY not set, remote analysis disabled");
        }
    }

    if let Ok(binary) = std::env::var("VOICETRACE_DIARIZER") {
        if !binary.is_empty() {
            config.diarizer.binary_path = Some(binary);
        }
    }

    config
}

fn env_seconds(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<f64>() {
        Ok(secs) if secs > 0.0 && secs.is_finite() => Some(Duration::from_secs_f64(secs)),
        _ => {
            tracing::warn!("ignoring invalid {name}={raw:?}");
            None
        }
    }
}
