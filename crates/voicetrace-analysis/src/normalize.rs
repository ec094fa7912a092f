//! Result normalization
//!
//! Flattens the very different output shapes of the analysis strategies
//! (remote prediction payloads, diarized speaker turns, silence spans)
//! into the canonical `AnalysisResult`. Every path ends with a stable
//! sort of the segments by start time and a completeness pass that gives
//! each speaker id appearing in `segments` an entry in `speakers`.

use crate::error::AnalysisError;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use voicetrace_types::{
    AnalysisResult, EmotionPoint, EmotionScore, Gender, Segment, SegmentKind, SpeakerInfo,
    SpeakerTurn, TimedSpan,
};

/// Metadata keys that may carry a speaker's gender, anywhere in the payload
const GENDER_KEYS: &[&str] = &["gender", "speaker_gender", "bio_gender"];

/// Recursion bound for the payload walks; provider payloads are nested but
/// not unboundedly so
const MAX_SEARCH_DEPTH: usize = 16;

/// Normalize a raw batch prediction payload.
///
/// The payload shape varies by provider feature set; this walks it
/// generically for prediction groups instead of binding to one schema.
/// When extraction yields nothing but the file duration is known, a single
/// whole-file segment is emitted so downstream consumers can always assume
/// at least one segment on success.
pub fn from_batch_predictions(
    payload: &Value,
    duration: Option<f64>,
) -> Result<AnalysisResult, AnalysisError> {
    let mut groups = Vec::new();
    collect_groups(payload, 0, &mut groups);

    let mut speakers: BTreeMap<String, SpeakerInfo> = BTreeMap::new();
    let mut segments: Vec<Segment> = Vec::new();

    for group in &groups {
        let speaker_id = group_speaker_id(group);

        // First group seen for a speaker decides its gender
        speakers
            .entry(speaker_id.clone())
            .or_insert_with(|| SpeakerInfo {
                gender: search_gender(group, 0).unwrap_or(Gender::Unknown),
            });

        let Some(chunks) = group.get("predictions").and_then(Value::as_array) else {
            continue;
        };
        for chunk in chunks {
            let Some((start, end)) = chunk_time(chunk) else {
                continue;
            };
            segments.push(Segment {
                speaker: speaker_id.clone(),
                start,
                end,
                kind: SegmentKind::Speech,
                text: chunk.get("text").and_then(Value::as_str).map(str::to_string),
                emotions: chunk_emotions(chunk),
            });
        }
    }

    if segments.is_empty() {
        let Some(duration) = duration else {
            return Err(AnalysisError::Extraction(
                "payload contained no predictions and the file duration is unknown".to_string(),
            ));
        };
        tracing::warn!("payload contained no predictions, emitting whole-file segment");
        segments.push(Segment {
            speaker: "unknown".to_string(),
            start: 0.0,
            end: duration.max(0.0),
            kind: SegmentKind::Speech,
            text: None,
            emotions: None,
        });
    }

    sort_segments(&mut segments);

    let transcript = build_transcript(&segments);
    let emotions = build_emotion_overview(&segments);

    let mut result = AnalysisResult {
        speakers,
        segments,
        transcript,
        emotions,
        ..Default::default()
    };
    ensure_speaker_entries(&mut result);
    Ok(result)
}

/// Normalize diarized speaker turns with per-speaker gender metadata
pub fn from_speaker_turns(
    turns: &[SpeakerTurn],
    speakers: BTreeMap<String, SpeakerInfo>,
) -> AnalysisResult {
    let mut segments: Vec<Segment> = turns
        .iter()
        .map(|turn| Segment {
            speaker: turn.speaker.clone(),
            start: turn.start,
            end: turn.end.max(turn.start),
            kind: SegmentKind::Speech,
            text: None,
            emotions: None,
        })
        .collect();

    sort_segments(&mut segments);

    let mut result = AnalysisResult {
        speakers,
        segments,
        ..Default::default()
    };
    ensure_speaker_entries(&mut result);
    result
}

/// Normalize the single-speaker fallback: the segmenter's speech/pause
/// tiling attributed to one synthetic speaker
pub fn from_silence_spans(
    spans: &[TimedSpan],
    speaker_id: &str,
    gender: Gender,
    duration: f64,
) -> AnalysisResult {
    let mut segments: Vec<Segment> = spans
        .iter()
        .map(|span| Segment {
            speaker: speaker_id.to_string(),
            start: span.start,
            end: span.end,
            kind: span.kind,
            text: None,
            emotions: None,
        })
        .collect();

    if segments.is_empty() {
        segments.push(Segment {
            speaker: speaker_id.to_string(),
            start: 0.0,
            end: duration.max(0.0),
            kind: SegmentKind::Speech,
            text: None,
            emotions: None,
        });
    }

    sort_segments(&mut segments);

    let mut speakers = BTreeMap::new();
    speakers.insert(speaker_id.to_string(), SpeakerInfo { gender });

    AnalysisResult {
        speakers,
        segments,
        ..Default::default()
    }
}

/// Stable sort by start time; discovery order breaks ties
pub fn sort_segments(segments: &mut [Segment]) {
    segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));
}

/// Every speaker id in `segments` must have an entry in `speakers`
pub fn ensure_speaker_entries(result: &mut AnalysisResult) {
    let AnalysisResult {
        speakers, segments, ..
    } = result;
    for segment in segments.iter() {
        speakers
            .entry(segment.speaker.clone())
            .or_insert(SpeakerInfo {
                gender: Gender::Unknown,
            });
    }
}

/// Find prediction groups (arrays under a `grouped_predictions` key)
/// anywhere in the payload, to a bounded depth
fn collect_groups<'a>(value: &'a Value, depth: usize, out: &mut Vec<&'a Value>) {
    if depth > MAX_SEARCH_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(groups)) = map.get("grouped_predictions") {
                out.extend(groups.iter());
            }
            for nested in map.values() {
                collect_groups(nested, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_groups(item, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Speaker id from an explicit speaker field, then the track identifier,
/// then the group id; "unknown" only as a last resort
fn group_speaker_id(group: &Value) -> String {
    group
        .get("speaker")
        .and_then(Value::as_str)
        .or_else(|| {
            group
                .get("track")
                .and_then(|t| t.get("id"))
                .and_then(Value::as_str)
        })
        .or_else(|| group.get("id").and_then(Value::as_str))
        .unwrap_or("unknown")
        .to_string()
}

/// Bounded-depth search for a gender key holding a recognizable value;
/// first match wins
fn search_gender(value: &Value, depth: usize) -> Option<Gender> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if GENDER_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                    if let Value::String(raw) = nested {
                        match raw.to_ascii_lowercase().as_str() {
                            "male" => return Some(Gender::Male),
                            "female" => return Some(Gender::Female),
                            _ => {}
                        }
                    }
                }
            }
            for nested in map.values() {
                if let Some(gender) = search_gender(nested, depth + 1) {
                    return Some(gender);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Some(gender) = search_gender(item, depth + 1) {
                    return Some(gender);
                }
            }
        }
        _ => {}
    }
    None
}

/// Chunk interval from its `time` object; providers use `start`/`end` or
/// `begin`/`end`. Chunks without a usable start are dropped.
fn chunk_time(chunk: &Value) -> Option<(f64, f64)> {
    let time = chunk.get("time")?;
    let start = time
        .get("start")
        .or_else(|| time.get("begin"))
        .and_then(Value::as_f64)?;
    let end = time.get("end").and_then(Value::as_f64).unwrap_or(start);
    Some((start, end.max(start)))
}

fn chunk_emotions(chunk: &Value) -> Option<Vec<EmotionScore>> {
    let list = chunk.get("emotions")?.as_array()?;
    let scores: Vec<EmotionScore> = list
        .iter()
        .filter_map(|entry| {
            Some(EmotionScore {
                name: entry.get("name")?.as_str()?.to_string(),
                score: entry.get("score")?.as_f64()?,
            })
        })
        .collect();
    if scores.is_empty() {
        None
    } else {
        Some(scores)
    }
}

/// Trimmed, space-joined non-empty segment texts, in segment order
fn build_transcript(segments: &[Segment]) -> Option<String> {
    let parts: Vec<&str> = segments
        .iter()
        .filter_map(|s| s.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Per-segment dominant emotion summary; omitted when no segment carries
/// emotion data
fn build_emotion_overview(segments: &[Segment]) -> Option<Vec<EmotionPoint>> {
    let mut points = Vec::new();
    for segment in segments {
        let Some(emotions) = &segment.emotions else {
            continue;
        };
        let Some(strongest) = emotions
            .iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
        else {
            continue;
        };
        points.push(EmotionPoint {
            speaker: segment.speaker.clone(),
            start: segment.start,
            end: segment.end,
            dominant_emotion: strongest.name.clone(),
            confidence: strongest.score.clamp(0.0, 1.0),
        });
    }
    if points.is_empty() {
        None
    } else {
        Some(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A representative payload: the prosody groups sit several levels
    /// deep, one group names its speaker and gender, the other only has
    /// a track id
    fn sample_payload() -> Value {
        json!([
            {
                "results": {
                    "predictions": [
                        {
                            "models": {
                                "prosody": {
                                    "grouped_predictions": [
                                        {
                                            "speaker": "speaker_1",
                                            "speaker_info": { "gender": "Female" },
                                            "predictions": [
                                                {
                                                    "time": { "begin": 3.0, "end": 4.5 },
                                                    "text": " and welcome back ",
                                                    "emotions": [
                                                        { "name": "Calmness", "score": 0.4 },
                                                        { "name": "Joy", "score": 0.7 }
                                                    ]
                                                },
                                                {
                                                    "time": { "begin": 0.0, "end": 1.5 },
                                                    "text": "hello everyone",
                                                    "emotions": [
                                                        { "name": "Joy", "score": 0.9 }
                                                    ]
                                                }
                                            ]
                                        },
                                        {
                                            "track": { "id": "track-7" },
                                            "predictions": [
                                                {
                                                    "time": { "begin": 1.5, "end": 3.0 },
                                                    "text": "thanks",
                                                    "emotions": []
                                                }
                                            ]
                                        }
                                    ]
                                }
                            }
                        }
                    ]
                }
            }
        ])
    }

    #[test]
    fn extracts_speakers_segments_and_metadata() {
        let result = from_batch_predictions(&sample_payload(), Some(10.0)).unwrap();

        assert_eq!(result.speakers.len(), 2);
        assert_eq!(result.speakers["speaker_1"].gender, Gender::Female);
        assert_eq!(result.speakers["track-7"].gender, Gender::Unknown);

        // Sorted by start, not discovery order
        assert_eq!(result.segments.len(), 3);
        assert_eq!(result.segments[0].start, 0.0);
        assert_eq!(result.segments[1].start, 1.5);
        assert_eq!(result.segments[2].start, 3.0);
        assert_eq!(result.segments[1].speaker, "track-7");

        // Transcript follows sorted segment order, trimmed and joined
        assert_eq!(
            result.transcript.as_deref(),
            Some("hello everyone thanks and welcome back")
        );

        // Dominant emotion per emotion-bearing segment
        let emotions = result.emotions.unwrap();
        assert_eq!(emotions.len(), 2);
        assert_eq!(emotions[0].dominant_emotion, "Joy");
        assert_eq!(emotions[0].confidence, 0.9);
        assert_eq!(emotions[1].start, 3.0);
        assert_eq!(emotions[1].dominant_emotion, "Joy");

        assert!(result.error.is_none());
    }

    #[test]
    fn empty_payload_with_duration_yields_whole_file_segment() {
        let result = from_batch_predictions(&json!([]), Some(12.5)).unwrap();

        assert_eq!(result.segments.len(), 1);
        let segment = &result.segments[0];
        assert_eq!(segment.speaker, "unknown");
        assert_eq!(segment.start, 0.0);
        assert_eq!(segment.end, 12.5);
        assert_eq!(segment.kind, SegmentKind::Speech);
        assert_eq!(result.speakers["unknown"].gender, Gender::Unknown);
        assert!(result.transcript.is_none());
        assert!(result.emotions.is_none());
    }

    #[test]
    fn empty_payload_without_duration_is_an_extraction_error() {
        let err = from_batch_predictions(&json!({}), None).unwrap_err();
        assert!(matches!(err, AnalysisError::Extraction(_)));
    }

    #[test]
    fn chunks_without_time_are_dropped() {
        let payload = json!({
            "grouped_predictions": [
                {
                    "id": "g1",
                    "predictions": [
                        { "text": "no time info" },
                        { "time": { "start": 1.0, "end": 2.0 }, "text": "kept" }
                    ]
                }
            ]
        });
        let result = from_batch_predictions(&payload, Some(5.0)).unwrap();
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].text.as_deref(), Some("kept"));
        assert_eq!(result.segments[0].speaker, "g1");
    }

    #[test]
    fn inverted_chunk_time_is_clamped() {
        let payload = json!({
            "grouped_predictions": [
                { "predictions": [ { "time": { "start": 3.0, "end": 1.0 } } ] }
            ]
        });
        let result = from_batch_predictions(&payload, Some(5.0)).unwrap();
        assert_eq!(result.segments[0].start, 3.0);
        assert_eq!(result.segments[0].end, 3.0);
    }

    #[test]
    fn gender_search_matches_alternate_keys() {
        assert_eq!(
            search_gender(&json!({ "meta": { "speaker_gender": "male" } }), 0),
            Some(Gender::Male)
        );
        assert_eq!(
            search_gender(&json!([{ "bio_gender": "FEMALE" }]), 0),
            Some(Gender::Female)
        );
        assert_eq!(
            search_gender(&json!({ "gender": "other" }), 0),
            None
        );
        assert_eq!(search_gender(&json!({ "gender": 1 }), 0), None);
    }

    #[test]
    fn gender_search_is_depth_bounded() {
        let mut value = json!({ "gender": "male" });
        for _ in 0..(MAX_SEARCH_DEPTH + 2) {
            value = json!({ "nested": value });
        }
        assert_eq!(search_gender(&value, 0), None);
    }

    #[test]
    fn turns_missing_speaker_metadata_get_unknown_entries() {
        let turns = vec![
            SpeakerTurn {
                speaker: "SPEAKER_01".to_string(),
                start: 1.0,
                end: 2.0,
            },
            SpeakerTurn {
                speaker: "SPEAKER_00".to_string(),
                start: 0.0,
                end: 1.0,
            },
        ];
        let mut known = BTreeMap::new();
        known.insert(
            "SPEAKER_00".to_string(),
            SpeakerInfo {
                gender: Gender::Male,
            },
        );

        let result = from_speaker_turns(&turns, known);

        assert_eq!(result.segments[0].speaker, "SPEAKER_00");
        assert_eq!(result.speakers["SPEAKER_00"].gender, Gender::Male);
        assert_eq!(result.speakers["SPEAKER_01"].gender, Gender::Unknown);
    }

    #[test]
    fn fallback_attributes_all_spans_to_the_synthetic_speaker() {
        let spans = vec![
            TimedSpan {
                kind: SegmentKind::Speech,
                start: 0.0,
                end: 4.0,
            },
            TimedSpan {
                kind: SegmentKind::Pause,
                start: 4.0,
                end: 10.0,
            },
        ];
        let result = from_silence_spans(&spans, "SPEAKER_00", Gender::Male, 10.0);

        assert_eq!(result.segments.len(), 2);
        assert!(result.segments.iter().all(|s| s.speaker == "SPEAKER_00"));
        assert_eq!(result.segments[1].kind, SegmentKind::Pause);
        assert_eq!(result.speakers["SPEAKER_00"].gender, Gender::Male);
        assert!(result.error.is_none());
    }

    #[test]
    fn fallback_with_no_spans_covers_the_whole_file() {
        let result = from_silence_spans(&[], "SPEAKER_00", Gender::Unknown, 7.5);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].end, 7.5);
        assert_eq!(result.segments[0].kind, SegmentKind::Speech);
    }

    #[test]
    fn sort_is_stable_on_equal_starts() {
        let mut segments = vec![
            Segment {
                speaker: "a".to_string(),
                start: 1.0,
                end: 2.0,
                kind: SegmentKind::Speech,
                text: Some("first".to_string()),
                emotions: None,
            },
            Segment {
                speaker: "b".to_string(),
                start: 1.0,
                end: 3.0,
                kind: SegmentKind::Speech,
                text: Some("second".to_string()),
                emotions: None,
            },
            Segment {
                speaker: "c".to_string(),
                start: 0.5,
                end: 1.0,
                kind: SegmentKind::Speech,
                text: None,
                emotions: None,
            },
        ];
        sort_segments(&mut segments);
        assert_eq!(segments[0].speaker, "c");
        // Discovery order preserved for the tied pair
        assert_eq!(segments[1].speaker, "a");
        assert_eq!(segments[2].speaker, "b");
    }
}
