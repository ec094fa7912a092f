//! Audio decoding crate for VoiceTrace
//!
//! Decodes audio files into mono f32 waveforms at their native sample rate:
//! - **WAV** via hound
//! - **MP3 / M4A / OGG / FLAC** via symphonia
//!
//! Multi-channel input is downmixed by channel averaging. No resampling is
//! performed; callers receive samples at the file's own rate.

pub mod file_io;

pub use file_io::{load_audio_file, samples_to_wav_bytes, DecodedAudio};
