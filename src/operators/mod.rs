//! Built-in operators.
//!
//! Each module exposes `register`, which adds its operator to an
//! [`OperatorRegistry`] under the name used on the command line.

pub mod annotations;
pub mod answer_frames_ollama;
pub mod answer_transcription_ollama;
pub mod answer_videos_vlm;
pub mod catalog;
pub mod collections;
pub mod embed_frames_transformers;
pub mod extract_sound_ffmpeg;
pub mod make_clips_ffmpeg;
pub mod make_frames_ffmpeg;
pub mod make_shots_scenedetect;
pub mod scale_frames;
pub mod support;
pub mod transcode_clips_ffmpeg;
pub mod transcribe_speech_parakeet;

use crate::runtime::OperatorRegistry;

/// Register every built-in operator.
pub fn register_all(registry: &mut OperatorRegistry) {
    catalog::register(registry);
    collections::register(registry);
    annotations::register(registry);
    make_clips_ffmpeg::register(registry);
    make_shots_scenedetect::register(registry);
    make_frames_ffmpeg::register(registry);
    extract_sound_ffmpeg::register(registry);
    transcode_clips_ffmpeg::register(registry);
    transcribe_speech_parakeet::register(registry);
    answer_frames_ollama::register(registry);
    answer_transcription_ollama::register(registry);
    answer_videos_vlm::register(registry);
    embed_frames_transformers::register(registry);
    scale_frames::register(registry);
}
