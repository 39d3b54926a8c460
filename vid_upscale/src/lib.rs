//! vid-upscale - Frame-by-frame AI video upscaling
//!
//! Orchestrates three external programs: ffmpeg extracts the source video
//! into PNG frames, upscayl-bin upscales each frame across a bounded worker
//! pool, and ffmpeg re-encodes the result with a probed hardware encoder
//! (NVENC / AMF / libx264 fallback), preserving the audio track.
//!
//! Control flow is linear: probe → extract → upscale (parallel) →
//! re-encode → cleanup.

pub mod models;
pub mod pipeline;
pub mod prompt;

pub use models::{fastest_model, find_available_models, model_speed_score};
pub use pipeline::{
    build_tasks, encode_video, extract_frames, output_name, run, upscale_frames, FrameTask,
    RunConfig, RunRequest, TempDirs,
};

pub use shared_utils::errors::{FrameFailure, Result, UpscaleError};
