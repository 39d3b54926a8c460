//! Shared utilities for the vid-upscale tool
//!
//! This crate provides the plumbing under the frame pipeline:
//! - External tool discovery (ffmpeg, ffprobe, upscayl-bin)
//! - FFprobe wrapper for source video analysis
//! - Hardware encoder probing (NVENC / AMF / libx264 fallback)
//! - Worker-count heuristics for the upscale pool
//! - Resolution targets and aspect-ratio fitting
//! - Subprocess helpers (deadlock-free output capture, probe timeouts)
//! - Progress bars and logging setup

pub mod encoder;
pub mod errors;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod logging;
pub mod progress;
pub mod scaling;
pub mod tools;
pub mod workers;

pub use encoder::{count_accelerators, detect as detect_encoder, Encoder};
pub use errors::{FrameFailure, Result, UpscaleError};
pub use ffmpeg_process::{
    format_tool_error, run_tool, run_with_timeout, truncate_diagnostic, ToolOutput,
};
pub use ffprobe::{parse_frame_rate, probe_video, VideoInfo};
pub use progress::{create_frame_progress_bar, create_spinner, format_duration};
pub use scaling::{
    fit_to_box, resolution_by_label, resolution_label, scale_factor, Resolution,
    DEFAULT_RESOLUTION_INDEX, RESOLUTIONS,
};
pub use tools::{find_ffmpeg, find_model_dir, find_upscayl, is_ffprobe_available};
pub use workers::{default_worker_count, worker_count};
