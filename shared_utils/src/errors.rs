use std::path::PathBuf;
use thiserror::Error;

/// One failed frame from the upscale pipeline.
///
/// Collected while sibling tasks keep running; surfaced all at once after the
/// pipeline drains.
#[derive(Debug, Clone)]
pub struct FrameFailure {
    /// Frame file name, e.g. `frame_00042.png`
    pub frame: String,
    /// Exit code of the upscaler process, if it ran at all
    pub exit_code: Option<i32>,
    /// Tail-truncated diagnostic text from the upscaler
    pub diagnostic: String,
}

impl std::fmt::Display for FrameFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} (exit code {}): {}", self.frame, code, self.diagnostic),
            None => write!(f, "{}: {}", self.frame, self.diagnostic),
        }
    }
}

#[derive(Error, Debug)]
pub enum UpscaleError {
    #[error("External tool not found: {tool}\n{remediation}")]
    ToolNotFound { tool: String, remediation: String },

    #[error("FFprobe failed: {0}")]
    FFprobeError(String),

    #[error("FFmpeg failed: {0}")]
    FFmpegError(String),

    #[error("No MP4 file found in {0}")]
    NoVideoFound(PathBuf),

    #[error("No usable models found in model folder: {0}")]
    NoModelsFound(PathBuf),

    #[error("No frames were extracted to {0}")]
    NoFramesExtracted(PathBuf),

    #[error("{} frame(s) failed to upscale:\n{}", .0.len(), format_failures(.0))]
    FramesFailed(Vec<FrameFailure>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // Allow converting other errors to string for general failures
    #[error("General error: {0}")]
    GeneralError(String),
}

fn format_failures(failures: &[FrameFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  - {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, UpscaleError>;
