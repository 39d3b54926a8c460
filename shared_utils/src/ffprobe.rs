//! FFprobe wrapper module.
//!
//! Pulls the handful of stream properties the pipeline needs: dimensions,
//! frame rate, and total frame count (the latter for progress display only).

use crate::errors::{Result, UpscaleError};
use crate::tools::is_ffprobe_available;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// Total frame count, 0 when the container does not report it.
    pub frame_count: u64,
}

/// Parse an ffprobe rational frame rate like "30000/1001".
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

pub fn probe_video(path: &Path) -> Result<VideoInfo> {
    if !is_ffprobe_available() {
        return Err(UpscaleError::ToolNotFound {
            tool: "ffprobe".to_string(),
            remediation: "ffprobe ships with FFmpeg. Install FFmpeg and make sure it is on PATH."
                .to_string(),
        });
    }

    if !path.is_file() {
        return Err(UpscaleError::FFprobeError(format!(
            "Not a file: {}",
            path.display()
        )));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(UpscaleError::FFprobeError(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            stderr.trim()
        )));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| UpscaleError::FFprobeError(format!("Invalid ffprobe JSON: {}", e)))?;

    let stream = json["streams"]
        .get(0)
        .ok_or_else(|| UpscaleError::FFprobeError("No video stream found".to_string()))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| UpscaleError::FFprobeError("Missing stream width".to_string()))?
        as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| UpscaleError::FFprobeError("Missing stream height".to_string()))?
        as u32;

    let frame_rate = stream["r_frame_rate"]
        .as_str()
        .and_then(parse_frame_rate)
        .ok_or_else(|| UpscaleError::FFprobeError("Missing or invalid r_frame_rate".to_string()))?;

    // nb_frames is a string in ffprobe JSON and absent for some containers
    let frame_count = stream["nb_frames"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(VideoInfo {
        width,
        height,
        frame_rate,
        frame_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate_integer() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
    }

    #[test]
    fn test_parse_frame_rate_ntsc() {
        let fps = parse_frame_rate("30000/1001").unwrap();
        assert!((fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_frame_rate_zero_denominator() {
        assert_eq!(parse_frame_rate("30/0"), None);
    }

    #[test]
    fn test_parse_frame_rate_garbage() {
        assert_eq!(parse_frame_rate("not a rate"), None);
        assert_eq!(parse_frame_rate(""), None);
    }
}
