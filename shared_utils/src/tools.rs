//! External tool discovery.
//!
//! The tool depends on three executables: `ffmpeg`/`ffprobe` (encoding
//! toolkit) and `upscayl-bin` (AI upscaler). Missing tools are fatal and
//! reported with a remediation message; the model folder is discovered
//! relative to the upscaler binary and is allowed to fall back.

use crate::errors::{Result, UpscaleError};
use crate::ffmpeg_process::run_with_timeout;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Locate ffmpeg on PATH and verify it actually runs.
pub fn find_ffmpeg() -> Result<PathBuf> {
    let path = which::which("ffmpeg").map_err(|_| UpscaleError::ToolNotFound {
        tool: "ffmpeg".to_string(),
        remediation: "Install FFmpeg and make sure it is on PATH.\n\
                      Verify with: ffmpeg -version"
            .to_string(),
    })?;

    let mut cmd = Command::new(&path);
    cmd.arg("-version");
    let ok = run_with_timeout(&mut cmd, VERSION_CHECK_TIMEOUT)
        .map(|out| out.success())
        .unwrap_or(false);
    if !ok {
        return Err(UpscaleError::ToolNotFound {
            tool: "ffmpeg".to_string(),
            remediation: format!(
                "{} exists but `ffmpeg -version` failed. Reinstall FFmpeg.",
                path.display()
            ),
        });
    }

    debug!(path = %path.display(), "ffmpeg found");
    Ok(path)
}

pub fn is_ffprobe_available() -> bool {
    which::which("ffprobe").is_ok()
}

/// Candidate install locations for the upscayl binary, beyond PATH.
fn upscayl_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    #[cfg(target_os = "windows")]
    {
        for var in ["LOCALAPPDATA", "PROGRAMFILES", "PROGRAMFILES(X86)"] {
            if let Ok(base) = std::env::var(var) {
                let base = PathBuf::from(base);
                candidates.push(base.join("Programs").join("upscayl").join("upscayl-bin.exe"));
                candidates.push(base.join("upscayl").join("upscayl-bin.exe"));
                candidates.push(
                    base.join("upscayl")
                        .join("resources")
                        .join("bin")
                        .join("upscayl-bin.exe"),
                );
            }
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        candidates.push(PathBuf::from("/usr/lib/upscayl/bin/upscayl-bin"));
        candidates.push(PathBuf::from("/opt/Upscayl/resources/bin/upscayl-bin"));
        if let Ok(home) = std::env::var("HOME") {
            candidates.push(
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("upscayl")
                    .join("bin")
                    .join("upscayl-bin"),
            );
        }
    }

    candidates
}

/// Locate the upscayl binary: PATH first, then known install locations.
pub fn find_upscayl() -> Result<PathBuf> {
    if let Ok(path) = which::which("upscayl-bin") {
        debug!(path = %path.display(), "upscayl-bin found on PATH");
        return Ok(path);
    }

    let candidates = upscayl_candidates();
    for candidate in &candidates {
        if candidate.is_file() {
            debug!(path = %candidate.display(), "upscayl-bin found");
            return Ok(candidate.clone());
        }
    }

    let probed = candidates
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    Err(UpscaleError::ToolNotFound {
        tool: "upscayl-bin".to_string(),
        remediation: format!(
            "Install Upscayl (https://upscayl.org) or add upscayl-bin to PATH.\n\
             Probed locations:\n{}",
            probed
        ),
    })
}

/// Find the model folder relative to the upscayl binary.
///
/// Checked in order: `{bin_dir, bin_dir/..} x {models, resources/models}`.
/// Falls back to `./models` with a warning so the user can point the tool at
/// their own weights.
pub fn find_model_dir(upscayl_path: &Path) -> PathBuf {
    let bin_dir = upscayl_path.parent().unwrap_or(Path::new("."));
    let roots = [Some(bin_dir), bin_dir.parent()];

    for root in roots.iter().flatten() {
        for sub in [PathBuf::from("models"), Path::new("resources").join("models")] {
            let candidate = root.join(&sub);
            if candidate.is_dir() {
                debug!(path = %candidate.display(), "model folder found");
                return candidate;
            }
        }
    }

    warn!("Could not locate the model folder next to upscayl-bin, falling back to ./models");
    PathBuf::from("models")
}
