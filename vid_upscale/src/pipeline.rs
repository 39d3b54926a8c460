//! The frame pipeline: extract → upscale (parallel) → re-encode.
//!
//! Per-frame state machine is pending → dispatched → completed | failed, and
//! no frame revisits a state. Dispatch is a fixed pool of workers each
//! blocking on one external upscaler process at a time; a worker that
//! finishes immediately pulls the next pending frame, so the in-flight set
//! stays saturated for the GPU-bound tool. Failures never abort siblings:
//! they accumulate and surface as one aggregate error after the pool drains,
//! and the re-encode step does not run.

use rayon::prelude::*;
use shared_utils::errors::{FrameFailure, Result, UpscaleError};
use shared_utils::ffmpeg_process::{format_tool_error, run_tool, truncate_diagnostic};
use shared_utils::scaling::{fit_to_box, scale_factor, Resolution};
use shared_utils::{create_frame_progress_bar, create_spinner, Encoder, VideoInfo};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

pub const EXTRACTED_DIR: &str = "temp_frames";
pub const UPSCALED_DIR: &str = "upscaled_frames";

/// Truncation limit for per-frame diagnostics in the aggregate report.
const DIAGNOSTIC_CHARS: usize = 300;

/// Everything the pipeline needs, resolved once at startup and passed down.
/// No component reads global mutable state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub debug: bool,
    pub ffmpeg: PathBuf,
    pub upscayl: PathBuf,
    pub model_dir: PathBuf,
    pub encoder: Encoder,
    pub workers: usize,
}

/// The per-run choices gathered from flags and prompts.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub source: PathBuf,
    pub info: VideoInfo,
    pub target: Resolution,
    pub model: String,
}

/// One frame's unit of work. Created per extracted frame, consumed once.
#[derive(Debug, Clone)]
pub struct FrameTask {
    pub input: PathBuf,
    pub output: PathBuf,
    pub scale: u32,
    pub model: String,
    pub model_dir: PathBuf,
}

/// Owns the two temporary frame directories and removes them when dropped,
/// so cleanup happens on success, error return, and panic unwinding alike.
pub struct TempDirs {
    extracted: PathBuf,
    upscaled: PathBuf,
}

impl TempDirs {
    /// Create both directories under `base`, clearing stale ones first.
    pub fn create_in(base: &Path) -> Result<Self> {
        let dirs = Self {
            extracted: base.join(EXTRACTED_DIR),
            upscaled: base.join(UPSCALED_DIR),
        };
        dirs.remove();
        std::fs::create_dir_all(&dirs.extracted)?;
        std::fs::create_dir_all(&dirs.upscaled)?;
        Ok(dirs)
    }

    pub fn extracted(&self) -> &Path {
        &self.extracted
    }

    pub fn upscaled(&self) -> &Path {
        &self.upscaled
    }

    fn remove(&self) {
        for dir in [&self.extracted, &self.upscaled] {
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(dir) {
                    warn!(dir = %dir.display(), error = %e, "failed to remove temp dir");
                }
            }
        }
    }

    /// Best-effort removal by fixed names, for the Ctrl+C handler where no
    /// guard instance is reachable.
    pub fn remove_in(base: &Path) {
        for name in [EXTRACTED_DIR, UPSCALED_DIR] {
            let dir = base.join(name);
            if dir.exists() {
                let _ = std::fs::remove_dir_all(&dir);
            }
        }
    }
}

impl Drop for TempDirs {
    fn drop(&mut self) {
        self.remove();
        eprintln!("🧹 Temporary frame folders removed.");
    }
}

/// Output file name: fixed template of resolution label + source name.
pub fn output_name(label: &str, source: &Path) -> String {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video.mp4".to_string());
    format!("output_{}_{}", label, file_name)
}

/// Extract every frame of the source to PNGs in `dir`.
pub fn extract_frames(config: &RunConfig, source: &Path, dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("frame_%05d.png");

    let mut cmd = Command::new(&config.ffmpeg);
    cmd.arg("-i")
        .arg(source)
        .args(["-q:v", "2"])
        .arg(&pattern);

    let output = run_tool(&mut cmd).map_err(|e| UpscaleError::FFmpegError(e.to_string()))?;
    if !output.success() {
        return Err(UpscaleError::FFmpegError(format!(
            "frame extraction failed: {}",
            format_tool_error(&output.stderr)
        )));
    }

    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    frames.sort();

    if frames.is_empty() {
        return Err(UpscaleError::NoFramesExtracted(dir.to_path_buf()));
    }

    info!(count = frames.len(), "frames extracted");
    Ok(frames)
}

/// Build one task per extracted frame.
pub fn build_tasks(
    frames: &[PathBuf],
    upscaled_dir: &Path,
    scale: u32,
    model: &str,
    model_dir: &Path,
) -> Vec<FrameTask> {
    frames
        .iter()
        .map(|frame| {
            let file_name = frame.file_name().expect("extracted frame has a name");
            FrameTask {
                input: frame.clone(),
                output: upscaled_dir.join(file_name),
                scale,
                model: model.to_string(),
                model_dir: model_dir.to_path_buf(),
            }
        })
        .collect()
}

/// Dispatch every task across a pool of `workers` threads.
///
/// Each pool thread pulls the next pending task as soon as its current one
/// finishes, which keeps exactly `workers` upscaler processes in flight until
/// the queue empties. Returns the failures; the caller decides whether they
/// are fatal. Every task is run exactly once regardless of sibling outcomes.
pub fn run_tasks<F>(tasks: &[FrameTask], workers: usize, run: F) -> Result<Vec<FrameFailure>>
where
    F: Fn(&FrameTask) -> Option<FrameFailure> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| UpscaleError::GeneralError(format!("failed to build worker pool: {}", e)))?;

    let failures: Vec<FrameFailure> =
        pool.install(|| tasks.par_iter().filter_map(|task| run(task)).collect());

    Ok(failures)
}

/// Invoke the external upscaler for one frame.
///
/// Non-zero exit or a missing output file marks the frame failed with its
/// truncated diagnostic text. No timeout: the call blocks until the upscaler
/// finishes.
fn upscale_one(config: &RunConfig, task: &FrameTask) -> Option<FrameFailure> {
    let frame = task
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| task.input.display().to_string());

    let mut cmd = Command::new(&config.upscayl);
    cmd.arg("-i")
        .arg(&task.input)
        .arg("-o")
        .arg(&task.output)
        .arg("-s")
        .arg(task.scale.to_string())
        .arg("-m")
        .arg(&task.model_dir)
        .arg("-n")
        .arg(&task.model);

    let output = match run_tool(&mut cmd) {
        Ok(out) => out,
        Err(e) => {
            return Some(FrameFailure {
                frame,
                exit_code: None,
                diagnostic: truncate_diagnostic(&e.to_string(), DIAGNOSTIC_CHARS),
            });
        }
    };

    if !output.success() {
        if config.debug {
            eprintln!(
                "\n  [debug] {} failed (exit code: {:?}):\n    {}",
                frame,
                output.status.code(),
                truncate_diagnostic(&output.stderr, 500)
            );
        }
        return Some(FrameFailure {
            frame,
            exit_code: output.status.code(),
            diagnostic: truncate_diagnostic(&output.stderr, DIAGNOSTIC_CHARS),
        });
    }

    if !task.output.is_file() {
        return Some(FrameFailure {
            frame,
            exit_code: output.status.code(),
            diagnostic: format!("upscaled file was not created: {}", task.output.display()),
        });
    }

    debug!(frame = %frame, "frame upscaled");
    None
}

/// Run the parallel upscale step over all tasks.
///
/// All frames complete or fail independently; any failures become one
/// aggregate error after the pipeline drains.
pub fn upscale_frames(config: &RunConfig, tasks: &[FrameTask]) -> Result<()> {
    let pb = create_frame_progress_bar(tasks.len() as u64, "Upscaling");

    let failures = run_tasks(tasks, config.workers, |task| {
        let failure = upscale_one(config, task);
        pb.inc(1);
        failure
    })?;

    if failures.is_empty() {
        pb.finish_with_message("done");
        Ok(())
    } else {
        pb.abandon_with_message(format!("{} frame(s) failed", failures.len()));
        Err(UpscaleError::FramesFailed(failures))
    }
}

/// Re-encode the upscaled frame sequence, copying audio from the source and
/// applying the fitted target resolution.
pub fn encode_video(
    config: &RunConfig,
    upscaled_dir: &Path,
    request: &RunRequest,
    output: &Path,
) -> Result<()> {
    let (width, height) = fit_to_box(
        request.info.width,
        request.info.height,
        request.target.width,
        request.target.height,
    );
    let pattern = upscaled_dir.join("frame_%05d.png");

    let mut cmd = Command::new(&config.ffmpeg);
    cmd.arg("-y")
        .arg("-framerate")
        .arg(format!("{}", request.info.frame_rate))
        .arg("-i")
        .arg(&pattern)
        .arg("-i")
        .arg(&request.source)
        .arg("-vf")
        .arg(format!("scale={}:{}:flags=lanczos", width, height))
        .arg("-c:v")
        .arg(config.encoder.ffmpeg_name());
    cmd.args(config.encoder.extra_args());
    cmd.args(["-pix_fmt", "yuv420p", "-c:a", "copy", "-map", "0:v:0", "-map", "1:a:0?"])
        .arg(output);

    let result = run_tool(&mut cmd).map_err(|e| UpscaleError::FFmpegError(e.to_string()))?;
    if !result.success() {
        return Err(UpscaleError::FFmpegError(format!(
            "re-encode failed: {}",
            format_tool_error(&result.stderr)
        )));
    }

    info!(output = %output.display(), width, height, "video encoded");
    Ok(())
}

/// Run the whole pipeline for one resolved request.
///
/// Returns the output file path. Temp directories are removed when the
/// guard drops, whatever the outcome.
pub fn run(config: &RunConfig, request: &RunRequest) -> Result<PathBuf> {
    let temp = TempDirs::create_in(Path::new("."))?;

    eprintln!("\n[1/3] 🎞️ Extracting frames...");
    let spinner = create_spinner("extracting");
    let frames = extract_frames(config, &request.source, temp.extracted());
    spinner.finish_and_clear();
    let frames = frames?;

    let scale = scale_factor(request.info.width, request.target.width);
    eprintln!(
        "\n[2/3] 🤖 AI upscaling {} frames ({}, model {}, scale {}x, {} workers)...",
        frames.len(),
        request.target.label,
        request.model,
        scale,
        config.workers
    );
    let tasks = build_tasks(
        &frames,
        temp.upscaled(),
        scale,
        &request.model,
        &config.model_dir,
    );
    debug_assert_eq!(tasks.len(), frames.len());
    upscale_frames(config, &tasks)?;

    let output = PathBuf::from(output_name(request.target.label, &request.source));
    eprintln!(
        "\n[3/3] 🎬 Encoding video (encoder: {})...",
        config.encoder.ffmpeg_name()
    );
    encode_video(config, temp.upscaled(), request, &output)?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn fake_tasks(dir: &Path, count: usize) -> Vec<FrameTask> {
        (0..count)
            .map(|i| FrameTask {
                input: dir.join(format!("frame_{:05}.png", i + 1)),
                output: dir.join(format!("out_{:05}.png", i + 1)),
                scale: 2,
                model: "realesrgan-x2plus".to_string(),
                model_dir: dir.to_path_buf(),
            })
            .collect()
    }

    #[test]
    fn test_run_tasks_dispatches_every_frame_once() {
        let dir = TempDir::new().unwrap();
        let tasks = fake_tasks(dir.path(), 10);
        let dispatched = AtomicUsize::new(0);

        let failures = run_tasks(&tasks, 2, |_| {
            dispatched.fetch_add(1, Ordering::SeqCst);
            None
        })
        .unwrap();

        assert_eq!(dispatched.load(Ordering::SeqCst), 10);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_run_tasks_failures_do_not_abort_siblings() {
        let dir = TempDir::new().unwrap();
        let tasks = fake_tasks(dir.path(), 8);
        let dispatched = AtomicUsize::new(0);

        let failures = run_tasks(&tasks, 3, |task| {
            dispatched.fetch_add(1, Ordering::SeqCst);
            // every other frame fails
            let idx: usize = task
                .input
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .rsplit('_')
                .next()
                .unwrap()
                .parse()
                .unwrap();
            (idx % 2 == 0).then(|| FrameFailure {
                frame: format!("frame_{:05}.png", idx),
                exit_code: Some(1),
                diagnostic: "boom".to_string(),
            })
        })
        .unwrap();

        assert_eq!(dispatched.load(Ordering::SeqCst), 8);
        assert_eq!(failures.len(), 4);
    }

    #[test]
    fn test_run_tasks_single_worker_terminates() {
        let dir = TempDir::new().unwrap();
        let tasks = fake_tasks(dir.path(), 5);
        let failures = run_tasks(&tasks, 1, |_| None).unwrap();
        assert!(failures.is_empty());
    }

    #[test]
    fn test_build_tasks_one_per_frame() {
        let frames: Vec<PathBuf> = (1..=3)
            .map(|i| PathBuf::from(format!("temp/frame_{:05}.png", i)))
            .collect();
        let tasks = build_tasks(
            &frames,
            Path::new("up"),
            4,
            "remacri",
            Path::new("/models"),
        );
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].output, Path::new("up/frame_00001.png"));
        assert_eq!(tasks[2].scale, 4);
    }

    #[test]
    fn test_temp_dirs_removed_on_drop() {
        let base = TempDir::new().unwrap();
        let extracted = base.path().join(EXTRACTED_DIR);
        let upscaled = base.path().join(UPSCALED_DIR);

        {
            let _dirs = TempDirs::create_in(base.path()).unwrap();
            assert!(extracted.is_dir());
            assert!(upscaled.is_dir());
        }

        assert!(!extracted.exists());
        assert!(!upscaled.exists());
    }

    #[test]
    fn test_temp_dirs_clears_stale_contents() {
        let base = TempDir::new().unwrap();
        let stale = base.path().join(EXTRACTED_DIR);
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("leftover.png"), b"x").unwrap();

        let dirs = TempDirs::create_in(base.path()).unwrap();
        assert!(!dirs.extracted().join("leftover.png").exists());
    }

    #[test]
    fn test_output_name_template() {
        assert_eq!(
            output_name("FHD", Path::new("holiday.mp4")),
            "output_FHD_holiday.mp4"
        );
        assert_eq!(
            output_name("4K", Path::new("clips/trip.mp4")),
            "output_4K_trip.mp4"
        );
    }
}
