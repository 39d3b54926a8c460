use clap::Parser;
use shared_utils::errors::{Result, UpscaleError};
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::scaling::resolution_by_label;
use std::path::{Path, PathBuf};
use tracing::info;
use vid_upscale::pipeline::{self, RunConfig, RunRequest, TempDirs};
use vid_upscale::{models, prompt};

#[derive(Parser)]
#[command(name = "vid-upscale")]
#[command(version, about = "Frame-by-frame AI video upscaler (ffmpeg + upscayl)", long_about = None)]
struct Cli {
    /// Source video; prompts for a .mp4 in the current directory when omitted
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Target resolution label: HD, FHD, 4K, or 8K
    #[arg(short, long)]
    resolution: Option<String>,

    /// Upscayl model name; prompts with the fastest model as default when omitted
    #[arg(short, long)]
    model: Option<String>,

    /// Worker pool size; defaults to a hardware-derived heuristic
    #[arg(short, long)]
    workers: Option<usize>,

    /// Verbose diagnostic output (encoder probe details, upscaler stderr)
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    let _guard = init_logging("vid_upscale", LogConfig::default().with_debug(cli.debug)).ok();

    // The Drop guard covers normal unwinding; Ctrl+C needs its own path.
    let _ = ctrlc::set_handler(|| {
        TempDirs::remove_in(Path::new("."));
        eprintln!("\n🧹 Interrupted, temporary frame folders removed.");
        std::process::exit(130);
    });

    match run(cli) {
        Ok(output) => {
            eprintln!("\n✅ Done! Output: {}", output.display());
        }
        Err(e) => {
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<PathBuf> {
    // 1. Locate the external tools; missing ones are fatal with remediation.
    let ffmpeg = shared_utils::find_ffmpeg()?;
    eprintln!("1. 🎬 FFmpeg: {}", ffmpeg.display());

    let upscayl = shared_utils::find_upscayl()?;
    eprintln!("2. 🖼️ Upscayl: {}", upscayl.display());

    let model_dir = shared_utils::find_model_dir(&upscayl);
    eprintln!("3. 📦 Model folder: {}", model_dir.display());

    // 2. Probe for a working hardware encoder; always resolves to something.
    let encoder = shared_utils::detect_encoder(cli.debug);
    eprintln!(
        "4. 📹 Video encoder: {} ({})",
        encoder.ffmpeg_name(),
        encoder.description()
    );

    // 3. Source video
    let source = match cli.input {
        Some(path) if path.is_file() => path,
        Some(path) => {
            return Err(UpscaleError::GeneralError(format!(
                "Input file not found: {}",
                path.display()
            )))
        }
        None => prompt::select_video(Path::new("."))?,
    };
    eprintln!("5. 📁 Selected file: {}", source.display());

    let info = shared_utils::probe_video(&source)?;
    match shared_utils::resolution_label(info.width, info.height) {
        Some(label) => eprintln!(
            "6. 📺 Source: {}x{} ({}) - {:.3} fps, {} frames",
            info.width, info.height, label, info.frame_rate, info.frame_count
        ),
        None => eprintln!(
            "6. 📺 Source: {}x{} (non-standard) - {:.3} fps, {} frames",
            info.width, info.height, info.frame_rate, info.frame_count
        ),
    }

    // 4. Target resolution
    let target = match &cli.resolution {
        Some(label) => resolution_by_label(label).ok_or_else(|| {
            UpscaleError::GeneralError(format!(
                "Unknown resolution '{}'; expected HD, FHD, 4K, or 8K",
                label
            ))
        })?,
        None => prompt::select_resolution()?,
    };

    // 5. Model
    let available = models::find_available_models(&model_dir);
    if available.is_empty() {
        return Err(UpscaleError::NoModelsFound(model_dir));
    }
    let model = match &cli.model {
        Some(name) => {
            if !available.contains(name) {
                return Err(UpscaleError::GeneralError(format!(
                    "Model '{}' not found in {}. Available: {}",
                    name,
                    model_dir.display(),
                    available.join(", ")
                )));
            }
            name.clone()
        }
        None => prompt::select_model(&available)?,
    };

    // 6. Worker count: heuristic default, user override allowed up to cores
    let cores = num_cpus::get();
    let accelerators = shared_utils::count_accelerators(encoder.is_hardware());
    let default_workers = shared_utils::worker_count(cores, accelerators);
    info!(cores, accelerators, default_workers, "worker heuristic");
    let workers = match cli.workers {
        Some(n) => n.clamp(1, cores),
        None => prompt::select_workers(default_workers, cores)?,
    };

    let config = RunConfig {
        debug: cli.debug,
        ffmpeg,
        upscayl,
        model_dir,
        encoder,
        workers,
    };
    let request = RunRequest {
        source,
        info,
        target,
        model,
    };

    info!(
        source = %request.source.display(),
        target = request.target.label,
        model = %request.model,
        workers = config.workers,
        encoder = %config.encoder,
        "starting pipeline"
    );

    pipeline::run(&config, &request)
}
