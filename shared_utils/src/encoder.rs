//! Hardware encoder probing.
//!
//! ffmpeg advertising an encoder does not mean the GPU behind it exists, so
//! each hardware candidate is exercised with a one-frame synthetic encode
//! before it is trusted. Priority order: NVIDIA NVENC, then AMD AMF, then the
//! libx264 software fallback. Probing never fails the run - the software
//! encoder always works.

use crate::ffmpeg_process::run_with_timeout;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

const ENCODER_LIST_TIMEOUT: Duration = Duration::from_secs(5);
const ENCODER_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stderr substrings that mean the encoder initialized against thin air.
///
/// Exit code 0 with one of these in the diagnostics still counts as failure;
/// matching is case-insensitive.
const NVENC_ERROR_KEYWORDS: &[&str] = &[
    "no nvenc capable devices found",
    "no capable devices found",
    "nvenc not available",
    "cannot load",
    "no such filter",
];

const AMF_ERROR_KEYWORDS: &[&str] = &[
    "no capable devices found",
    "amf not available",
    "cannot load",
    "no such filter",
    "failed to initialize",
    "amf runtime",
];

/// The encoder used for the final re-encode. Selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    /// NVIDIA NVENC hardware encoder
    Nvenc,
    /// AMD AMF hardware encoder
    Amf,
    /// libx264 software fallback
    Software,
}

impl Encoder {
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Encoder::Nvenc => "h264_nvenc",
            Encoder::Amf => "h264_amf",
            Encoder::Software => "libx264",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Encoder::Nvenc => "NVIDIA GPU accelerated",
            Encoder::Amf => "AMD GPU accelerated",
            Encoder::Software => "CPU encoding",
        }
    }

    pub fn is_hardware(&self) -> bool {
        !matches!(self, Encoder::Software)
    }

    /// Extra ffmpeg arguments for the final encode.
    pub fn extra_args(&self) -> &'static [&'static str] {
        match self {
            Encoder::Nvenc => &["-preset", "fast"],
            // AMF misbehaves with default rate control, pin it to CQP
            Encoder::Amf => &["-quality", "speed", "-rc", "cqp", "-qp_i", "23", "-qp_p", "23"],
            Encoder::Software => &[],
        }
    }

    fn error_keywords(&self) -> &'static [&'static str] {
        match self {
            Encoder::Nvenc => NVENC_ERROR_KEYWORDS,
            Encoder::Amf => AMF_ERROR_KEYWORDS,
            Encoder::Software => &[],
        }
    }

    /// Synthetic-clip arguments for the probe encode.
    ///
    /// AMF has a minimum resolution requirement, so it gets a bigger test
    /// frame plus its CQP parameters; NVENC is happy with 64x64.
    fn test_args(&self) -> Vec<&'static str> {
        match self {
            Encoder::Amf => vec![
                "-hide_banner",
                "-f",
                "lavfi",
                "-i",
                "testsrc=duration=0.1:size=320x240:rate=1",
                "-c:v",
                "h264_amf",
                "-quality",
                "speed",
                "-rc",
                "cqp",
                "-qp_i",
                "23",
                "-qp_p",
                "23",
                "-frames:v",
                "1",
                "-f",
                "null",
                "-",
            ],
            _ => vec![
                "-hide_banner",
                "-f",
                "lavfi",
                "-i",
                "testsrc=duration=0.1:size=64x64:rate=1",
                "-c:v",
                self.ffmpeg_name(),
                "-frames:v",
                "1",
                "-f",
                "null",
                "-",
            ],
        }
    }
}

impl std::fmt::Display for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ffmpeg_name())
    }
}

/// `ffmpeg -hide_banner -encoders` stdout, or empty when ffmpeg misbehaves.
pub fn installed_encoders() -> String {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-encoders"]);
    match run_with_timeout(&mut cmd, ENCODER_LIST_TIMEOUT) {
        Ok(out) if out.success() => out.stdout,
        _ => String::new(),
    }
}

/// Verify a hardware candidate with a one-frame synthetic encode.
///
/// Success requires exit code zero AND no vendor failure keyword in the
/// diagnostic output. Timeout or spawn failure counts as failure.
pub fn test_encoder(encoder: Encoder, debug: bool) -> bool {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(encoder.test_args());

    let output = match run_with_timeout(&mut cmd, ENCODER_TEST_TIMEOUT) {
        Ok(out) => out,
        Err(e) => {
            if debug {
                eprintln!("  [debug] {} test error: {}", encoder, e);
            }
            return false;
        }
    };

    let stderr_lower = output.stderr.to_lowercase();
    let keyword_hit = encoder
        .error_keywords()
        .iter()
        .any(|kw| stderr_lower.contains(kw));

    let usable = output.success() && !keyword_hit;

    if debug {
        if usable {
            eprintln!("  [debug] {} test passed", encoder);
        } else {
            eprintln!(
                "  [debug] {} test failed (exit code: {:?}):",
                encoder,
                output.status.code()
            );
            // Show only the lines that look like errors, capped at 5
            let error_lines: Vec<&str> = output
                .stderr
                .lines()
                .filter(|line| {
                    let lower = line.to_lowercase();
                    ["error", "failed", "cannot", "not found", "unable"]
                        .iter()
                        .any(|kw| lower.contains(kw))
                })
                .take(5)
                .collect();
            if error_lines.is_empty() {
                eprintln!("    {}", crate::ffmpeg_process::truncate_diagnostic(&output.stderr, 500));
            } else {
                for line in error_lines {
                    eprintln!("    {}", line);
                }
            }
        }
    }

    usable
}

/// Pure priority walk over the advertised encoder list.
///
/// A vendor whose encoder name is absent from the list is skipped without
/// invoking `test` at all; the first candidate that passes wins; the software
/// fallback is unconditional.
pub fn select_encoder<F>(encoders: &str, mut test: F) -> Encoder
where
    F: FnMut(Encoder) -> bool,
{
    for candidate in [Encoder::Nvenc, Encoder::Amf] {
        if encoders.contains(candidate.ffmpeg_name()) && test(candidate) {
            return candidate;
        }
    }
    Encoder::Software
}

/// Probe and pick the encoder for this run. Never fails.
pub fn detect(debug: bool) -> Encoder {
    let encoders = installed_encoders();
    let selected = select_encoder(&encoders, |candidate| {
        eprintln!("  Testing {} ...", candidate.ffmpeg_name());
        let ok = test_encoder(candidate, debug);
        if !ok && candidate == Encoder::Amf {
            eprintln!("  h264_amf advertised but failed to initialize; check GPU drivers.");
        }
        ok
    });
    debug!(encoder = %selected, "encoder selected");
    selected
}

/// Count installed accelerators for the worker heuristic.
///
/// `nvidia-smi -L` prints one line per GPU. When the utility is absent but a
/// hardware encoder probe succeeded, there is at least one accelerator.
pub fn count_accelerators(hardware_encoder_works: bool) -> usize {
    let mut cmd = Command::new("nvidia-smi");
    cmd.arg("-L");
    let counted = match run_with_timeout(&mut cmd, ENCODER_LIST_TIMEOUT) {
        Ok(out) if out.success() => out
            .stdout
            .lines()
            .filter(|line| line.trim_start().starts_with("GPU"))
            .count(),
        _ => 0,
    };

    if counted == 0 && hardware_encoder_works {
        1
    } else {
        counted
    }
}
