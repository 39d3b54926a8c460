//! Interactive prompts for the choices not pinned down by CLI flags.
//!
//! Every prompt has a computed default so an empty line (just Enter) keeps
//! the run moving. Invalid input re-prompts rather than failing.

use crate::models;
use console::style;
use shared_utils::errors::{Result, UpscaleError};
use shared_utils::scaling::{Resolution, DEFAULT_RESOLUTION_INDEX, RESOLUTIONS};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Parse a 1-based menu choice. Empty input means the default; out-of-range
/// or non-numeric input means "ask again" (None).
pub fn parse_choice(input: &str, max: usize, default: usize) -> Option<usize> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(default);
    }
    match trimmed.parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Some(n - 1),
        _ => None,
    }
}

fn read_line(prompt: &str) -> io::Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Ask until `parse_choice` accepts the answer. `default` is 0-based.
fn ask_choice(prompt: &str, max: usize, default: usize) -> Result<usize> {
    loop {
        let line = read_line(prompt)?;
        match parse_choice(&line, max, default) {
            Some(idx) => return Ok(idx),
            None => eprintln!("❌ Enter a number between 1 and {}.", max),
        }
    }
}

/// Candidate source videos: `.mp4` files in `dir`, excluding previous
/// outputs of this tool, sorted by name.
pub fn list_candidate_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut videos: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
                && !p
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("output_"))
        })
        .collect();
    videos.sort();
    Ok(videos)
}

/// Pick the source video: automatic when exactly one candidate exists.
pub fn select_video(dir: &Path) -> Result<PathBuf> {
    let videos = list_candidate_videos(dir)?;
    match videos.len() {
        0 => Err(UpscaleError::NoVideoFound(dir.to_path_buf())),
        1 => Ok(videos.into_iter().next().expect("one candidate")),
        n => {
            eprintln!("\n📁 Multiple MP4 files found:");
            for (i, video) in videos.iter().enumerate() {
                eprintln!(
                    "  [{}] {}",
                    i + 1,
                    video.file_name().unwrap_or_default().to_string_lossy()
                );
            }
            let idx = ask_choice(&format!("Select file (1-{}, default: 1): ", n), n, 0)?;
            Ok(videos.into_iter().nth(idx).expect("valid index"))
        }
    }
}

/// Pick the target resolution from the fixed menu. Default FHD.
pub fn select_resolution() -> Result<Resolution> {
    let menu = RESOLUTIONS
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}:{}({}x{})", i + 1, r.label, r.width, r.height))
        .collect::<Vec<_>>()
        .join(", ");
    let idx = ask_choice(
        &format!(
            "Target resolution ({}, default: {}): ",
            menu,
            DEFAULT_RESOLUTION_INDEX + 1
        ),
        RESOLUTIONS.len(),
        DEFAULT_RESOLUTION_INDEX,
    )?;
    Ok(RESOLUTIONS[idx])
}

/// Pick the model: automatic when only one exists, otherwise a menu with the
/// fastest model (by speed score) as default.
pub fn select_model(available: &[String]) -> Result<String> {
    match available.len() {
        0 => unreachable!("caller checks for an empty model list"),
        1 => {
            let model = available[0].clone();
            eprintln!("\n📦 Model: {} (auto-selected)", model);
            Ok(model)
        }
        n => {
            let fastest = models::fastest_model(available);
            let default = fastest
                .and_then(|f| available.iter().position(|m| m == f))
                .unwrap_or(0);

            eprintln!("\n📦 Available models:");
            for (i, model) in available.iter().enumerate() {
                if Some(model) == fastest {
                    eprintln!("  [{}] {} {}", i + 1, model, style("⚡ (fastest)").yellow());
                } else {
                    eprintln!("  [{}] {}", i + 1, model);
                }
            }
            let idx = ask_choice(
                &format!("Select model (1-{}, default: {}): ", n, default + 1),
                n,
                default,
            )?;
            eprintln!("✅ Selected model: {}", available[idx]);
            Ok(available[idx].clone())
        }
    }
}

/// Pick the worker count, defaulting to the hardware heuristic.
pub fn select_workers(default: usize, max: usize) -> Result<usize> {
    loop {
        let line = read_line(&format!(
            "Parallel workers (1-{}, default: {}): ",
            max, default
        ))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(default);
        }
        match trimmed.parse::<usize>() {
            Ok(n) if (1..=max).contains(&n) => return Ok(n),
            _ => eprintln!("❌ Enter a number between 1 and {}.", max),
        }
    }
}
