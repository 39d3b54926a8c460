//! Model discovery and speed scoring.
//!
//! Upscayl models live in a flat folder as `<name>.bin`/`<name>.param` pairs
//! or as subfolders carrying the weights. The speed score is a name-based
//! heuristic used only to pick a sensible default in the model prompt.

use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// List the usable models in the model folder, sorted by name.
///
/// A model is either a top-level `.bin` file (its stem) or a subfolder that
/// contains at least one `.bin` file (the folder name).
pub fn find_available_models(model_dir: &Path) -> Vec<String> {
    if !model_dir.is_dir() {
        return Vec::new();
    }

    let mut models = Vec::new();
    for entry in WalkDir::new(model_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();

        if path.is_file() {
            if let Some(stem) = name.strip_suffix(".bin") {
                models.push(stem.to_string());
            }
        } else if path.is_dir() && dir_has_bin(path) {
            models.push(name.into_owned());
        }
    }

    models.sort();
    debug!(count = models.len(), dir = %model_dir.display(), "models discovered");
    models
}

fn dir_has_bin(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| {
            e.path().is_file() && e.file_name().to_string_lossy().ends_with(".bin")
        })
}

/// Rank a model name by expected speed. Lower is faster.
///
/// Pure function so the heuristic stays unit-testable; the weights come from
/// observed upscayl model behavior (x2 variants are fastest, the big
/// remacri/ultramix nets are slowest).
pub fn model_speed_score(name: &str) -> i32 {
    let mut score = 100;
    let lower = name.to_lowercase();

    if lower.contains("x2") {
        score -= 50;
    } else if lower.contains("x4") {
        score -= 30;
    }

    if lower.contains("small") || lower.contains("fast") || lower.contains("lite") {
        score -= 20;
    }

    if lower.contains("x8") {
        score += 30;
    }
    if lower.contains("large") || lower.contains("ultra") || lower.contains("balanced") {
        score += 20;
    }
    if lower.contains("remacri") || lower.contains("ultramix") {
        score += 15;
    }

    // Short names tend to be the simple, fast nets
    if name.len() < 10 {
        score -= 10;
    }

    score
}

/// The fastest model by speed score; ties go to the first by sort order.
pub fn fastest_model(models: &[String]) -> Option<&String> {
    models.iter().min_by_key(|m| model_speed_score(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_score_prefers_x2_over_x4_over_x8() {
        let x2 = model_speed_score("realesrgan-x2plus");
        let x4 = model_speed_score("realesrgan-x4plus");
        let x8 = model_speed_score("realesrgan-x8");
        assert!(x2 < x4);
        assert!(x4 < x8);
    }

    #[test]
    fn test_score_penalizes_heavy_models() {
        assert!(model_speed_score("remacri") > model_speed_score("span-fast"));
        assert!(model_speed_score("ultramix_balanced") > model_speed_score("ultramix"));
    }

    #[test]
    fn test_short_names_get_a_discount() {
        assert!(model_speed_score("span") < model_speed_score("span-of-reasonable-length"));
    }

    #[test]
    fn test_fastest_model_picks_minimum() {
        let models = vec![
            "remacri".to_string(),
            "realesrgan-x4plus".to_string(),
            "realesrgan-x2plus".to_string(),
        ];
        assert_eq!(fastest_model(&models).unwrap(), "realesrgan-x2plus");
    }

    #[test]
    fn test_fastest_model_empty() {
        assert_eq!(fastest_model(&[]), None);
    }

    #[test]
    fn test_find_models_bin_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("realesrgan-x4plus.bin"), b"").unwrap();
        std::fs::write(dir.path().join("realesrgan-x4plus.param"), b"").unwrap();
        std::fs::create_dir(dir.path().join("remacri")).unwrap();
        std::fs::write(dir.path().join("remacri").join("weights.bin"), b"").unwrap();
        std::fs::create_dir(dir.path().join("empty-folder")).unwrap();

        let models = find_available_models(dir.path());
        assert_eq!(models, vec!["realesrgan-x4plus", "remacri"]);
    }

    #[test]
    fn test_find_models_missing_dir() {
        assert!(find_available_models(Path::new("/nonexistent/models")).is_empty());
    }
}
