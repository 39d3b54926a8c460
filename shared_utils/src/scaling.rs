//! Resolution targets and aspect-ratio math.

/// A named target resolution from the fixed menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

/// The selectable target resolutions, in menu order. FHD is the default.
pub const RESOLUTIONS: &[Resolution] = &[
    Resolution { label: "HD", width: 1280, height: 720 },
    Resolution { label: "FHD", width: 1920, height: 1080 },
    Resolution { label: "4K", width: 3840, height: 2160 },
    Resolution { label: "8K", width: 7680, height: 4320 },
];

pub const DEFAULT_RESOLUTION_INDEX: usize = 1; // FHD

/// Look up a resolution by its menu label, case-insensitively.
pub fn resolution_by_label(label: &str) -> Option<Resolution> {
    RESOLUTIONS
        .iter()
        .copied()
        .find(|r| r.label.eq_ignore_ascii_case(label))
}

/// Name the standard resolution matching the given dimensions, with a
/// +/- 10 px tolerance for slightly off-standard sources.
pub fn resolution_label(width: u32, height: u32) -> Option<&'static str> {
    RESOLUTIONS
        .iter()
        .find(|r| {
            width.abs_diff(r.width) <= 10 && height.abs_diff(r.height) <= 10
        })
        .map(|r| r.label)
}

/// Fit the source aspect ratio inside the target box without letterboxing,
/// rounding both dimensions down to the nearest even integer for encoder
/// compatibility.
pub fn fit_to_box(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    assert!(src_w > 0 && src_h > 0, "source dimensions must be non-zero");

    let scale = f64::min(box_w as f64 / src_w as f64, box_h as f64 / src_h as f64);
    let w = (src_w as f64 * scale) as u32;
    let h = (src_h as f64 * scale) as u32;

    (round_down_even(w), round_down_even(h))
}

fn round_down_even(n: u32) -> u32 {
    (n & !1).max(2)
}

/// Upscayl only does integer scale factors; pick the one that reaches the
/// target box. A factor of 2 covers anything up to a 2x width jump.
pub fn scale_factor(src_w: u32, target_w: u32) -> u32 {
    if target_w as f64 / src_w as f64 > 2.0 {
        4
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fit_exact_aspect() {
        assert_eq!(fit_to_box(1280, 720, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn test_fit_wider_source_letterbox_free() {
        // 21:9 source into a 16:9 box: width fills, height shrinks
        let (w, h) = fit_to_box(2560, 1080, 1920, 1080);
        assert_eq!(w, 1920);
        assert!(h < 1080);
        assert_eq!(h % 2, 0);
    }

    #[test]
    fn test_fit_taller_source() {
        // 9:16 vertical video into FHD box
        let (w, h) = fit_to_box(720, 1280, 1920, 1080);
        assert_eq!(h, 1080);
        assert!(w < 1920);
        assert_eq!(w % 2, 0);
    }

    #[test]
    fn test_fit_rounds_down_to_even() {
        let (w, h) = fit_to_box(854, 480, 1280, 720);
        assert_eq!(w % 2, 0);
        assert_eq!(h % 2, 0);
        assert!(w <= 1280 && h <= 720);
    }

    #[test]
    fn test_resolution_label_exact_and_tolerant() {
        assert_eq!(resolution_label(1920, 1080), Some("FHD"));
        assert_eq!(resolution_label(1912, 1088), Some("FHD"));
        assert_eq!(resolution_label(854, 480), None);
    }

    #[test]
    fn test_resolution_by_label() {
        assert_eq!(resolution_by_label("4k").map(|r| r.width), Some(3840));
        assert_eq!(resolution_by_label("uhd"), None);
    }

    #[test]
    fn test_scale_factor_threshold() {
        assert_eq!(scale_factor(1920, 3840), 2); // exactly 2x stays at 2
        assert_eq!(scale_factor(1280, 3840), 4);
        assert_eq!(scale_factor(1920, 1920), 2);
    }

    proptest! {
        /// Fitted dimensions never exceed the box, both are even, and the
        /// aspect ratio survives within integer-rounding tolerance.
        #[test]
        fn prop_fit_to_box(
            src_w in 16u32..8192,
            src_h in 16u32..8192,
            box_idx in 0usize..4,
        ) {
            let target = RESOLUTIONS[box_idx];
            let (w, h) = fit_to_box(src_w, src_h, target.width, target.height);

            prop_assert!(w <= target.width);
            prop_assert!(h <= target.height);
            prop_assert_eq!(w % 2, 0);
            prop_assert_eq!(h % 2, 0);

            let src_ratio = src_w as f64 / src_h as f64;
            let out_ratio = w as f64 / h as f64;
            // Even-rounding can move either dimension by up to 2 px
            let tolerance = src_ratio * (2.0 / h as f64 + 2.0 / w as f64) + 0.05;
            prop_assert!(
                (src_ratio - out_ratio).abs() <= tolerance,
                "ratio drifted: {} vs {}", src_ratio, out_ratio
            );
        }
    }
}
