use serde::{Deserialize, Serialize};
use crate::error::ParseError;

/// Pixel count the bits-per-pixel-frame model is anchored on (1920x1080)
pub const REFERENCE_PIXELS: f64 = 1920.0 * 1080.0;

/// Bits per pixel-frame at the reference pixel count
pub const REFERENCE_BPF: f64 = 0.076;

/// Decay exponent of the continuous model, fitted so 1280x720 lands on ~0.092
pub const BPF_EXPONENT: f64 = 0.2355;

/// How bits per pixel-frame is derived from the video geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BpfStrategy {
    /// Fixed values for the two resolutions the old presets knew about
    Table,
    /// Smooth decreasing function of the pixel count
    #[default]
    Continuous,
}

impl BpfStrategy {
    /// Bits per pixel-frame for a resolution, `None` when the strategy has no answer
    pub fn bits_per_pixel_frame(&self, width: u32, height: u32) -> Option<f64> {
        match self {
            BpfStrategy::Table => bpf_from_table(width),
            BpfStrategy::Continuous => bits_per_pixel_frame(width, height),
        }
    }
}

/// Convert `HH:MM:SS` or `HH:MM:SS.mmm` to whole seconds.
///
/// Sub-second digits are validated and then dropped, never rounded.
pub fn duration_to_seconds(text: &str) -> Result<u64, ParseError> {
    let err = || ParseError::Duration { text: text.to_string() };

    let fields: Vec<&str> = text.trim().split(':').collect();
    if fields.len() != 3 {
        return Err(err());
    }

    let (whole, fraction) = match fields[2].split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (fields[2], None),
    };
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
    }

    let parse = |s: &str| -> Result<u64, ParseError> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        s.parse::<u64>().map_err(|_| err())
    };

    let hours = parse(fields[0])?;
    let minutes = parse(fields[1])?;
    let seconds = parse(whole)?;

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes.checked_mul(60)?))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(err)
}

/// Continuous bits-per-pixel-frame model.
///
/// Larger frames compress better, so the value shrinks as the pixel count grows:
/// `REFERENCE_BPF * (REFERENCE_PIXELS / pixels) ^ BPF_EXPONENT`.
pub fn bits_per_pixel_frame(width: u32, height: u32) -> Option<f64> {
    let pixels = f64::from(width) * f64::from(height);
    if pixels <= 0.0 {
        return None;
    }
    Some(REFERENCE_BPF * (REFERENCE_PIXELS / pixels).powf(BPF_EXPONENT))
}

/// Lookup table keyed on width, as the first presets shipped it
pub fn bpf_from_table(width: u32) -> Option<f64> {
    match width {
        1920 => Some(0.076),
        1280 => Some(0.092),
        _ => None,
    }
}

/// Target video bitrate in kbps using the continuous bpf model when `bpf` is not given.
///
/// Returns `None` when geometry or frame rate is missing; the caller is expected to
/// ask for a manual value instead.
pub fn compute_bitrate(
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<f64>,
    bpf: Option<f64>,
) -> Option<u32> {
    compute_bitrate_with(BpfStrategy::Continuous, width, height, fps, bpf)
}

/// Same as [`compute_bitrate`] with an explicit fallback strategy for bpf
pub fn compute_bitrate_with(
    strategy: BpfStrategy,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<f64>,
    bpf: Option<f64>,
) -> Option<u32> {
    let (width, height) = (width?, height?);
    let fps = fps.filter(|f| f.is_finite() && *f > 0.0)?;
    if width == 0 || height == 0 {
        return None;
    }

    let bpf = match bpf {
        Some(value) => value,
        None => strategy.bits_per_pixel_frame(width, height)?,
    };

    // Bits/frame, then kbps
    let bits_per_frame = bpf * f64::from(width) * f64::from(height);
    let kbps = (bits_per_frame * fps / 1000.0).round();
    if !kbps.is_finite() || kbps < 0.0 || kbps > f64::from(u32::MAX) {
        return None;
    }
    Some(kbps as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_duration_examples() {
        assert_eq!(duration_to_seconds("01:02:03"), Ok(3723));
        assert_eq!(duration_to_seconds("00:00:01.999"), Ok(1));
        assert_eq!(duration_to_seconds("02:00:00.04"), Ok(7200));
    }

    #[test]
    fn test_duration_rejects_wrong_field_count() {
        assert!(duration_to_seconds("01:02").is_err());
        assert!(duration_to_seconds("01:02:03:04").is_err());
        assert!(duration_to_seconds("").is_err());
        assert!(duration_to_seconds("aa:bb:cc").is_err());
        assert!(duration_to_seconds("00:00:01.").is_err());
    }

    #[test]
    fn test_compute_bitrate_reference() {
        let expected = (0.076_f64 * 1920.0 * 1080.0 * 24.0 / 1000.0).round() as u32;
        assert_eq!(compute_bitrate(Some(1920), Some(1080), Some(24.0), Some(0.076)), Some(expected));
        assert_eq!(expected, 3782);
    }

    #[test]
    fn test_compute_bitrate_missing_geometry() {
        assert_eq!(compute_bitrate(None, Some(1080), Some(24.0), None), None);
        assert_eq!(compute_bitrate(Some(1920), None, Some(24.0), None), None);
        assert_eq!(compute_bitrate(Some(1920), Some(1080), None, None), None);
    }

    #[test]
    fn test_table_strategy() {
        assert_eq!(BpfStrategy::Table.bits_per_pixel_frame(1920, 1080), Some(0.076));
        assert_eq!(BpfStrategy::Table.bits_per_pixel_frame(1280, 720), Some(0.092));
        assert_eq!(BpfStrategy::Table.bits_per_pixel_frame(720, 576), None);
        assert_eq!(
            compute_bitrate_with(BpfStrategy::Table, Some(720), Some(576), Some(25.0), None),
            None
        );
    }

    #[test]
    fn test_continuous_matches_table_anchors() {
        let hd = bits_per_pixel_frame(1920, 1080).unwrap();
        let hd_ready = bits_per_pixel_frame(1280, 720).unwrap();
        assert!((hd - 0.076).abs() < 1e-9);
        assert!((hd_ready - 0.092).abs() < 1e-3, "got {}", hd_ready);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every well-formed timestamp converts to h*3600 + m*60 + s
        #[test]
        fn test_duration_roundtrip(h in 0u64..100, m in 0u64..60, s in 0u64..60, ms in proptest::option::of(0u32..1000)) {
            let text = match ms {
                Some(ms) => format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms),
                None => format!("{:02}:{:02}:{:02}", h, m, s),
            };
            prop_assert_eq!(duration_to_seconds(&text), Ok(h * 3600 + m * 60 + s));
        }

        /// More pixels never means more bits per pixel
        #[test]
        fn test_bpf_monotonic(w in 16u32..8000, h in 16u32..5000, grow in 1u32..500) {
            let small = bits_per_pixel_frame(w, h).unwrap();
            let large = bits_per_pixel_frame(w + grow, h).unwrap();
            prop_assert!(large <= small);
            prop_assert!(large > 0.0);
        }

        /// Bitrate follows the bits-per-frame formula exactly when bpf is given
        #[test]
        fn test_bitrate_formula(w in 1u32..4096, h in 1u32..2160, fps in 1.0f64..120.0, bpf in 0.01f64..0.5) {
            let expected = (bpf * f64::from(w) * f64::from(h) * fps / 1000.0).round() as u32;
            prop_assert_eq!(compute_bitrate(Some(w), Some(h), Some(fps), Some(bpf)), Some(expected));
        }
    }
}
