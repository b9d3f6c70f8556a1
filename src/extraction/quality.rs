//! Read-only source quality analysis.
//!
//! Runs once per extraction, before the search loop. None of these scores
//! gate the search — the caller submitted this image, so extraction always
//! runs — but an `undetected` outcome paired with "blurry, low contrast"
//! lets the manual-entry fallback explain itself.

use serde::Serialize;

use crate::platform::ResizeQuality;

use super::raster::PixelBuffer;
use super::resize;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Analysis runs on a copy bounded to this longest dimension; scores are
/// stable under moderate downscaling and camera-resolution input would make
/// the Laplacian pass the most expensive stage of the whole pipeline.
const ANALYSIS_CAP: u32 = 1024;

/// Laplacian variance below this reads as blurry. Sharp symbol edges score
/// well above 500.
const BLUR_THRESHOLD: f32 = 100.0;

/// RMS contrast below this reads as near-uniform.
const CONTRAST_THRESHOLD: f32 = 25.0;

/// Per-pixel channel spread above this counts as a colored pixel.
const COLOR_SPREAD_THRESHOLD: u8 = 12;

/// Fraction of colored pixels above which the source is classified colored.
const COLOR_RATIO_THRESHOLD: f32 = 0.02;

/// Sources with fewer pixels than this cannot be classified meaningfully.
const MIN_CLASSIFY_PIXELS: usize = 64;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Source palette classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorClass {
    Colored,
    Grayscale,
}

/// Quality scores for the canonical source buffer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceQuality {
    /// Laplacian variance — higher is sharper.
    pub blur_score: f32,
    /// RMS contrast (0-127.5 theoretical range).
    pub contrast_score: f32,
    pub color_class: ColorClass,
    pub is_blurry: bool,
    pub is_low_contrast: bool,
}

// ═══════════════════════════════════════════════════════════
// Assessment
// ═══════════════════════════════════════════════════════════

/// Assess the canonical buffer. Pure read-only analysis; never fails — an
/// unresizable buffer is analyzed at native resolution instead.
pub fn assess(buffer: &PixelBuffer) -> SourceQuality {
    let bounded;
    let subject = if buffer.size().longest() > ANALYSIS_CAP {
        let target = resize::fit_within(buffer.width(), buffer.height(), ANALYSIS_CAP);
        match resize::scale_to(buffer, target, ResizeQuality::Fast) {
            Ok(scaled) => {
                bounded = scaled;
                &bounded
            }
            Err(_) => buffer,
        }
    } else {
        buffer
    };

    let luma = subject.to_luma();
    let width = subject.width() as usize;
    let height = subject.height() as usize;

    let blur_score = laplacian_variance(&luma, width, height);
    let contrast_score = rms_contrast(&luma);

    SourceQuality {
        blur_score,
        contrast_score,
        color_class: classify_colors(subject),
        is_blurry: blur_score < BLUR_THRESHOLD,
        is_low_contrast: contrast_score < CONTRAST_THRESHOLD,
    }
}

/// Laplacian variance over interior pixels — the standard blur metric.
/// Kernel `[0,1,0; 1,-4,1; 0,1,0]`.
fn laplacian_variance(luma: &[u8], width: usize, height: usize) -> f32 {
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let idx = y * width + x;
            let center = luma[idx] as f64;
            let response = luma[idx - width] as f64
                + luma[idx + width] as f64
                + luma[idx - 1] as f64
                + luma[idx + 1] as f64
                - 4.0 * center;
            sum += response;
            sum_sq += response * response;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - mean * mean;
    variance.max(0.0) as f32
}

/// RMS contrast — standard deviation of the luminance plane.
fn rms_contrast(luma: &[u8]) -> f32 {
    if luma.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &v in luma {
        let v = v as f64;
        sum += v;
        sum_sq += v * v;
    }
    let count = luma.len() as f64;
    let mean = sum / count;
    let variance = (sum_sq / count) - mean * mean;
    variance.max(0.0).sqrt() as f32
}

/// Classify the source palette from per-pixel channel spread.
///
/// Sources too small to sample meaningfully default to `Colored` by
/// convention — a heuristic carried over from the product, not a
/// correctness property.
fn classify_colors(buffer: &PixelBuffer) -> ColorClass {
    let pixels = buffer.pixels();
    let count = pixels.len() / 4;
    if count < MIN_CLASSIFY_PIXELS {
        return ColorClass::Colored;
    }

    let colored = pixels
        .chunks_exact(4)
        .filter(|px| {
            let max = px[0].max(px[1]).max(px[2]);
            let min = px[0].min(px[1]).min(px[2]);
            max - min > COLOR_SPREAD_THRESHOLD
        })
        .count();

    if colored as f32 / count as f32 > COLOR_RATIO_THRESHOLD {
        ColorClass::Colored
    } else {
        ColorClass::Grayscale
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
