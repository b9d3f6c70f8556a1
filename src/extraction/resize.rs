//! Progressive resizer — prioritized scale targets for a source frame.
//!
//! Most QR payloads are recoverable at native print resolution long before
//! the full camera resolution is needed, so smaller targets come first:
//! they cut both memory pressure and typical-case latency. The original
//! dimensions are always the final entry, tried only when nothing smaller
//! succeeded.

use crate::platform::{DeviceClass, PlatformProfile, ResizeQuality};

use super::raster::{PixelBuffer, Size};
use super::ExtractionError;

/// Mobile sources longer than this on either axis get a small normalized
/// pass before anything else.
const MOBILE_PRESCALE_TRIGGER: u32 = 960;

/// Target for that first mobile pass.
const MOBILE_PRESCALE_TARGET: u32 = 640;

/// Ordered scale targets for a source frame. The final element is always
/// the original dimensions; duplicates are collapsed.
pub fn progressive_sizes(width: u32, height: u32, profile: &PlatformProfile) -> Vec<Size> {
    let original = Size { width, height };
    let longest = original.longest();
    let mut sizes: Vec<Size> = Vec::new();

    let push = |sizes: &mut Vec<Size>, candidate: Size| {
        if !sizes.contains(&candidate) {
            sizes.push(candidate);
        }
    };

    if profile.device_class == DeviceClass::Mobile && longest > MOBILE_PRESCALE_TRIGGER {
        push(&mut sizes, fit_within(width, height, MOBILE_PRESCALE_TARGET));
    }
    if longest > profile.max_working_dimension {
        push(&mut sizes, fit_within(width, height, profile.max_working_dimension));
    }
    push(&mut sizes, original);
    sizes
}

/// Aspect-preserving fit under a longest-dimension cap. Never upscales;
/// never collapses a dimension below one pixel.
pub fn fit_within(width: u32, height: u32, cap: u32) -> Size {
    let longest = width.max(height);
    if longest <= cap {
        return Size { width, height };
    }
    let fit = |dim: u32| ((dim as u64 * cap as u64) / longest as u64).max(1) as u32;
    Size {
        width: fit(width),
        height: fit(height),
    }
}

/// Scale a buffer to an exact target, allocating a new buffer.
pub fn scale_to(
    buffer: &PixelBuffer,
    target: Size,
    quality: ResizeQuality,
) -> Result<PixelBuffer, ExtractionError> {
    if target == buffer.size() {
        return Ok(buffer.clone());
    }
    let img = buffer.to_rgba_image()?;
    let resized = image::imageops::resize(&img, target.width, target.height, quality.filter_type());
    PixelBuffer::from_rgba_image(resized)
}

/// Scale a working buffer for one attempt.
///
/// A full-frame buffer goes to the exact target. A cropped region is instead
/// fitted under the target's longest dimension, since the progressive targets
/// are defined against the full frame.
pub(crate) fn scale_for_attempt(
    buffer: &PixelBuffer,
    scale: Size,
    original: Size,
    quality: ResizeQuality,
) -> Result<PixelBuffer, ExtractionError> {
    if scale == original {
        return Ok(buffer.clone());
    }
    if buffer.size() == original {
        return scale_to(buffer, scale, quality);
    }
    let target = fit_within(buffer.width(), buffer.height(), scale.longest());
    scale_to(buffer, target, quality)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
