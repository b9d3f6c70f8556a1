//! Preprocessing filter chain — pure pixel transforms composable into named
//! strategies.
//!
//! A strategy is plain data; `apply` composes the filters in a fixed order
//! (grayscale → contrast → brightness → invert → sharpen) and always returns
//! a new buffer. The catalogs differ by device class: the mobile list is the
//! short set of empirically-dominant fixes for hand-held captures, the
//! desktop list adds inversion and color-space variants.

use serde::Serialize;

use crate::platform::{DeviceClass, PlatformProfile};

use super::raster::PixelBuffer;

// ═══════════════════════════════════════════════════════════
// Strategy type and catalog
// ═══════════════════════════════════════════════════════════

/// A named, ordered combination of filter parameters. Pure data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreprocessingStrategy {
    pub label: &'static str,
    pub grayscale: bool,
    /// Contrast factor around the 128 midpoint; `None` leaves contrast alone.
    pub contrast: Option<f32>,
    /// Additive brightness delta, clamped per channel.
    pub brightness: Option<i16>,
    pub invert: bool,
    pub sharpen: bool,
}

const fn strategy(label: &'static str) -> PreprocessingStrategy {
    PreprocessingStrategy {
        label,
        grayscale: false,
        contrast: None,
        brightness: None,
        invert: false,
        sharpen: false,
    }
}

/// Identity strategy — no filter applied.
pub const RAW: PreprocessingStrategy = strategy("raw");

/// Grayscale with a moderate contrast boost; the dominant fix for washed-out
/// hand-held photos.
pub const GRAY_CONTRAST: PreprocessingStrategy = PreprocessingStrategy {
    grayscale: true,
    contrast: Some(1.5),
    ..strategy("gray-contrast")
};

/// Aggressive contrast with a slight lift for underexposed captures.
pub const GRAY_CONTRAST_BRIGHT: PreprocessingStrategy = PreprocessingStrategy {
    grayscale: true,
    contrast: Some(2.0),
    brightness: Some(10),
    ..strategy("gray-contrast-bright")
};

/// Grayscale plus sharpen convolution; recovers soft focus, best after a
/// downscale has already averaged out sensor noise.
pub const GRAY_SHARPEN: PreprocessingStrategy = PreprocessingStrategy {
    grayscale: true,
    sharpen: true,
    ..strategy("gray-sharpen")
};

/// Strong contrast pulled slightly darker, for glare-bleached captures.
pub const GRAY_CONTRAST_DIM: PreprocessingStrategy = PreprocessingStrategy {
    grayscale: true,
    contrast: Some(1.8),
    brightness: Some(-10),
    ..strategy("gray-contrast-dim")
};

/// Plain inversion for light-on-dark codes.
pub const INVERT: PreprocessingStrategy = PreprocessingStrategy {
    invert: true,
    ..strategy("invert")
};

pub const GRAY_INVERT: PreprocessingStrategy = PreprocessingStrategy {
    grayscale: true,
    invert: true,
    ..strategy("gray-invert")
};

pub const GRAY_CONTRAST_INVERT: PreprocessingStrategy = PreprocessingStrategy {
    grayscale: true,
    contrast: Some(1.5),
    invert: true,
    ..strategy("gray-contrast-invert")
};

/// Mild contrast boost in the original color space.
pub const CONTRAST: PreprocessingStrategy = PreprocessingStrategy {
    contrast: Some(1.3),
    ..strategy("contrast")
};

pub const GRAY_BRIGHT: PreprocessingStrategy = PreprocessingStrategy {
    grayscale: true,
    brightness: Some(25),
    ..strategy("gray-bright")
};

/// Mobile catalog, in fixed priority order.
const MOBILE_STRATEGIES: [PreprocessingStrategy; 5] = [
    RAW,
    GRAY_CONTRAST,
    GRAY_CONTRAST_BRIGHT,
    GRAY_SHARPEN,
    GRAY_CONTRAST_DIM,
];

/// Desktop catalog: the mobile contrast fixes plus inversion and color-space
/// variants. No sharpen entries — desktop profiles disable sharpening.
const DESKTOP_STRATEGIES: [PreprocessingStrategy; 9] = [
    RAW,
    GRAY_CONTRAST,
    GRAY_CONTRAST_BRIGHT,
    GRAY_CONTRAST_DIM,
    INVERT,
    GRAY_INVERT,
    GRAY_CONTRAST_INVERT,
    CONTRAST,
    GRAY_BRIGHT,
];

/// The strategy list for a profile, in attempt priority order.
///
/// Sharpen-based strategies are dropped when the profile disables sharpening.
pub fn strategies_for(profile: &PlatformProfile) -> Vec<PreprocessingStrategy> {
    let catalog: &[PreprocessingStrategy] = match profile.device_class {
        DeviceClass::Mobile => &MOBILE_STRATEGIES,
        DeviceClass::Desktop => &DESKTOP_STRATEGIES,
    };
    catalog
        .iter()
        .copied()
        .filter(|s| !s.sharpen || profile.enable_sharpen)
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Application
// ═══════════════════════════════════════════════════════════

/// Apply a strategy to a buffer, producing a new buffer.
///
/// Filters compose in a fixed order: grayscale → contrast → brightness →
/// invert → sharpen. The empty strategy is a byte-for-byte identity. Alpha
/// is never touched.
pub fn apply(source: &PixelBuffer, strategy: &PreprocessingStrategy) -> PixelBuffer {
    let mut out = source.clone();
    if strategy.grayscale {
        grayscale_in_place(&mut out);
    }
    if let Some(factor) = strategy.contrast {
        contrast_in_place(&mut out, factor);
    }
    if let Some(delta) = strategy.brightness {
        brightness_in_place(&mut out, delta);
    }
    if strategy.invert {
        invert_in_place(&mut out);
    }
    if strategy.sharpen {
        out = sharpen(&out);
    }
    out
}

/// ITU-R BT.601 luminance replaces all three color channels.
fn grayscale_in_place(buffer: &mut PixelBuffer) {
    for px in buffer.pixels_mut().chunks_exact_mut(4) {
        let gray =
            (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32) as u8;
        px[0] = gray;
        px[1] = gray;
        px[2] = gray;
    }
}

/// `v' = clamp((v - 128) * factor + 128)` per color channel.
fn contrast_in_place(buffer: &mut PixelBuffer, factor: f32) {
    for px in buffer.pixels_mut().chunks_exact_mut(4) {
        for channel in &mut px[..3] {
            let v = (*channel as f32 - 128.0) * factor + 128.0;
            *channel = v.clamp(0.0, 255.0) as u8;
        }
    }
}

/// `v' = clamp(v + delta)` per color channel.
fn brightness_in_place(buffer: &mut PixelBuffer, delta: i16) {
    for px in buffer.pixels_mut().chunks_exact_mut(4) {
        for channel in &mut px[..3] {
            *channel = (*channel as i16 + delta).clamp(0, 255) as u8;
        }
    }
}

/// `v' = 255 - v` per color channel. Involutive.
fn invert_in_place(buffer: &mut PixelBuffer) {
    for px in buffer.pixels_mut().chunks_exact_mut(4) {
        for channel in &mut px[..3] {
            *channel = 255 - *channel;
        }
    }
}

/// 3x3 sharpen convolution `[0,-1,0; -1,5,-1; 0,-1,0]`.
///
/// Interior pixels only; border pixels are copied unchanged. The kernel sums
/// to 1, so uniform areas pass through untouched.
fn sharpen(source: &PixelBuffer) -> PixelBuffer {
    let width = source.width() as usize;
    let height = source.height() as usize;
    if width < 3 || height < 3 {
        return source.clone();
    }

    let mut out = source.clone();
    let src = source.pixels();
    let stride = width * 4;
    let dst = out.pixels_mut();

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let base = y * stride + x * 4;
            for c in 0..3 {
                let center = src[base + c] as i32;
                let up = src[base - stride + c] as i32;
                let down = src[base + stride + c] as i32;
                let left = src[base - 4 + c] as i32;
                let right = src[base + 4 + c] as i32;
                let v = 5 * center - up - down - left - right;
                dst[base + c] = v.clamp(0, 255) as u8;
            }
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
