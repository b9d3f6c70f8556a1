//! Owned RGBA raster types — the unit every pipeline transform operates on.
//!
//! A `PixelBuffer` is exclusively owned by whichever stage currently holds
//! it; transforms allocate a new buffer and the previous one drops at the end
//! of the attempt scope. On constrained hosts this is a correctness
//! requirement, not an optimization: a handful of retained camera-resolution
//! rasters is enough to exhaust the heap.

use std::fmt;
use std::io::Cursor;

use serde::Serialize;

use super::ExtractionError;

// ═══════════════════════════════════════════════════════════
// PixelBuffer
// ═══════════════════════════════════════════════════════════

/// An owned, mutable RGBA raster with explicit dimensions.
///
/// Invariant: `pixels.len() == width * height * 4`, row-major, enforced at
/// construction and preserved by every method here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, validating the geometry invariant.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ExtractionError> {
        if width == 0 || height == 0 {
            return Err(ExtractionError::ZeroDimensions);
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ExtractionError::BufferGeometry {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Solid-color buffer. Used by synthetic inputs and tests.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, ExtractionError> {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// RGBA value at (x, y). Panics on out-of-bounds — test/debug helper.
    #[cfg(test)]
    pub(crate) fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let base = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[base],
            self.pixels[base + 1],
            self.pixels[base + 2],
            self.pixels[base + 3],
        ]
    }

    /// Copy out a rectangular sub-region as a new owned buffer.
    ///
    /// The full-frame region degenerates to a plain clone.
    pub fn crop(&self, region: &Region) -> Result<PixelBuffer, ExtractionError> {
        region.check_within(self.width, self.height)?;
        if region.is_full_frame(self.width, self.height) {
            return Ok(self.clone());
        }

        let stride = self.width as usize * 4;
        let row_bytes = region.width as usize * 4;
        let mut pixels = Vec::with_capacity(region.height as usize * row_bytes);
        for row in region.y..region.y + region.height {
            let start = row as usize * stride + region.x as usize * 4;
            pixels.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }
        PixelBuffer::new(region.width, region.height, pixels)
    }

    /// Luminance plane for the decoding engines.
    ///
    /// Integer BT.601: `(77R + 150G + 29B) >> 8`. The engines binarize
    /// internally, so rounding differences against the float-weighted
    /// grayscale filter are irrelevant here.
    pub fn to_luma(&self) -> Vec<u8> {
        let mut luma = Vec::with_capacity(self.width as usize * self.height as usize);
        for px in self.pixels.chunks_exact(4) {
            let r = px[0] as u32;
            let g = px[1] as u32;
            let b = px[2] as u32;
            luma.push(((77 * r + 150 * g + 29 * b) >> 8) as u8);
        }
        luma
    }

    pub(crate) fn from_rgba_image(img: image::RgbaImage) -> Result<Self, ExtractionError> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    pub(crate) fn to_rgba_image(&self) -> Result<image::RgbaImage, ExtractionError> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or(
            ExtractionError::BufferGeometry {
                expected: self.width as usize * self.height as usize * 4,
                actual: self.pixels.len(),
            },
        )
    }

    /// PNG-encode the buffer (diagnostic dumps).
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, ExtractionError> {
        let img = self.to_rgba_image()?;
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

// ═══════════════════════════════════════════════════════════
// Region
// ═══════════════════════════════════════════════════════════

/// A rectangular sub-area of a source buffer, in source pixel coordinates.
///
/// Invariant: `x + width <= source_width`, `y + height <= source_height`
/// for the buffer it is applied to (checked at crop time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// The whole frame of a `width` x `height` buffer.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_full_frame(&self, source_width: u32, source_height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == source_width && self.height == source_height
    }

    pub(crate) fn check_within(
        &self,
        source_width: u32,
        source_height: u32,
    ) -> Result<(), ExtractionError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExtractionError::RegionBounds(format!(
                "region {}x{} at ({}, {}) is empty",
                self.width, self.height, self.x, self.y
            )));
        }
        let x_end = self.x as u64 + self.width as u64;
        let y_end = self.y as u64 + self.height as u64;
        if x_end > source_width as u64 || y_end > source_height as u64 {
            return Err(ExtractionError::RegionBounds(format!(
                "region {}x{} at ({}, {}) exceeds source {}x{}",
                self.width, self.height, self.x, self.y, source_width, source_height
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Size
// ═══════════════════════════════════════════════════════════

/// A resize target in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// The longer of the two dimensions.
    pub fn longest(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
