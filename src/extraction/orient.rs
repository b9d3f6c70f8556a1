//! Orientation normalizer — best-effort EXIF rotation correction.
//!
//! Phone photos embed their capture rotation in EXIF tag 0x0112; without
//! correction, portrait captures reach the engines sideways. Correction is
//! deliberately best-effort: missing or unreadable metadata returns the
//! buffer unchanged rather than failing, so the fallback is intentional,
//! not implicit.

use std::io::Cursor;

use image::DynamicImage;
use tracing::debug;

use super::raster::PixelBuffer;

/// Read the EXIF orientation tag from the original container bytes.
/// Returns 1 (upright) when no EXIF data or no orientation tag is present.
pub fn exif_orientation(raw: &[u8]) -> u32 {
    let mut cursor = Cursor::new(raw);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(reader) => reader,
        Err(_) => return 1,
    };
    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1)
}

/// Produce a canonically-oriented copy of the buffer.
///
/// `raw` is the original container (EXIF lives there, not in the pixels).
/// Upright or unreadable orientation returns the input buffer as-is; the
/// input is never mutated.
pub fn normalize(raw: &[u8], buffer: PixelBuffer) -> PixelBuffer {
    let orientation = exif_orientation(raw);
    if !(2..=8).contains(&orientation) {
        return buffer;
    }

    let img = match buffer.to_rgba_image() {
        Ok(img) => DynamicImage::ImageRgba8(img),
        Err(_) => return buffer,
    };
    let rotated = apply_orientation(img, orientation);
    debug!(orientation, "applied EXIF orientation correction");
    match PixelBuffer::from_rgba_image(rotated.into_rgba8()) {
        Ok(corrected) => corrected,
        Err(_) => buffer,
    }
}

/// EXIF orientation transform table.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW,
/// 8 = 270deg CW.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_one() -> PixelBuffer {
        // left pixel red, right pixel blue
        PixelBuffer::new(
            2,
            1,
            vec![255, 0, 0, 255, 0, 0, 255, 255],
        )
        .unwrap()
    }

    #[test]
    fn garbage_bytes_read_as_upright() {
        assert_eq!(exif_orientation(b"definitely not an image"), 1);
        assert_eq!(exif_orientation(&[]), 1);
    }

    #[test]
    fn png_without_exif_is_left_unchanged() {
        let buf = two_by_one();
        let png = buf.to_png_bytes().unwrap();
        let normalized = normalize(&png, buf.clone());
        assert_eq!(normalized, buf);
    }

    #[test]
    fn orientation_three_rotates_180() {
        let buf = two_by_one();
        let img = DynamicImage::ImageRgba8(buf.to_rgba_image().unwrap());
        let rotated = apply_orientation(img, 3).into_rgba8();
        // red pixel moved from the left edge to the right edge
        assert_eq!(rotated.get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(rotated.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn orientation_six_rotates_90_cw() {
        let buf = two_by_one();
        let img = DynamicImage::ImageRgba8(buf.to_rgba_image().unwrap());
        let rotated = apply_orientation(img, 6).into_rgba8();
        assert_eq!(rotated.dimensions(), (1, 2));
        // red (leftmost) ends up at the top after a clockwise quarter turn
        assert_eq!(rotated.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn orientation_two_mirrors_horizontally() {
        let buf = two_by_one();
        let img = DynamicImage::ImageRgba8(buf.to_rgba_image().unwrap());
        let flipped = apply_orientation(img, 2).into_rgba8();
        assert_eq!(flipped.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn unknown_orientation_is_noop() {
        let buf = two_by_one();
        let img = DynamicImage::ImageRgba8(buf.to_rgba_image().unwrap());
        let out = apply_orientation(img, 42).into_rgba8();
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }
}
