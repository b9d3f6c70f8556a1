//! Region selector — prioritized sub-regions of the source frame.
//!
//! The full frame always comes first: cheapest, highest expected yield. The
//! fallback crops encode a prior over where photographers position the code:
//! hand-held mobile captures drift slightly off-center and favor the upper
//! part of the frame; desktop sources (screenshots, scans) split cleanly
//! into halves and centered crops.

use crate::platform::{DeviceClass, PlatformProfile};

use super::raster::Region;

/// Ordered scan regions for a source frame. Full frame is element 0.
///
/// Degenerate crops (zero-sized on tiny sources, or collapsing onto the full
/// frame) are dropped rather than emitted, so every returned region honors
/// the bounds invariant.
pub fn regions_for(width: u32, height: u32, profile: &PlatformProfile) -> Vec<Region> {
    let full = Region::full(width, height);
    let mut regions = vec![full];
    if !profile.enable_region_search {
        return regions;
    }

    let fallback = match profile.device_class {
        DeviceClass::Mobile => mobile_fallback(width, height),
        DeviceClass::Desktop => desktop_fallback(width, height),
    };
    for region in fallback {
        if region.width == 0 || region.height == 0 {
            continue;
        }
        if region.is_full_frame(width, height) || regions.contains(&region) {
            continue;
        }
        regions.push(region);
    }
    regions
}

/// Hand-held photography bias: slightly off-center, upper-frame, and
/// centered crops.
fn mobile_fallback(width: u32, height: u32) -> Vec<Region> {
    vec![
        // Slightly off-center 80% crop, anchored toward the top-left.
        Region {
            x: width * 5 / 100,
            y: height * 5 / 100,
            width: width * 80 / 100,
            height: height * 80 / 100,
        },
        // Upper 70% of the frame, full width.
        Region {
            x: 0,
            y: 0,
            width,
            height: height * 70 / 100,
        },
        centered(width, height, 90),
        centered(width, height, 70),
    ]
}

/// Symmetric halves and centered crops.
fn desktop_fallback(width: u32, height: u32) -> Vec<Region> {
    vec![
        Region {
            x: 0,
            y: 0,
            width: width / 2,
            height,
        },
        Region {
            x: width / 2,
            y: 0,
            width: width - width / 2,
            height,
        },
        Region {
            x: 0,
            y: 0,
            width,
            height: height / 2,
        },
        Region {
            x: 0,
            y: height / 2,
            width,
            height: height - height / 2,
        },
        centered(width, height, 80),
        centered(width, height, 50),
    ]
}

/// Centered crop covering `percent` of each dimension.
fn centered(width: u32, height: u32, percent: u32) -> Region {
    let crop_w = width * percent / 100;
    let crop_h = height * percent / 100;
    Region {
        x: (width - crop_w) / 2,
        y: (height - crop_h) / 2,
        width: crop_w,
        height: crop_h,
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
