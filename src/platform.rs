//! Platform profile resolution — the static resource budget per device
//! class.
//!
//! Resolved once per process from host signals and passed explicitly into
//! the pipeline; lower stages never read ambient state. Resolution never
//! fails: an unknown environment gets the conservative desktop-class
//! default.

use std::thread;

use image::imageops::FilterType;
use serde::Serialize;
use tracing::debug;

use crate::config;
use crate::extraction::BackendId;

// ═══════════════════════════════════════════════════════════
// Constants — class heuristics and budgets
// ═══════════════════════════════════════════════════════════

/// Hosts at or below this much RAM are treated as phone-class.
const MOBILE_MAX_RAM: u64 = 4_000_000_000;

/// Below this, the host is constrained phone-class: tighter working
/// dimension, region search skipped entirely.
const CONSTRAINED_MAX_RAM: u64 = 2_500_000_000;

/// Phone-class core-count ceiling.
const MOBILE_MAX_CORES: usize = 4;

/// Fallback RAM when detection fails (desktop-class assumption).
const DEFAULT_RAM_FALLBACK: u64 = 8_000_000_000;

/// Overall wall-clock budget across *all* attempts, not per attempt.
const MOBILE_BUDGET_MS: u64 = 15_000;
const DESKTOP_BUDGET_MS: u64 = 30_000;

/// Working-dimension cap for constrained phone-class hosts.
const MOBILE_CONSTRAINED_DIMENSION: u32 = 1280;

/// Working-dimension cap everywhere else.
const STANDARD_WORKING_DIMENSION: u32 = 1920;

/// Phone-class backend cap, bounding total attempt count.
const MOBILE_MAX_BACKENDS: usize = 2;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Coarse device class driving every budget below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

/// Resize filter quality tier.
///
/// CatmullRom over Lanczos3 for symbol edges: comparable sharpness without
/// ringing around high-contrast module boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeQuality {
    /// CatmullRom — clean downscales for module-accurate sampling.
    High,
    /// Triangle (bilinear) — fast, acceptable for constrained hosts.
    Fast,
}

impl ResizeQuality {
    pub(crate) fn filter_type(&self) -> FilterType {
        match self {
            Self::High => FilterType::CatmullRom,
            Self::Fast => FilterType::Triangle,
        }
    }
}

/// The static resource budget. Immutable once resolved.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub device_class: DeviceClass,
    /// Largest working-image dimension the progressive resizer will target
    /// below the original.
    pub max_working_dimension: u32,
    /// Shared wall-clock budget across the whole attempt matrix.
    pub overall_budget_ms: u64,
    /// How many engines from the priority registry are consulted.
    pub max_backends: usize,
    /// Whether fallback region crops are searched at all.
    pub enable_region_search: bool,
    /// Whether sharpen-based strategies stay in the catalog.
    pub enable_sharpen: bool,
    pub resize_filter: ResizeQuality,
}

impl PlatformProfile {
    /// Phone-class budget. `constrained` marks low-RAM hardware: tighter
    /// working dimension and no region search.
    pub fn mobile(constrained: bool) -> Self {
        Self {
            device_class: DeviceClass::Mobile,
            max_working_dimension: if constrained {
                MOBILE_CONSTRAINED_DIMENSION
            } else {
                STANDARD_WORKING_DIMENSION
            },
            overall_budget_ms: MOBILE_BUDGET_MS,
            max_backends: MOBILE_MAX_BACKENDS,
            enable_region_search: !constrained,
            enable_sharpen: true,
            resize_filter: ResizeQuality::Fast,
        }
    }

    /// Desktop-class budget: every engine, region search on, no sharpening
    /// by default.
    pub fn desktop() -> Self {
        Self {
            device_class: DeviceClass::Desktop,
            max_working_dimension: STANDARD_WORKING_DIMENSION,
            overall_budget_ms: DESKTOP_BUDGET_MS,
            max_backends: BackendId::PRIORITY.len(),
            enable_region_search: true,
            enable_sharpen: false,
            resize_filter: ResizeQuality::High,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Resolution
// ═══════════════════════════════════════════════════════════

/// Resolve the profile from host signals. Pure function of the
/// environment; never panics.
///
/// Priority: `QRLIFT_DEVICE_CLASS` env override, then RAM/core heuristics,
/// then the desktop-class default.
pub fn resolve() -> PlatformProfile {
    if let Ok(value) = std::env::var(config::ENV_DEVICE_CLASS) {
        match value.as_str() {
            "mobile" => return PlatformProfile::mobile(false),
            "mobile-constrained" => return PlatformProfile::mobile(true),
            "desktop" => return PlatformProfile::desktop(),
            other => {
                debug!(value = other, "unrecognized device class override, ignoring")
            }
        }
    }

    let ram = detect_system_ram();
    let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(0);

    if ram <= MOBILE_MAX_RAM || (cores > 0 && cores <= MOBILE_MAX_CORES) {
        let constrained = ram <= CONSTRAINED_MAX_RAM;
        debug!(ram, cores, constrained, "phone-class host detected");
        return PlatformProfile::mobile(constrained);
    }

    debug!(ram, cores, "desktop-class host");
    PlatformProfile::desktop()
}

/// Total system RAM in bytes.
///
/// Reads `/proc/meminfo` on Linux. Falls back to a desktop-class
/// assumption when detection fails (non-Linux platform, sandbox).
pub fn detect_system_ram() -> u64 {
    detect_system_ram_inner().unwrap_or(DEFAULT_RAM_FALLBACK)
}

fn detect_system_ram_inner() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            // Format: "MemTotal:       16384000 kB"
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    // ── Canonical profiles ──────────────────────────────

    #[test]
    fn mobile_profile_budgets() {
        let p = PlatformProfile::mobile(false);
        assert_eq!(p.device_class, DeviceClass::Mobile);
        assert_eq!(p.max_working_dimension, 1920);
        assert_eq!(p.overall_budget_ms, 15_000);
        assert_eq!(p.max_backends, 2);
        assert!(p.enable_region_search);
        assert!(p.enable_sharpen);
        assert_eq!(p.resize_filter, ResizeQuality::Fast);
    }

    #[test]
    fn constrained_mobile_tightens_dimension_and_drops_region_search() {
        let p = PlatformProfile::mobile(true);
        assert_eq!(p.max_working_dimension, 1280);
        assert!(!p.enable_region_search);
        assert!(p.enable_sharpen);
    }

    #[test]
    fn desktop_profile_budgets() {
        let p = PlatformProfile::desktop();
        assert_eq!(p.device_class, DeviceClass::Desktop);
        assert_eq!(p.max_working_dimension, 1920);
        assert_eq!(p.overall_budget_ms, 30_000);
        assert_eq!(p.max_backends, 3);
        assert!(p.enable_region_search);
        assert!(!p.enable_sharpen);
        assert_eq!(p.resize_filter, ResizeQuality::High);
    }

    // ── Resolution ──────────────────────────────────────

    // Single test so parallel execution never interleaves writes to the
    // override variable.
    #[test]
    fn env_override_forces_the_class() {
        std::env::set_var(config::ENV_DEVICE_CLASS, "mobile-constrained");
        let p = resolve();
        assert_eq!(p.device_class, DeviceClass::Mobile);
        assert_eq!(p.max_working_dimension, 1280);

        std::env::set_var(config::ENV_DEVICE_CLASS, "desktop");
        let p = resolve();
        assert_eq!(p.device_class, DeviceClass::Desktop);

        // unknown override falls through to detection; must not panic
        std::env::set_var(config::ENV_DEVICE_CLASS, "smartwatch");
        let p = resolve();
        assert!(p.max_backends >= 1);

        std::env::remove_var(config::ENV_DEVICE_CLASS);
    }

    #[test]
    fn detect_system_ram_returns_nonzero() {
        assert!(detect_system_ram() > 0);
    }
}
