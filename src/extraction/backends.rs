//! Uniform adapters around the independent QR decoding engines.
//!
//! Each engine is an opaque capability behind `DecodeBackend`: hand it a
//! pixel buffer, get back a payload or nothing. Engine errors never escape
//! an adapter — they are logged at debug level and collapse to "no symbol",
//! so one failing engine cannot affect the others.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::raster::PixelBuffer;

// ═══════════════════════════════════════════════════════════
// Backend identity
// ═══════════════════════════════════════════════════════════

/// Closed set of decoding engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    /// ZXing port — the reliable general-purpose engine.
    Zxing,
    /// Pure-algorithmic fallback.
    Rqrr,
    /// Specialized scanner (quirc port).
    Quirc,
}

impl BackendId {
    /// Fixed priority order, by empirical success rate on real captures.
    pub const PRIORITY: [BackendId; 3] = [BackendId::Zxing, BackendId::Rqrr, BackendId::Quirc];

    /// Static confidence prior. The engines expose no per-attempt
    /// confidence, so each backend carries a fixed score with the
    /// most reliable engine highest.
    pub fn confidence_prior(&self) -> f32 {
        match self {
            Self::Zxing => 0.92,
            Self::Rqrr => 0.85,
            Self::Quirc => 0.78,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zxing => "zxing",
            Self::Rqrr => "rqrr",
            Self::Quirc => "quirc",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════
// Capability trait and registry
// ═══════════════════════════════════════════════════════════

/// An opaque decoding engine.
pub trait DecodeBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Attempt a decode. `None` means "no symbol found here"; adapter
    /// implementations recover engine errors internally.
    fn try_decode(&self, buffer: &PixelBuffer) -> Option<String>;
}

/// The production registry in priority order, truncated to `max_backends`.
pub fn registry(max_backends: usize) -> Vec<Arc<dyn DecodeBackend>> {
    let all: [Arc<dyn DecodeBackend>; 3] = [
        Arc::new(ZxingBackend),
        Arc::new(RqrrBackend),
        Arc::new(QuircBackend),
    ];
    all.into_iter().take(max_backends).collect()
}

// ═══════════════════════════════════════════════════════════
// Adapters
// ═══════════════════════════════════════════════════════════

// ── ZXing (rxing) ─────────────────────────────────────────

/// General-purpose engine: luma source → hybrid binarizer → multi-format
/// reader restricted to QR, with the try-harder pass enabled.
pub struct ZxingBackend;

impl DecodeBackend for ZxingBackend {
    fn id(&self) -> BackendId {
        BackendId::Zxing
    }

    fn try_decode(&self, buffer: &PixelBuffer) -> Option<String> {
        use rxing::common::HybridBinarizer;
        use rxing::{
            BarcodeFormat, BinaryBitmap, DecodeHintValue, DecodeHints, Luma8LuminanceSource,
            MultiFormatReader, Reader,
        };

        let luma = buffer.to_luma();
        let source = Luma8LuminanceSource::new(luma, buffer.width(), buffer.height());
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));

        let mut formats = HashSet::new();
        formats.insert(BarcodeFormat::QR_CODE);
        let hints = DecodeHints::default()
            .with(DecodeHintValue::TryHarder(true))
            .with(DecodeHintValue::PossibleFormats(formats));

        let mut reader = MultiFormatReader::default();
        match reader.decode_with_hints(&mut bitmap, &hints) {
            Ok(result) => Some(result.getText().to_string()),
            Err(err) => {
                debug!(backend = %self.id(), error = ?err, "no symbol");
                None
            }
        }
    }
}

// ── rqrr ──────────────────────────────────────────────────

/// Pure-algorithmic fallback engine.
pub struct RqrrBackend;

impl DecodeBackend for RqrrBackend {
    fn id(&self) -> BackendId {
        BackendId::Rqrr
    }

    fn try_decode(&self, buffer: &PixelBuffer) -> Option<String> {
        let luma = buffer.to_luma();
        let width = buffer.width() as usize;
        let height = buffer.height() as usize;

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => return Some(content),
                Err(err) => debug!(backend = %self.id(), error = ?err, "grid decode failed"),
            }
        }
        None
    }
}

// ── quirc (quircs) ────────────────────────────────────────

/// Specialized scanner engine.
pub struct QuircBackend;

impl DecodeBackend for QuircBackend {
    fn id(&self) -> BackendId {
        BackendId::Quirc
    }

    fn try_decode(&self, buffer: &PixelBuffer) -> Option<String> {
        let luma = buffer.to_luma();
        let mut decoder = quircs::Quirc::default();
        let codes = decoder.identify(
            buffer.width() as usize,
            buffer.height() as usize,
            &luma,
        );

        for code in codes {
            let code = match code {
                Ok(code) => code,
                Err(err) => {
                    debug!(backend = %self.id(), error = ?err, "candidate extraction failed");
                    continue;
                }
            };
            match code.decode() {
                Ok(data) => match String::from_utf8(data.payload) {
                    Ok(content) => return Some(content),
                    Err(err) => {
                        debug!(backend = %self.id(), error = %err, "payload is not UTF-8")
                    }
                },
                Err(err) => debug!(backend = %self.id(), error = ?err, "candidate decode failed"),
            }
        }
        None
    }
}

// ═══════════════════════════════════════════════════════════
// Test double
// ═══════════════════════════════════════════════════════════

/// Configurable stand-in engine: runs an arbitrary responder against the
/// buffer it is handed. Allows tests to pin success to an exact
/// (strategy, size, region) combination by inspecting the pixels.
pub struct StubBackend {
    id: BackendId,
    responder: Box<dyn Fn(&PixelBuffer) -> Option<String> + Send + Sync>,
}

impl StubBackend {
    pub fn new(
        id: BackendId,
        responder: impl Fn(&PixelBuffer) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            responder: Box::new(responder),
        }
    }

    /// A stub that never finds a symbol.
    pub fn always_failing(id: BackendId) -> Self {
        Self::new(id, |_| None)
    }
}

impl DecodeBackend for StubBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn try_decode(&self, buffer: &PixelBuffer) -> Option<String> {
        (self.responder)(buffer)
    }
}

// ═══════════════════════════════════════════════════════════
// Test support
// ═══════════════════════════════════════════════════════════

/// Rasterize a QR symbol into an RGBA buffer: black modules on white,
/// four-module quiet zone, `scale` pixels per module.
#[cfg(test)]
pub(crate) fn rasterize_qr(content: &str, scale: u32) -> PixelBuffer {
    let code = qrcode::QrCode::new(content.as_bytes()).unwrap();
    let colors = code.to_colors();
    let modules = code.width();
    let quiet = 4usize;
    let scale = scale as usize;
    let side = (modules + 2 * quiet) * scale;

    let mut pixels = vec![255u8; side * side * 4];
    for (index, color) in colors.iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let mx = index % modules;
        let my = index / modules;
        for dy in 0..scale {
            for dx in 0..scale {
                let px = (quiet + mx) * scale + dx;
                let py = (quiet + my) * scale + dy;
                let base = (py * side + px) * 4;
                pixels[base] = 0;
                pixels[base + 1] = 0;
                pixels[base + 2] = 0;
            }
        }
    }
    PixelBuffer::new(side as u32, side as u32, pixels).unwrap()
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
