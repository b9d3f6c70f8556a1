//! Extraction orchestrator — the scheduler over backends × strategies ×
//! sizes × regions.
//!
//! The search runs `Validating → Searching → Succeeded | Exhausted`. Input
//! sanity failures reject before any search work. Inside `Searching` the
//! loop is strictly sequential: one decode in flight at a time, wall-clock
//! budget checked before every attempt, first non-empty payload
//! short-circuits the whole matrix. Every working buffer drops at the end
//! of its attempt, keeping peak memory at one scaled frame regardless of
//! how deep the matrix goes.
//!
//! Per backend the plan escalates from cheap to expensive:
//! 1. a short priority prefix of the combinations that resolve the bulk of
//!    hand-held captures (raw native scan, the dominant contrast fix, and
//!    a downscale-plus-sharpen pass when one applies);
//! 2. the full strategy catalog against the native-size full frame;
//! 3. the catalog across the progressive downscales, still full frame;
//! 4. region crops — the most expensive escalation, reserved for the
//!    first backend to bound total cost.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::diagnostic;
use crate::platform::PlatformProfile;

use super::backends::{registry, DecodeBackend};
use super::filters::{self, PreprocessingStrategy};
use super::orient;
use super::quality;
use super::raster::{PixelBuffer, Region, Size};
use super::regions;
use super::report::{self, MatchedSymbol, SearchOutcome};
use super::resize;
use super::types::{AttemptOutcome, CancelToken, DecodeAttempt, SearchTermination};
use super::{DetectionResult, ExtractionError};

// ═══════════════════════════════════════════════════════════
// Input bounds
// ═══════════════════════════════════════════════════════════

/// Reject containers above this before any pixel work — corrupt or
/// adversarial files would otherwise OOM the decoder.
const MAX_SOURCE_BYTES: usize = 50 * 1024 * 1024;

/// Smallest container any supported format can produce.
const MIN_SOURCE_BYTES: usize = 67;

// ═══════════════════════════════════════════════════════════
// Extractor
// ═══════════════════════════════════════════════════════════

/// One planned (strategy, size, region) combination for a backend.
#[derive(Debug, Clone, PartialEq)]
struct AttemptSpec {
    strategy: PreprocessingStrategy,
    scale: Size,
    region: Region,
}

/// The extraction pipeline, bound to one immutable platform profile.
pub struct Extractor {
    profile: PlatformProfile,
    backends: Vec<Arc<dyn DecodeBackend>>,
}

impl Extractor {
    /// Build with the production engine registry.
    pub fn new(profile: PlatformProfile) -> Self {
        let backends = registry(profile.max_backends);
        Self { profile, backends }
    }

    /// Build with the profile resolved from the host environment.
    pub fn from_environment() -> Self {
        Self::new(crate::platform::resolve())
    }

    /// Replace the engine registry — dependency injection for tests and
    /// embedders with custom engines. The profile's backend cap still
    /// applies at search time.
    pub fn with_backends(mut self, backends: Vec<Arc<dyn DecodeBackend>>) -> Self {
        self.backends = backends;
        self
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    /// Extract from encoded container bytes (JPEG, PNG, WebP).
    pub fn extract(&self, bytes: &[u8]) -> Result<DetectionResult, ExtractionError> {
        self.extract_with_cancel(bytes, &CancelToken::new())
    }

    /// `extract` with a caller-supplied cancellation token, honored at
    /// every attempt boundary.
    pub fn extract_with_cancel(
        &self,
        bytes: &[u8],
        cancel: &CancelToken,
    ) -> Result<DetectionResult, ExtractionError> {
        validate_source_bytes(bytes)?;
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ExtractionError::ImageDecode(e.to_string()))?;
        // zero-dimension frames are rejected here, before Searching
        let buffer = PixelBuffer::from_rgba_image(decoded.into_rgba8())?;
        let canonical = orient::normalize(bytes, buffer);
        self.extract_buffer_with_cancel(canonical, cancel)
    }

    /// Extract from an already-decoded pixel source.
    pub fn extract_buffer(&self, source: PixelBuffer) -> Result<DetectionResult, ExtractionError> {
        self.extract_buffer_with_cancel(source, &CancelToken::new())
    }

    /// Drive the search matrix over a canonical buffer.
    pub fn extract_buffer_with_cancel(
        &self,
        source: PixelBuffer,
        cancel: &CancelToken,
    ) -> Result<DetectionResult, ExtractionError> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        let budget = Duration::from_millis(self.profile.overall_budget_ms);
        let original = source.size();

        info!(
            extraction = %id,
            source = %original,
            class = ?self.profile.device_class,
            budget_ms = self.profile.overall_budget_ms,
            "starting extraction"
        );

        let quality = quality::assess(&source);
        debug!(
            extraction = %id,
            blur = quality.blur_score,
            contrast = quality.contrast_score,
            palette = ?quality.color_class,
            "source quality assessed"
        );

        let mut attempts: Vec<DecodeAttempt> = Vec::new();
        let mut termination = SearchTermination::MatrixExhausted;
        let mut matched: Option<MatchedSymbol> = None;

        'search: for (index, backend) in
            self.backends.iter().take(self.profile.max_backends).enumerate()
        {
            let plan = self.backend_plan(index, original);
            debug!(
                extraction = %id,
                backend = %backend.id(),
                combinations = plan.len(),
                "backend plan ready"
            );

            for spec in plan {
                if cancel.is_cancelled() {
                    termination = SearchTermination::Cancelled;
                    break 'search;
                }
                let elapsed = started.elapsed();
                if elapsed >= budget {
                    termination = SearchTermination::BudgetExpired;
                    break 'search;
                }
                let remaining = budget - elapsed;

                // The working buffer is moved into the decode thread and
                // dropped there; the loop never holds more than one.
                let working = match self.prepare(&source, &spec, original) {
                    Ok(buffer) => buffer,
                    Err(err) => {
                        debug!(extraction = %id, error = %err, "combination skipped");
                        continue;
                    }
                };

                let started_at = Utc::now();
                let attempt_clock = Instant::now();
                let (outcome, content) = run_decode(Arc::clone(backend), working, remaining);

                let attempt = DecodeAttempt {
                    backend: backend.id(),
                    strategy: spec.strategy,
                    region: spec.region,
                    scale: spec.scale,
                    started_at,
                    elapsed_ms: attempt_clock.elapsed().as_millis() as u64,
                    outcome,
                };
                debug!(
                    extraction = %id,
                    backend = %attempt.backend,
                    strategy = attempt.strategy.label,
                    scale = %attempt.scale,
                    outcome = ?attempt.outcome,
                    elapsed_ms = attempt.elapsed_ms,
                    "attempt finished"
                );
                attempts.push(attempt);

                match outcome {
                    AttemptOutcome::Decoded => {
                        matched = Some(MatchedSymbol {
                            backend: backend.id(),
                            content: content.unwrap_or_default(),
                        });
                        termination = SearchTermination::Matched;
                        break 'search;
                    }
                    AttemptOutcome::Abandoned => {
                        termination = SearchTermination::BudgetExpired;
                        break 'search;
                    }
                    AttemptOutcome::NoSymbol | AttemptOutcome::EngineFailure => {}
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = SearchOutcome {
            termination,
            matched,
            attempts,
        };
        let result = report::report(id, outcome, quality, elapsed_ms);
        diagnostic::dump_extraction(&id, &source, &result);
        Ok(result)
    }

    /// The deterministic attempt plan for one backend. Duplicates from the
    /// overlapping sweeps are collapsed, so for a fixed (source, profile)
    /// pair the sequence — and therefore the trace — is reproducible.
    fn backend_plan(&self, backend_index: usize, original: Size) -> Vec<AttemptSpec> {
        let strategies = filters::strategies_for(&self.profile);
        let sizes = resize::progressive_sizes(original.width, original.height, &self.profile);
        let full = Region::full(original.width, original.height);
        let scan_regions = if backend_index == 0 {
            regions::regions_for(original.width, original.height, &self.profile)
        } else {
            vec![full]
        };

        let mut plan: Vec<AttemptSpec> = Vec::new();

        // Priority prefix.
        push_unique(
            &mut plan,
            AttemptSpec {
                strategy: filters::RAW,
                scale: original,
                region: full,
            },
        );
        if strategies.contains(&filters::GRAY_CONTRAST) {
            push_unique(
                &mut plan,
                AttemptSpec {
                    strategy: filters::GRAY_CONTRAST,
                    scale: original,
                    region: full,
                },
            );
        }
        if let Some(smallest) = sizes.first().filter(|size| **size != original) {
            if strategies.contains(&filters::GRAY_SHARPEN) {
                push_unique(
                    &mut plan,
                    AttemptSpec {
                        strategy: filters::GRAY_SHARPEN,
                        scale: *smallest,
                        region: full,
                    },
                );
            }
        }

        // Full catalog against the native-size full frame.
        for strategy in &strategies {
            push_unique(
                &mut plan,
                AttemptSpec {
                    strategy: *strategy,
                    scale: original,
                    region: full,
                },
            );
        }

        // Progressive downscales, still full frame.
        for strategy in &strategies {
            for size in &sizes {
                if *size == original {
                    continue;
                }
                push_unique(
                    &mut plan,
                    AttemptSpec {
                        strategy: *strategy,
                        scale: *size,
                        region: full,
                    },
                );
            }
        }

        // Region crops, innermost escalation.
        for strategy in &strategies {
            for size in &sizes {
                for region in scan_regions.iter().skip(1) {
                    push_unique(
                        &mut plan,
                        AttemptSpec {
                            strategy: *strategy,
                            scale: *size,
                            region: *region,
                        },
                    );
                }
            }
        }

        plan
    }

    /// Materialize the working buffer for one attempt:
    /// crop → scale → preprocess, cheapest buffer last.
    fn prepare(
        &self,
        source: &PixelBuffer,
        spec: &AttemptSpec,
        original: Size,
    ) -> Result<PixelBuffer, ExtractionError> {
        let cropped = source.crop(&spec.region)?;
        let scaled =
            resize::scale_for_attempt(&cropped, spec.scale, original, self.profile.resize_filter)?;
        Ok(filters::apply(&scaled, &spec.strategy))
        // `cropped` and `scaled` drop here; only the processed buffer
        // travels on to the decode thread.
    }
}

fn push_unique(plan: &mut Vec<AttemptSpec>, spec: AttemptSpec) {
    if !plan.contains(&spec) {
        plan.push(spec);
    }
}

/// Race one decode against the remaining overall budget.
///
/// The attempt runs on a worker thread and the buffer moves with it. On
/// timeout the attempt is abandoned in place — the thread finishes on its
/// own and its late send lands nowhere. A thread that dies without sending
/// (an engine panic) reads as an engine failure.
fn run_decode(
    backend: Arc<dyn DecodeBackend>,
    buffer: PixelBuffer,
    remaining: Duration,
) -> (AttemptOutcome, Option<String>) {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(backend.try_decode(&buffer));
    });

    match rx.recv_timeout(remaining) {
        Ok(Some(content)) if !content.is_empty() => (AttemptOutcome::Decoded, Some(content)),
        Ok(_) => (AttemptOutcome::NoSymbol, None),
        Err(mpsc::RecvTimeoutError::Timeout) => (AttemptOutcome::Abandoned, None),
        Err(mpsc::RecvTimeoutError::Disconnected) => (AttemptOutcome::EngineFailure, None),
    }
}

fn validate_source_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::EmptySource);
    }
    if bytes.len() < MIN_SOURCE_BYTES {
        return Err(ExtractionError::ImageDecode(
            "container smaller than any supported image format".into(),
        ));
    }
    if bytes.len() > MAX_SOURCE_BYTES {
        return Err(ExtractionError::SourceTooLarge(bytes.len()));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::backends::{rasterize_qr, BackendId, StubBackend};
    use crate::extraction::types::DetectionStatus;

    const PAYLOAD: &str = "https://example.org/donate?inst=77";

    fn stub(backend: StubBackend) -> Arc<dyn DecodeBackend> {
        Arc::new(backend)
    }

    fn mobile_extractor(backends: Vec<Arc<dyn DecodeBackend>>) -> Extractor {
        Extractor::new(PlatformProfile::mobile(false)).with_backends(backends)
    }

    // ── Priority prefix (the fixed attempt order) ───────

    #[test]
    fn downscaled_sharpen_combination_is_third_in_line() {
        // Mobile source above the 960 trigger: the 640-normalized pass
        // exists, and the single backend only matches there.
        let source = PixelBuffer::filled(1200, 900, [200, 200, 200, 255]).unwrap();
        let backend = stub(StubBackend::new(BackendId::Zxing, |buffer| {
            (buffer.width() == 640 && buffer.height() == 480).then(|| PAYLOAD.to_string())
        }));

        let result = mobile_extractor(vec![backend])
            .extract_buffer(source)
            .unwrap();

        assert!(result.is_detected());
        assert_eq!(result.content.as_deref(), Some(PAYLOAD));
        assert_eq!(result.attempts.len(), 3);

        // two failures at native size full frame, in catalog order
        assert_eq!(result.attempts[0].strategy.label, "raw");
        assert_eq!(result.attempts[0].scale, Size { width: 1200, height: 900 });
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::NoSymbol);
        assert_eq!(result.attempts[1].strategy.label, "gray-contrast");
        assert_eq!(result.attempts[1].scale, Size { width: 1200, height: 900 });
        assert_eq!(result.attempts[1].outcome, AttemptOutcome::NoSymbol);

        // then the downscale-plus-sharpen pass hits
        let hit = &result.attempts[2];
        assert_eq!(hit.strategy.label, "gray-sharpen");
        assert_eq!(hit.scale, Size { width: 640, height: 480 });
        assert!(hit.region.is_full_frame(1200, 900));
        assert_eq!(hit.outcome, AttemptOutcome::Decoded);
    }

    // ── Strategy-pinned success ─────────────────────────

    #[test]
    fn succeeds_exactly_at_the_configured_strategy() {
        // Uniform (100, 150, 200) goes to gray 140; contrast 2.0 maps it to
        // 152; +10 brightness lands on 162 — unique to gray-contrast-bright.
        let source = PixelBuffer::filled(200, 200, [100, 150, 200, 255]).unwrap();
        let backend = stub(StubBackend::new(BackendId::Rqrr, |buffer| {
            (buffer.width() == 200 && buffer.pixels()[0] == 162).then(|| "match".to_string())
        }));

        let result = mobile_extractor(vec![backend])
            .extract_buffer(source)
            .unwrap();

        assert_eq!(result.status, DetectionStatus::Detected);
        assert_eq!(result.backend, Some(BackendId::Rqrr));
        assert_eq!(result.confidence, Some(BackendId::Rqrr.confidence_prior()));
        assert_eq!(result.attempts.len(), 3);
        let hit = result.attempts.last().unwrap();
        assert_eq!(hit.strategy.label, "gray-contrast-bright");
        assert!(hit.region.is_full_frame(200, 200));
        assert_eq!(hit.outcome, AttemptOutcome::Decoded);
    }

    // ── Exhaustion ──────────────────────────────────────

    #[test]
    fn all_backends_failing_exhausts_the_matrix() {
        // 200x200 mobile source: one size, five strategies, five regions.
        // First backend sweeps regions (25 combinations), second does not (5).
        let source = PixelBuffer::filled(200, 200, [128, 128, 128, 255]).unwrap();
        let backends = vec![
            stub(StubBackend::always_failing(BackendId::Zxing)),
            stub(StubBackend::always_failing(BackendId::Rqrr)),
        ];

        let result = mobile_extractor(backends).extract_buffer(source).unwrap();

        assert_eq!(result.status, DetectionStatus::Undetected);
        assert_eq!(result.content, None);
        assert_eq!(result.termination, SearchTermination::MatrixExhausted);
        assert_eq!(result.attempts.len(), 30);

        let first_backend_attempts = result
            .attempts
            .iter()
            .filter(|a| a.backend == BackendId::Zxing)
            .count();
        assert_eq!(first_backend_attempts, 25);
        assert!(result
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::NoSymbol));
    }

    #[test]
    fn backend_cap_truncates_the_registry() {
        let source = PixelBuffer::filled(64, 64, [128, 128, 128, 255]).unwrap();
        // three engines offered, mobile profile caps at two
        let backends = vec![
            stub(StubBackend::always_failing(BackendId::Zxing)),
            stub(StubBackend::always_failing(BackendId::Rqrr)),
            stub(StubBackend::always_failing(BackendId::Quirc)),
        ];

        let result = mobile_extractor(backends).extract_buffer(source).unwrap();

        assert!(result
            .attempts
            .iter()
            .all(|a| a.backend != BackendId::Quirc));
    }

    #[test]
    fn region_search_is_reserved_for_the_first_backend() {
        let source = PixelBuffer::filled(200, 200, [128, 128, 128, 255]).unwrap();
        let backends = vec![
            stub(StubBackend::always_failing(BackendId::Zxing)),
            stub(StubBackend::always_failing(BackendId::Rqrr)),
        ];

        let result = mobile_extractor(backends).extract_buffer(source).unwrap();

        let full = Region::full(200, 200);
        assert!(result
            .attempts
            .iter()
            .filter(|a| a.backend == BackendId::Rqrr)
            .all(|a| a.region == full));
        assert!(result
            .attempts
            .iter()
            .any(|a| a.backend == BackendId::Zxing && a.region != full));
    }

    // ── Budget ──────────────────────────────────────────

    #[test]
    fn zero_budget_exhausts_without_attempts() {
        let mut profile = PlatformProfile::mobile(false);
        profile.overall_budget_ms = 0;
        let extractor = Extractor::new(profile).with_backends(vec![stub(
            StubBackend::new(BackendId::Zxing, |_| Some("never".to_string())),
        )]);

        let source = PixelBuffer::filled(100, 100, [0, 0, 0, 255]).unwrap();
        let result = extractor.extract_buffer(source).unwrap();

        assert_eq!(result.status, DetectionStatus::Undetected);
        assert_eq!(result.termination, SearchTermination::BudgetExpired);
        assert!(result.attempts.is_empty());
    }

    #[test]
    fn slow_engine_is_abandoned_when_the_budget_expires() {
        let mut profile = PlatformProfile::mobile(false);
        profile.overall_budget_ms = 20;
        let extractor = Extractor::new(profile).with_backends(vec![stub(StubBackend::new(
            BackendId::Zxing,
            |_| {
                thread::sleep(Duration::from_millis(200));
                Some("late".to_string())
            },
        ))]);

        let source = PixelBuffer::filled(64, 64, [0, 0, 0, 255]).unwrap();
        let result = extractor.extract_buffer(source).unwrap();

        assert_eq!(result.status, DetectionStatus::Undetected);
        assert_eq!(result.termination, SearchTermination::BudgetExpired);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::Abandoned);
    }

    // ── Failure recovery and cancellation ───────────────

    #[test]
    fn engine_panic_reads_as_failure_and_search_continues() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let source = PixelBuffer::filled(64, 64, [128, 128, 128, 255]).unwrap();
        let blown = Arc::new(AtomicBool::new(false));
        let backends = vec![stub(StubBackend::new(BackendId::Zxing, move |_| {
            if !blown.swap(true, Ordering::SeqCst) {
                panic!("engine blew up");
            }
            None
        }))];

        let result = mobile_extractor(backends).extract_buffer(source).unwrap();

        assert_eq!(result.status, DetectionStatus::Undetected);
        assert_eq!(result.termination, SearchTermination::MatrixExhausted);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::EngineFailure);
        // raw fails by panic, but preprocessed combinations still ran
        assert!(result.attempts.len() > 1);
    }

    #[test]
    fn cancelled_token_stops_before_the_first_attempt() {
        let source = PixelBuffer::filled(100, 100, [0, 0, 0, 255]).unwrap();
        let extractor = mobile_extractor(vec![stub(StubBackend::new(
            BackendId::Zxing,
            |_| Some("never".to_string()),
        ))]);

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = extractor
            .extract_buffer_with_cancel(source, &cancel)
            .unwrap();

        assert_eq!(result.status, DetectionStatus::Undetected);
        assert_eq!(result.termination, SearchTermination::Cancelled);
        assert!(result.attempts.is_empty());
    }

    // ── Input validation ────────────────────────────────

    #[test]
    fn empty_input_is_rejected_before_searching() {
        let extractor = Extractor::new(PlatformProfile::desktop());
        assert!(matches!(
            extractor.extract(&[]),
            Err(ExtractionError::EmptySource)
        ));
    }

    #[test]
    fn undecodable_container_is_rejected_before_searching() {
        let extractor = Extractor::new(PlatformProfile::desktop());
        let garbage = vec![0xABu8; 512];
        assert!(matches!(
            extractor.extract(&garbage),
            Err(ExtractionError::ImageDecode(_))
        ));
    }

    #[test]
    fn oversized_container_is_rejected() {
        let extractor = Extractor::new(PlatformProfile::desktop());
        let huge = vec![0u8; MAX_SOURCE_BYTES + 1];
        assert!(matches!(
            extractor.extract(&huge),
            Err(ExtractionError::SourceTooLarge(_))
        ));
    }

    // ── End to end with the production engines ──────────

    #[test]
    fn clean_synthetic_symbol_is_detected_on_the_first_attempt() {
        let source = rasterize_qr(PAYLOAD, 8);
        let extractor = Extractor::new(PlatformProfile::desktop());

        let result = extractor.extract_buffer(source).unwrap();

        assert!(result.is_detected());
        assert_eq!(result.content.as_deref(), Some(PAYLOAD));
        assert_eq!(result.backend, Some(BackendId::Zxing));
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].strategy.label, "raw");
    }

    #[test]
    fn png_container_roundtrip_is_detected() {
        let source = rasterize_qr(PAYLOAD, 8);
        let png = source.to_png_bytes().unwrap();

        let extractor = Extractor::new(PlatformProfile::desktop());
        let result = extractor.extract(&png).unwrap();

        assert!(result.is_detected());
        assert_eq!(result.content.as_deref(), Some(PAYLOAD));
    }

    #[test]
    fn inverted_symbol_is_recovered_by_the_invert_strategy() {
        let mut source = rasterize_qr(PAYLOAD, 8);
        for px in source.pixels_mut().chunks_exact_mut(4) {
            px[0] = 255 - px[0];
            px[1] = 255 - px[1];
            px[2] = 255 - px[2];
        }

        let extractor = Extractor::new(PlatformProfile::desktop());
        let result = extractor.extract_buffer(source).unwrap();

        assert!(result.is_detected());
        assert_eq!(result.content.as_deref(), Some(PAYLOAD));
        let hit = result.attempts.last().unwrap();
        assert!(hit.strategy.invert, "expected an invert strategy, got {}", hit.strategy.label);
    }

    #[test]
    fn blank_frame_exhausts_with_a_full_trace() {
        let source = PixelBuffer::filled(96, 96, [255, 255, 255, 255]).unwrap();
        let extractor = Extractor::new(PlatformProfile::desktop());

        let result = extractor.extract_buffer(source).unwrap();

        assert_eq!(result.status, DetectionStatus::Undetected);
        assert_eq!(result.termination, SearchTermination::MatrixExhausted);
        assert!(!result.attempts.is_empty());
    }
}
