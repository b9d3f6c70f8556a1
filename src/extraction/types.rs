//! Caller-facing result types and the per-attempt diagnostic trace.
//!
//! Everything here is created and dropped within one extraction call; the
//! crate persists nothing. `DetectionResult` is the whole caller contract:
//! `detected` with a payload, or `undetected` with the trace explaining
//! what was tried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::backends::BackendId;
use super::filters::PreprocessingStrategy;
use super::quality::SourceQuality;
use super::raster::{Region, Size};

// ═══════════════════════════════════════════════════════════
// Outcomes
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    Detected,
    Undetected,
}

/// Why the search loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTermination {
    /// An attempt yielded non-empty content.
    Matched,
    /// Every planned combination was tried without a match.
    MatrixExhausted,
    /// The overall wall-clock budget ran out first.
    BudgetExpired,
    /// The caller's cancel token fired.
    Cancelled,
}

/// Outcome of a single decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The engine returned non-empty content.
    Decoded,
    /// The engine ran to completion and found nothing.
    NoSymbol,
    /// The engine failed; recovered locally, never surfaced.
    EngineFailure,
    /// Still pending when the overall budget elapsed; the late result, if
    /// any, is ignored.
    Abandoned,
}

// ═══════════════════════════════════════════════════════════
// Trace records
// ═══════════════════════════════════════════════════════════

/// One (backend, strategy, size, region) combination, evaluated once.
/// Immutable log record for observability; not part of the success/failure
/// contract.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeAttempt {
    pub backend: BackendId,
    pub strategy: PreprocessingStrategy,
    pub region: Region,
    pub scale: Size,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcome: AttemptOutcome,
}

/// The result of one extraction call.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub id: Uuid,
    pub status: DetectionStatus,
    /// Decoded payload; `None` on `undetected` — callers route that to a
    /// manual-entry fallback.
    pub content: Option<String>,
    pub backend: Option<BackendId>,
    /// Static per-backend prior; the engines expose no true confidence.
    pub confidence: Option<f32>,
    pub termination: SearchTermination,
    pub quality: SourceQuality,
    pub attempts: Vec<DecodeAttempt>,
    pub elapsed_ms: u64,
}

impl DetectionResult {
    pub fn is_detected(&self) -> bool {
        self.status == DetectionStatus::Detected
    }
}

// ═══════════════════════════════════════════════════════════
// Cancellation
// ═══════════════════════════════════════════════════════════

/// Caller-supplied cooperative cancellation flag, honored at every attempt
/// boundary. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
