//! Result reporter — pure mapping from the terminal search state to the
//! caller-facing `DetectionResult`.

use tracing::info;
use uuid::Uuid;

use super::backends::BackendId;
use super::quality::SourceQuality;
use super::types::{
    DecodeAttempt, DetectionResult, DetectionStatus, SearchTermination,
};

/// The symbol that ended the search, when one did.
#[derive(Debug, Clone)]
pub(crate) struct MatchedSymbol {
    pub backend: BackendId,
    pub content: String,
}

/// Terminal state handed over by the orchestrator.
#[derive(Debug)]
pub(crate) struct SearchOutcome {
    pub termination: SearchTermination,
    pub matched: Option<MatchedSymbol>,
    pub attempts: Vec<DecodeAttempt>,
}

/// Map a terminal state to the caller-facing result.
///
/// On a match, the backend's static confidence prior is attached as-is; the
/// first successful attempt wins and is never compared against later
/// candidates. On exhaustion, `content` stays empty and `termination` tells
/// the caller whether the matrix ran dry, the budget expired, or the caller
/// itself cancelled.
pub(crate) fn report(
    id: Uuid,
    outcome: SearchOutcome,
    quality: SourceQuality,
    elapsed_ms: u64,
) -> DetectionResult {
    let result = match outcome.matched {
        Some(symbol) => DetectionResult {
            id,
            status: DetectionStatus::Detected,
            content: Some(symbol.content),
            backend: Some(symbol.backend),
            confidence: Some(symbol.backend.confidence_prior()),
            termination: SearchTermination::Matched,
            quality,
            attempts: outcome.attempts,
            elapsed_ms,
        },
        None => DetectionResult {
            id,
            status: DetectionStatus::Undetected,
            content: None,
            backend: None,
            confidence: None,
            termination: outcome.termination,
            quality,
            attempts: outcome.attempts,
            elapsed_ms,
        },
    };

    info!(
        extraction = %result.id,
        status = ?result.status,
        termination = ?result.termination,
        backend = result.backend.map(|b| b.as_str()).unwrap_or("-"),
        attempts = result.attempts.len(),
        elapsed_ms = result.elapsed_ms,
        "extraction finished"
    );
    result
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::quality;
    use crate::extraction::raster::PixelBuffer;

    fn sample_quality() -> SourceQuality {
        quality::assess(&PixelBuffer::filled(16, 16, [128, 128, 128, 255]).unwrap())
    }

    #[test]
    fn matched_outcome_maps_to_detected() {
        let outcome = SearchOutcome {
            termination: SearchTermination::Matched,
            matched: Some(MatchedSymbol {
                backend: BackendId::Rqrr,
                content: "pix:8831".into(),
            }),
            attempts: vec![],
        };
        let result = report(Uuid::new_v4(), outcome, sample_quality(), 12);

        assert!(result.is_detected());
        assert_eq!(result.content.as_deref(), Some("pix:8831"));
        assert_eq!(result.backend, Some(BackendId::Rqrr));
        assert_eq!(result.confidence, Some(BackendId::Rqrr.confidence_prior()));
        assert_eq!(result.termination, SearchTermination::Matched);
    }

    #[test]
    fn empty_outcome_maps_to_undetected() {
        let outcome = SearchOutcome {
            termination: SearchTermination::BudgetExpired,
            matched: None,
            attempts: vec![],
        };
        let result = report(Uuid::new_v4(), outcome, sample_quality(), 15_000);

        assert!(!result.is_detected());
        assert_eq!(result.content, None);
        assert_eq!(result.backend, None);
        assert_eq!(result.confidence, None);
        assert_eq!(result.termination, SearchTermination::BudgetExpired);
    }

    #[test]
    fn result_serializes_for_observability() {
        let outcome = SearchOutcome {
            termination: SearchTermination::MatrixExhausted,
            matched: None,
            attempts: vec![],
        };
        let result = report(Uuid::new_v4(), outcome, sample_quality(), 420);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"undetected\""));
        assert!(json.contains("\"termination\":\"matrix_exhausted\""));
    }
}
