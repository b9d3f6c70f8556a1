//! Extraction diagnostic dump — writes terminal artifacts to disk.
//!
//! Disabled unless `QRLIFT_DUMP_DIR` is set; a failed write logs a warning
//! and never blocks the pipeline.
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{extraction_id}/
//!   canonical.png
//!   result.json
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config;
use crate::extraction::{DetectionResult, PixelBuffer};

// ──────────────────────────────────────────────
// Dump directory resolution
// ──────────────────────────────────────────────

fn resolve_base_dir() -> Option<PathBuf> {
    std::env::var(config::ENV_DUMP_DIR).ok().map(PathBuf::from)
}

/// Returns the dump directory for an extraction, or `None` if diagnostics
/// are disabled. Creates the directory tree on first call; returns `None`
/// (with a warning) if creation fails — never panics, never blocks.
pub fn dump_dir_for(extraction_id: &Uuid) -> Option<PathBuf> {
    let base = resolve_base_dir()?;
    let dir = base.join(extraction_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

// ──────────────────────────────────────────────
// Dump writers
// ──────────────────────────────────────────────

/// Write the terminal artifacts for one extraction. No-op when disabled.
pub(crate) fn dump_extraction(id: &Uuid, canonical: &PixelBuffer, result: &DetectionResult) {
    let Some(dir) = dump_dir_for(id) else {
        return;
    };
    match canonical.to_png_bytes() {
        Ok(png) => dump_binary(&dir, "canonical.png", &png),
        Err(e) => tracing::warn!(error = %e, "diagnostic dump: PNG encode failed"),
    }
    dump_json(&dir, "result.json", result);
}

/// Write a binary artifact. Logs on success (debug) and failure (warn).
pub fn dump_binary(dir: &Path, filename: &str, data: &[u8]) {
    let path = dir.join(filename);
    match std::fs::write(&path, data) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "diagnostic dump: binary written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "diagnostic dump: failed to write binary"
        ),
    }
}

/// Write a JSON artifact (any serde-serializable value), pretty-printed for
/// human readability. Never panics.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => match std::fs::write(&path, json.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = json.len(),
                "diagnostic dump: JSON written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "diagnostic dump: failed to write JSON"
            ),
        },
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "diagnostic dump: failed to serialize JSON"
        ),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_dir_for_creates_directory_under_override() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var(config::ENV_DUMP_DIR, tmp.path());

        let id = Uuid::new_v4();
        let dir = dump_dir_for(&id).unwrap();

        assert!(dir.exists());
        assert!(dir.ends_with(id.to_string()));

        std::env::remove_var(config::ENV_DUMP_DIR);
    }

    #[test]
    fn dump_binary_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let data = b"PNG fake image data";

        dump_binary(tmp.path(), "canonical.png", data);

        let written = std::fs::read(tmp.path().join("canonical.png")).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn dump_json_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();

        #[derive(serde::Serialize)]
        struct Info {
            name: String,
            value: u32,
        }

        let info = Info {
            name: "test".to_string(),
            value: 42,
        };

        dump_json(tmp.path(), "info.json", &info);

        let content = std::fs::read_to_string(tmp.path().join("info.json")).unwrap();
        assert!(content.contains("\"name\": \"test\""));
        assert!(content.contains("\"value\": 42"));
        assert!(content.contains('\n'));
    }

    #[test]
    fn writers_handle_failure_gracefully() {
        let bad_dir = Path::new("/nonexistent/path/that/does/not/exist");
        dump_binary(bad_dir, "test.png", b"data");
        dump_json(bad_dir, "test.json", &"data");
        // no panic = success
    }
}
