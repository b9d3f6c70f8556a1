//! qrlift — QR payload extraction from arbitrarily-captured photographs.
//!
//! The input is typically a blurry, rotated, partially-cropped mobile photo
//! of a payment code; the output is the decoded payload or a graceful
//! `undetected`. Three independent decoding engines are driven over a
//! matrix of preprocessing strategies, progressive downscales, and region
//! crops, under a platform-aware wall-clock budget, stopping at the first
//! non-empty payload.
//!
//! ```no_run
//! use qrlift::Extractor;
//!
//! # fn main() -> Result<(), qrlift::ExtractionError> {
//! let photo = std::fs::read("donation-card.jpg").unwrap();
//! let result = Extractor::from_environment().extract(&photo)?;
//! match result.content {
//!     Some(payload) => println!("detected: {payload}"),
//!     None => println!("undetected — fall back to manual entry"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Symbol decoding itself is delegated to the engines; this crate owns the
//! orchestration: what to try, in what order, for how long, and how memory
//! is reclaimed between attempts.

pub mod config;
pub mod diagnostic;
pub mod extraction;
pub mod platform;

pub use extraction::{
    AttemptOutcome, BackendId, CancelToken, DecodeAttempt, DecodeBackend, DetectionResult,
    DetectionStatus, ExtractionError, Extractor, PixelBuffer, SearchTermination,
};
pub use platform::{resolve, DeviceClass, PlatformProfile};
