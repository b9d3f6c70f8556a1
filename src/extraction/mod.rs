pub mod raster;
pub mod types;
pub mod filters;
pub mod regions;
pub mod resize;
pub mod orient;
pub mod quality;
pub mod backends;
pub mod report;
pub mod orchestrator;

pub use backends::{BackendId, DecodeBackend, StubBackend};
pub use filters::PreprocessingStrategy;
pub use orchestrator::Extractor;
pub use quality::{ColorClass, SourceQuality};
pub use raster::{PixelBuffer, Region, Size};
pub use types::*;

use thiserror::Error;

/// Input and processing errors. All of these mean "cannot process, retry
/// with a different file" — an exhausted search is *not* an error but a
/// defined `undetected` outcome (see `DetectionResult`).
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("source image is empty")]
    EmptySource,

    #[error("source image is {0} bytes, above the supported maximum")]
    SourceTooLarge(usize),

    #[error("failed to decode source image: {0}")]
    ImageDecode(String),

    #[error("source image has zero dimensions")]
    ZeroDimensions,

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferGeometry { expected: usize, actual: usize },

    #[error("region out of source bounds: {0}")]
    RegionBounds(String),

    #[error("image processing error: {0}")]
    ImageProcessing(String),
}
