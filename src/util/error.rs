//! Error types for cascadet.

use thiserror::Error;

/// Result alias for cascadet operations.
pub type DetectionResult<T> = std::result::Result<T, DetectionError>;

/// Errors that can occur when loading cascades, building the pyramid, or
/// running detection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    /// Image dimensions are zero or overflow when computing buffer sizes.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Stride is smaller than the image width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// Backing buffer cannot hold the requested view.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Reading a cascade or image from disk failed.
    #[error("i/o error: {reason}")]
    Io { reason: String },
    /// The cascade document could not be parsed.
    #[error("cascade parse error: {reason}")]
    Parse { reason: String },
    /// The cascade parsed but uses a layout this crate does not evaluate.
    #[error("unsupported cascade: {reason}")]
    UnsupportedCascade { reason: String },
    /// Image decoding failed (`image-io` feature).
    #[error("image i/o error: {reason}")]
    ImageIo { reason: String },
    /// `init` was called before any cascade was loaded.
    #[error("no cascade models are loaded")]
    NoModels,
    /// No pyramid level satisfies the size constraints.
    #[error("pyramid has no levels for the requested size range")]
    NoLevels,
    /// Binding a cascade to a pyramid level failed.
    #[error("cannot bind cascade to level {level}: {reason}")]
    Bind { level: usize, reason: &'static str },
    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {reason}")]
    Spawn { reason: String },
    /// A worker did not deliver every row strip of a level.
    #[error("level {level} returned {got} of {expected} row strips")]
    StripsMissing {
        level: usize,
        expected: usize,
        got: usize,
    },
    /// `detect` was called without a successful `init`.
    #[error("detector is not initialized")]
    NotInitialized,
    /// The image passed to `detect` differs from the size given to `init`.
    #[error("image size {got_width}x{got_height} does not match initialized size {expected_width}x{expected_height}")]
    SizeMismatch {
        expected_width: usize,
        expected_height: usize,
        got_width: usize,
        got_height: usize,
    },
}
