//! Error types for the pagination engine and the export pipeline around it.

use std::io;
use thiserror::Error;

/// Result type alias for chat-pager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised while planning pages.
///
/// A layout error aborts the whole export: callers discard any pages built so
/// far instead of delivering a truncated document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// The measurement oracle could not measure a unit.
    #[error("measurement failed: {0}")]
    Measurement(String),

    /// The oracle returned a height that is negative, NaN or infinite.
    #[error("oracle returned invalid height {height} for {unit}")]
    InvalidHeight { height: f32, unit: &'static str },

    /// Page capacity or content width is not a positive finite number.
    #[error("invalid page geometry: capacity {capacity}, width {width}")]
    InvalidGeometry { capacity: f32, width: f32 },
}

/// Error types for the export pipeline (planning, I/O, rendering).
#[derive(Error, Debug)]
pub enum Error {
    /// Page planning failed.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Content stream or page plan JSON could not be (de)serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error when reading input or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A font file could not be parsed.
    #[error("font error: {0}")]
    Font(String),

    /// PDF rendering failed.
    #[error("render error: {0}")]
    Render(String),
}
