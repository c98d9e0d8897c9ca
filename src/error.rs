// ============================================================================
// EDITOR ERRORS
// ============================================================================

use thiserror::Error;

use crate::components::crop::CropRect;

/// Every reason an editor command can be refused.
///
/// A returned error never leaves the session half-modified: the committed
/// image, filter state and history stay exactly as they were.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no image loaded")]
    NoImageLoaded,

    #[error("invalid dimensions {width}x{height}: width and height must be positive")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("invalid crop rectangle {rect} for a {canvas_width}x{canvas_height} canvas")]
    InvalidRect {
        rect: CropRect,
        canvas_width: u32,
        canvas_height: u32,
    },

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("crop mode is not active")]
    CropNotActive,

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("pixel data is {actual} bytes, expected {width}x{height}x4")]
    BufferSize { width: u32, height: u32, actual: usize },

    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("history snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid recipe: {0}")]
    Recipe(#[from] serde_json::Error),
}

impl From<png::EncodingError> for EditorError {
    fn from(e: png::EncodingError) -> Self {
        EditorError::Snapshot(e.to_string())
    }
}

impl From<png::DecodingError> for EditorError {
    fn from(e: png::DecodingError) -> Self {
        EditorError::Snapshot(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
