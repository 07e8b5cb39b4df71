use std::path::PathBuf;

use camrelay_core::{Classify, FailureKind};
use thiserror::Error;

/// Overlay errors
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The source frame could not be decoded, usually a partial download
    #[error("Corrupted or truncated image: {0}")]
    CorruptedImage(#[source] image::ImageError),

    /// A logo or other asset could not be loaded
    #[error("Failed to load overlay asset {path}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A font needed to draw a label could not be loaded
    #[error("Failed to load font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Invalid overlay configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for overlay operations
pub type OverlayResult<T> = Result<T, OverlayError>;

impl OverlayError {
    /// Whether re-fetching the source could fix this error
    pub fn is_corrupted_image(&self) -> bool {
        matches!(self, OverlayError::CorruptedImage(_))
    }
}

impl Classify for OverlayError {
    fn kind(&self) -> FailureKind {
        match self {
            OverlayError::CorruptedImage(_) => FailureKind::CorruptedImage,
            _ => FailureKind::Overlay,
        }
    }
}
