//! Failure classification
//!
//! Every job failure is reported under one of a small set of kinds so the
//! operator report can group them and so retry helpers can decide what is
//! worth another attempt.

use std::fmt;

/// Log level for failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected conditions, e.g. a camera that has not uploaded yet
    Warn,
    /// Unexpected failures
    Error,
}

/// Kind of a per-job failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Source file absent after the grace retry
    NotFound,
    /// Connection-level fault that outlived its retries
    TransportFault,
    /// The server understood the command and refused it
    Rejected,
    /// Downloaded bytes could not be decoded, even after whole-cycle restarts
    CorruptedImage,
    /// Overlay failed for a reason other than a bad source image
    Overlay,
    /// Upload or rename failed after retries
    PublishFault,
    /// Timelapse video processing failed
    Video,
}

impl FailureKind {
    /// Machine-readable code (e.g. "NOT_FOUND")
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "NOT_FOUND",
            FailureKind::TransportFault => "TRANSPORT_FAULT",
            FailureKind::Rejected => "REJECTED",
            FailureKind::CorruptedImage => "CORRUPTED_IMAGE",
            FailureKind::Overlay => "OVERLAY",
            FailureKind::PublishFault => "PUBLISH_FAULT",
            FailureKind::Video => "VIDEO",
        }
    }

    /// Log level the failure should be reported at
    pub fn log_level(&self) -> LogLevel {
        match self {
            FailureKind::NotFound => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors that can describe which [`FailureKind`] they belong to
pub trait Classify {
    fn kind(&self) -> FailureKind;

    /// Whether a fresh attempt at the same operation may succeed
    fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::TransportFault | FailureKind::CorruptedImage
        )
    }
}
