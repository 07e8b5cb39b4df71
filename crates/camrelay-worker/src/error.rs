use camrelay_core::{Classify, FailureKind};
use camrelay_overlay::OverlayError;
use camrelay_transport::TransportError;
use thiserror::Error;

/// Job errors
#[derive(Debug, Error)]
pub enum JobError {
    /// The source was still missing after the grace retry
    #[error("{camera}: {source_name} not found on the origin server")]
    NotFound { camera: String, source_name: String },

    #[error("Download of {name} failed: {source}")]
    Download {
        name: String,
        #[source]
        source: TransportError,
    },

    #[error("Overlay for {output} failed: {source}")]
    Overlay {
        output: String,
        #[source]
        source: OverlayError,
    },

    #[error("Publishing {name} failed: {source}")]
    Publish {
        name: String,
        #[source]
        source: TransportError,
    },

    #[error("Video processing failed: {0}")]
    Video(String),
}

impl JobError {
    /// Whether a whole-cycle restart (fresh download) may fix this error
    pub fn is_corrupted_image(&self) -> bool {
        matches!(self, JobError::Overlay { source, .. } if source.is_corrupted_image())
    }
}

impl Classify for JobError {
    fn kind(&self) -> FailureKind {
        match self {
            JobError::NotFound { .. } => FailureKind::NotFound,
            JobError::Download { source, .. } => source.kind(),
            JobError::Overlay { source, .. } => source.kind(),
            JobError::Publish { .. } => FailureKind::PublishFault,
            JobError::Video(_) => FailureKind::Video,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_kinds() {
        let not_found = JobError::NotFound {
            camera: "alpha".to_string(),
            source_name: "alpha.jpg".to_string(),
        };
        assert_eq!(not_found.kind(), FailureKind::NotFound);
        assert_eq!(not_found.to_string(), "alpha: alpha.jpg not found on the origin server");

        let download = JobError::Download {
            name: "alpha.jpg".to_string(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into(),
        };
        assert_eq!(download.kind(), FailureKind::TransportFault);

        let publish = JobError::Publish {
            name: "alpha.jpg".to_string(),
            source: TransportError::Rejected {
                code: 553,
                message: "no".to_string(),
            },
        };
        assert_eq!(publish.kind(), FailureKind::PublishFault);
        assert!(!publish.is_corrupted_image());
    }

    #[test]
    fn test_overlay_kind_follows_source() {
        let invalid = JobError::Overlay {
            output: "alpha.jpg".to_string(),
            source: OverlayError::InvalidConfig("bad".to_string()),
        };
        assert_eq!(invalid.kind(), FailureKind::Overlay);
        assert!(!invalid.is_corrupted_image());
    }
}
