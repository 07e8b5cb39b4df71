use camrelay_core::{Classify, FailureKind};
use thiserror::Error;

/// Remote session errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server reported the file as unavailable (`550`)
    #[error("File not found: {0}")]
    NotFound(String),

    /// Any other refusal from the server; the session itself is still usable
    #[error("Server rejected command ({code}): {message}")]
    Rejected { code: u32, message: String },

    /// Session could not be established or authenticated
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Reset, broken pipe, timeout or other socket failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The session is in an unknown state (malformed reply, lost worker)
    #[error("Session broken: {0}")]
    Broken(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// Whether this error means the connection itself can no longer be trusted.
    ///
    /// Logical refusals (`NotFound`, `Rejected`) leave the session usable.
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_) | TransportError::Io(_) | TransportError::Broken(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound(_))
    }
}

impl Classify for TransportError {
    fn kind(&self) -> FailureKind {
        match self {
            TransportError::NotFound(_) => FailureKind::NotFound,
            TransportError::Rejected { .. } => FailureKind::Rejected,
            _ => FailureKind::TransportFault,
        }
    }
}
