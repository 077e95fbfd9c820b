use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

/// Failure kinds surfaced by the capture pipeline and the gallery cache.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScanError {
    /// Local input could not be read or is not valid image data.
    #[error("Encoding error: {0}")]
    Encoding(String),
    /// The remote call did not complete within its bound.
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// Connectivity failure or a non-success HTTP status.
    #[error("Network error: {0}")]
    Transport(String),
    /// The service answered with data that does not fit the contract.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Camera, picker or device gallery failure.
    #[error("Acquisition error: {0}")]
    Acquisition(String),
    #[error("Cache storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    /// The owning session or synchronizer was torn down mid-operation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ScanError {
    /// Timeouts and transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::Timeout(_) | ScanError::Transport(_))
    }

    /// Short machine-readable tag, used in logs and notices.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Encoding(_) => "encoding",
            ScanError::Timeout(_) => "timeout",
            ScanError::Transport(_) => "transport",
            ScanError::MalformedResponse(_) => "malformed_response",
            ScanError::Acquisition(_) => "acquisition",
            ScanError::Storage(_) => "storage",
            ScanError::Config(_) => "config",
            ScanError::Cancelled => "cancelled",
        }
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(e: rusqlite::Error) -> Self {
        ScanError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_remote_connectivity_failures_are_retryable() {
        assert!(ScanError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(ScanError::Transport("refused".into()).is_retryable());
        assert!(!ScanError::MalformedResponse("no text".into()).is_retryable());
        assert!(!ScanError::Encoding("empty".into()).is_retryable());
        assert!(!ScanError::Acquisition("denied".into()).is_retryable());
    }

    #[test]
    fn timeout_message_reports_seconds() {
        let msg = ScanError::Timeout(Duration::from_secs(30)).to_string();
        assert_eq!(msg, "Request timed out after 30s");
    }
}
