//! Error types for the paged retrieval subsystem.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Error variants for retrieval operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transient upstream failure; retried within the window budget.
    #[error("Upstream call failed: {0}")]
    Upstream(String),

    /// The upstream rejected the supplied credentials; fatal to the run.
    #[error("Upstream rejected credentials: {0}")]
    Unauthorized(String),

    /// The upstream response could not be interpreted.
    #[error("Upstream response not understood: {0}")]
    BadResponse(String),
}

impl FetchError {
    /// True for failures that abort the whole run instead of one window.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unauthorized_is_fatal() {
        assert!(FetchError::Unauthorized("bad token".into()).is_fatal());
        assert!(!FetchError::Upstream("502".into()).is_fatal());
        assert!(!FetchError::BadResponse("truncated".into()).is_fatal());
    }
}
