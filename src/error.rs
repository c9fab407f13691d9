use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a reconstruction engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input folder {0} is not a directory")]
    InvalidInput(PathBuf),

    #[error("engine rejected the request: {0}")]
    Rejected(String),
}

/// Errors surfaced by the session lifecycle.
///
/// Everything except `AlreadyActive` and `InvalidPath` is treated as fatal at
/// the C boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a reconstruction session is already active")]
    AlreadyActive,

    #[error("reconstruction is not supported on this host")]
    Unsupported,

    #[error("invalid images path: {0}")]
    InvalidPath(String),

    #[error("error creating session: {0}")]
    Construction(#[source] EngineError),

    #[error("unhandled session output: {0}")]
    UnrecognizedEvent(String),
}

impl SessionError {
    /// Whether the caller must not continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Unsupported
                | SessionError::Construction(_)
                | SessionError::UnrecognizedEvent(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SessionError::Unsupported.is_fatal());
        assert!(SessionError::UnrecognizedEvent("x".into()).is_fatal());
        assert!(SessionError::Construction(EngineError::Rejected("bad".into())).is_fatal());
        assert!(!SessionError::AlreadyActive.is_fatal());
        assert!(!SessionError::InvalidPath("".into()).is_fatal());
    }
}
