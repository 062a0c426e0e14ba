//! Error types for the demand protocol.

use std::sync::Arc;

/// The main error type carried by a failed completion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A buffered source was asked for items but was created empty
    #[error("input was empty")]
    EmptySource,

    /// A failure raised by a foreign publisher and passed through unchanged
    #[error("upstream error: {0}")]
    Upstream(Arc<dyn std::error::Error + Send + Sync>),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Wrap any error type as an upstream failure
    pub fn upstream<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Upstream(Arc::new(error))
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    pub fn is_empty_source(&self) -> bool {
        matches!(self, Error::EmptySource)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// How a session ended, delivered exactly once to its subscriber.
#[derive(Debug, Clone)]
pub enum Completion {
    /// Every item was delivered
    Finished,
    /// The session failed; buffered items were discarded
    Failed(Error),
}

impl Completion {
    pub fn is_finished(&self) -> bool {
        matches!(self, Completion::Finished)
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            Completion::Finished => None,
            Completion::Failed(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Completion::Finished => Ok(()),
            Completion::Failed(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_message() {
        assert_eq!(Error::EmptySource.to_string(), "input was empty");
        assert!(Error::EmptySource.is_empty_source());
        assert!(!Error::custom("boom").is_empty_source());
    }

    #[test]
    fn test_upstream_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::upstream(io);
        assert_eq!(err.to_string(), "upstream error: disk gone");
    }

    #[test]
    fn test_completion_into_result() {
        assert!(Completion::Finished.into_result().is_ok());
        let failed = Completion::Failed(Error::from("bad"));
        assert_eq!(failed.error().map(|e| e.to_string()), Some("bad".to_string()));
        assert!(failed.into_result().is_err());
    }
}
