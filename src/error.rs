//! Error types for the insights pipeline
//!
//! Every failure that leaves the pipeline is one of four kinds:
//! registration, query, not-found or ambiguous. Remote store failures are
//! reported as [`StoreError`] by the store implementations and mapped into the
//! pipeline kind of the stage that issued the call.

use thiserror::Error;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Series registration or datapoint write failed
    ///
    /// Fatal to the enclosing request.
    #[error("Registration error: {0}")]
    Registration(String),

    /// A batch query chunk or descriptor lookup failed
    ///
    /// No partial data is ever returned alongside this error.
    #[error("Query error: {0}")]
    Query(String),

    /// No matching series, or no datapoints in range, for a scoped reading
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one datapoint exists for what must be a single reading
    #[error("Ambiguous reading: {count} datapoints found where exactly one was expected")]
    Ambiguous {
        /// Number of datapoints that matched
        count: usize,
    },

    /// Configuration error (startup only)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Stable label for logging and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Registration(_) => "registration",
            Error::Query(_) => "query",
            Error::NotFound(_) => "not_found",
            Error::Ambiguous { .. } => "ambiguous",
            Error::Configuration(_) => "configuration",
        }
    }

    /// Wrap a store failure raised while registering or writing
    pub fn registration(context: &str, source: StoreError) -> Self {
        Error::Registration(format!("{context}: {source}"))
    }

    /// Wrap a store failure raised while reading
    pub fn query(context: &str, source: StoreError) -> Self {
        Error::Query(format!("{context}: {source}"))
    }
}

/// Remote store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The request never produced a response (connect, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status
    #[error("Remote returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The requested series does not exist
    #[error("Series not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(Error::Registration("x".into()).kind(), "registration");
        assert_eq!(Error::Query("x".into()).kind(), "query");
        assert_eq!(Error::NotFound("x".into()).kind(), "not_found");
        assert_eq!(Error::Ambiguous { count: 2 }.kind(), "ambiguous");
    }

    #[test]
    fn test_store_error_is_wrapped_with_context() {
        let err = Error::query(
            "batch 2 of 3",
            StoreError::Status {
                status: 503,
                body: "unavailable".to_string(),
            },
        );
        let display = err.to_string();
        assert!(display.contains("batch 2 of 3"));
        assert!(display.contains("503"));
        assert_eq!(err.kind(), "query");
    }

    #[test]
    fn test_ambiguous_display() {
        let err = Error::Ambiguous { count: 4 };
        assert!(err.to_string().contains("4 datapoints"));
    }
}
