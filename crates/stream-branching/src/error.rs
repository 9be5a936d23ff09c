//! Unified crate-level error types.
//!
//! This module provides a single [`PlayerError`] type used across the crate and a
//! convenient [`PlayerResult`] alias.
//!
//! Classification
//! --------------
//! - `CodecUnsupported`: fatal, playback never starts.
//! - `UnknownChapterKey` / `NoPendingDecision`: caller errors, returned to whoever
//!   submitted the choice.
//! - `Network` / `HttpStatus` / `Timeout` / `InvalidUrl`: transport failures. A failed
//!   bandwidth probe may be mapped to the floor tier instead (see
//!   [`crate::ProbeFailurePolicy`]).
//! - `Ingestion`: raised by the playback buffer, fatal to the segment being appended.
//!
//! Note: transport variants stay string-based to avoid pulling concrete HTTP client
//! error types into the public API.

/// Result type used by this crate.
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Unified error type for the `stream-branching` crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    /// A generic error with a message.
    #[error("{0}")]
    Message(String),

    /// The playback surface cannot decode the manifest codec.
    #[error("codec not supported by playback surface: {0}")]
    CodecUnsupported(String),

    /// A chapter key that does not exist in the manifest.
    #[error("unknown chapter key: {0}")]
    UnknownChapterKey(String),

    /// A choice was submitted while no decision point was open.
    #[error("no decision point is awaiting a choice")]
    NoPendingDecision,

    /// Transport-level failure while fetching a resource.
    #[error("network error for {url}: {message}")]
    Network {
        /// URL that failed.
        url: String,
        /// Underlying failure description.
        message: String,
    },

    /// HTTP request completed with a non-success status.
    #[error("HTTP error: {status} for {url}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// URL that failed.
        url: String,
    },

    /// Request timed out.
    #[error("request timeout for {0}")]
    Timeout(String),

    /// A URL that could not be parsed after templating.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The playback buffer rejected appended bytes.
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    /// Manifest document could not be loaded.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Segment URL does not carry a parseable duration.
    #[error("segment URL carries no duration: {0}")]
    InvalidSegmentUrl(String),

    /// Operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Extra context around a lower-level error.
    #[error("{context}: {source}")]
    Context {
        /// What we were doing when the error occurred.
        context: &'static str,
        /// The underlying error.
        #[source]
        source: Box<PlayerError>,
    },
}

impl PlayerError {
    /// Convenience helper to construct a simple message error.
    pub fn msg(msg: impl Into<String>) -> Self {
        PlayerError::Message(msg.into())
    }

    /// Convenience helper for transport failures.
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        PlayerError::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Attach static context to an existing error.
    pub fn with_context(self, context: &'static str) -> Self {
        PlayerError::Context {
            context,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any `Context` wrappers.
    pub fn root(&self) -> &PlayerError {
        match self {
            PlayerError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error came from the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.root(),
            PlayerError::Network { .. }
                | PlayerError::HttpStatus { .. }
                | PlayerError::Timeout(_)
                | PlayerError::InvalidUrl(_)
        )
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::InvalidManifest(err.to_string())
    }
}
