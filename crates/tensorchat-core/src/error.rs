use thiserror::Error;

/// A convenience `Result` alias using [`TensorchatError`].
pub type TensorchatResult<T> = Result<T, TensorchatError>;

/// Which protocol-level terminal event produced a [`TensorchatError::Remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// An `error` event.
    Error,
    /// A `fatal_error` event.
    Fatal,
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteErrorKind::Error => f.write_str("error"),
            RemoteErrorKind::Fatal => f.write_str("fatal_error"),
        }
    }
}

/// Top-level error type for the Tensorchat client.
///
/// Each variant corresponds to one class of failure in the error taxonomy of
/// a streaming session.
#[derive(Debug, Error)]
pub enum TensorchatError {
    /// Missing or invalid client configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The request could not be issued (connect, DNS, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-2xx status. The body is never read.
    #[error("HTTP error! status: {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response carried no readable body.
    #[error("No response body")]
    MissingBody,

    /// Reading from the byte stream failed mid-session.
    #[error("Stream read error: {0}")]
    Stream(String),

    /// A data frame could not be decoded into an event.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The server reported a stream-level `error` or `fatal_error` event.
    #[error("{message}")]
    Remote {
        /// Which terminal event carried the failure.
        kind: RemoteErrorKind,
        /// Message taken from the event's `error` or `details` field.
        message: String,
    },

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TensorchatError {
    /// Creates a [`TensorchatError::Remote`] from a terminal event message.
    pub fn remote(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self::Remote {
            kind,
            message: message.into(),
        }
    }

    /// Whether the failure happened before any frame was consumed.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TensorchatError::Http(_) | TensorchatError::Status { .. } | TensorchatError::MissingBody
        )
    }

    /// HTTP status code, when the failure was a non-2xx response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TensorchatError::Status { status } => Some(*status),
            _ => None,
        }
    }
}
