//! Error taxonomy for the bot API client.
//!
//! Every failure a query can produce is classified into one of five kinds:
//! - [`ErrorKind::Validation`]: a required parameter is missing or invalid,
//!   detected locally before any network activity
//! - [`ErrorKind::Transport`]: connection, timeout or stream I/O failure
//! - [`ErrorKind::Api`]: the server answered with an error payload
//! - [`ErrorKind::Decode`]: the response body did not match the expected shape
//! - [`ErrorKind::Cancelled`]: the query was cancelled while in flight

use std::fmt;

/// Maximum number of payload bytes kept in a [`ClientError::Decode`].
pub const PAYLOAD_SNIPPET_LIMIT: usize = 512;

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid parameter, detected before any call.
    Validation,
    /// Connection, timeout or I/O failure.
    Transport,
    /// Structured error returned by the server.
    Api,
    /// Response body did not match the expected shape.
    Decode,
    /// The query was cancelled before it completed.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Api => "api",
            ErrorKind::Decode => "decode",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Failure category reported by a [`crate::client::Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection could not be established.
    Connect,
    /// The request or response exceeded its deadline.
    Timeout,
    /// Reading the request body or the response stream failed.
    Io,
    /// Anything else reported by the HTTP stack.
    Other,
}

/// Connection-level failure reported by a transport.
///
/// HTTP error statuses are not transport errors: they come back as a
/// [`crate::client::ClientResponse`] and are classified by the query.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    /// What went wrong.
    pub kind: TransportErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl TransportError {
    /// Create a transport error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`TransportErrorKind::Connect`] error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Shorthand for a [`TransportErrorKind::Timeout`] error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Shorthand for a [`TransportErrorKind::Io`] error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Io, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::timeout(format!("request timed out: {err}"))
        } else if err.is_connect() {
            TransportError::connect(format!("connection failed: {err}"))
        } else if err.is_body() || err.is_decode() {
            TransportError::io(format!("failed to stream body: {err}"))
        } else {
            TransportError::new(
                TransportErrorKind::Other,
                format!("HTTP request failed: {err}"),
            )
        }
    }
}

/// Unified error type returned by every query.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// A required parameter is unset or a local pre-flight check failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
    },

    /// Connection, timeout or I/O failure.
    #[error("Transport error: {source}")]
    Transport {
        /// Underlying transport failure.
        #[from]
        source: TransportError,
    },

    /// The server returned an error payload.
    #[error("API error {status} ({}): {message}", .code.as_deref().unwrap_or("no code"))]
    Api {
        /// HTTP status code.
        status: u16,
        /// Server error code, e.g. `attachment.not.ready`.
        code: Option<String>,
        /// Server error description.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("Decode error: {message}")]
    Decode {
        /// What failed to decode.
        message: String,
        /// Truncated raw payload, enough to diagnose without re-requesting.
        payload: Option<String>,
    },

    /// The query was cancelled before completing.
    #[error("Query cancelled")]
    Cancelled,
}

/// Convenience result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Create a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a `Validation` error for an unset required parameter.
    pub fn missing_param(name: &str) -> Self {
        Self::validation(format!("required parameter '{name}' is missing"))
    }

    /// Create a `Decode` error, keeping a snippet of the offending payload.
    pub fn decode(message: impl Into<String>, payload: &[u8]) -> Self {
        Self::Decode {
            message: message.into(),
            payload: Some(payload_snippet(payload)),
        }
    }

    /// Create an `Api` error.
    pub fn api(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation { .. } => ErrorKind::Validation,
            ClientError::Transport { .. } => ErrorKind::Transport,
            ClientError::Api { .. } => ErrorKind::Api,
            ClientError::Decode { .. } => ErrorKind::Decode,
            ClientError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The server-provided error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The raw payload snippet attached to a decode error, if any.
    pub fn payload(&self) -> Option<&str> {
        match self {
            ClientError::Decode { payload, .. } => payload.as_deref(),
            _ => None,
        }
    }

    /// The query was rejected before any I/O.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// The request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// The server answered with a non-2xx status.
    pub fn is_api(&self) -> bool {
        self.kind() == ErrorKind::Api
    }

    /// A response body did not have the expected shape.
    pub fn is_decode(&self) -> bool {
        self.kind() == ErrorKind::Decode
    }

    /// The query was cancelled before it completed.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode {
            message: err.to_string(),
            payload: None,
        }
    }
}

/// Lossy UTF-8 rendering of at most [`PAYLOAD_SNIPPET_LIMIT`] bytes.
pub(crate) fn payload_snippet(payload: &[u8]) -> String {
    if payload.len() <= PAYLOAD_SNIPPET_LIMIT {
        return String::from_utf8_lossy(payload).into_owned();
    }
    let mut snippet = String::from_utf8_lossy(&payload[..PAYLOAD_SNIPPET_LIMIT]).into_owned();
    snippet.push_str("...");
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_classified() {
        assert_eq!(ClientError::missing_param("x").kind(), ErrorKind::Validation);
        assert_eq!(
            ClientError::from(TransportError::connect("refused")).kind(),
            ErrorKind::Transport
        );
        assert_eq!(ClientError::api(400, None, "bad").kind(), ErrorKind::Api);
        assert_eq!(ClientError::decode("bad", b"{}").kind(), ErrorKind::Decode);
        assert_eq!(ClientError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn missing_param_names_parameter() {
        let err = ClientError::missing_param("message_id");
        assert!(err.is_validation());
        assert!(err.to_string().contains("message_id"));
    }

    #[test]
    fn api_error_exposes_code() {
        let err = ClientError::api(
            400,
            Some("attachment.not.ready".to_string()),
            "Key: errors.process.attachment.file.not.processed",
        );
        assert_eq!(err.code(), Some("attachment.not.ready"));
        let display = err.to_string();
        assert!(display.contains("400"));
        assert!(display.contains("attachment.not.ready"));
    }

    #[test]
    fn api_error_without_code_displays_placeholder() {
        let err = ClientError::api(502, None, "Bad Gateway");
        assert!(err.code().is_none());
        assert!(err.to_string().contains("no code"));
    }

    #[test]
    fn decode_error_truncates_payload() {
        let payload = vec![b'a'; PAYLOAD_SNIPPET_LIMIT * 2];
        let err = ClientError::decode("shape mismatch", &payload);
        let snippet = err.payload().unwrap();
        assert_eq!(snippet.len(), PAYLOAD_SNIPPET_LIMIT + 3);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn short_payload_is_kept_verbatim() {
        let err = ClientError::decode("shape mismatch", br#"{"foo":1}"#);
        assert_eq!(err.payload(), Some(r#"{"foo":1}"#));
    }

    #[test]
    fn serde_error_maps_to_decode() {
        let err: ClientError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.is_decode());
        assert!(err.payload().is_none());
    }

    #[test]
    fn transport_error_display_includes_kind() {
        let err = TransportError::timeout("deadline exceeded");
        let display = ClientError::from(err).to_string();
        assert!(display.contains("Timeout"));
        assert!(display.contains("deadline exceeded"));
    }
}
