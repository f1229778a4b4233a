//! Error types for the secmail client.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
/// Error type for all secmail client operations.
pub enum Error {
    /// Underlying HTTP client error (the request could not complete).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// IO error when reading or writing the session file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The server reported the address, or the message under it, as gone.
    #[error("{resource} has expired or no longer exists")]
    SessionExpired { resource: String },
    /// Payload did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// HTTP response returned a non-success status with body.
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// Address does not look like one handed out by the service.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Operation needs an active address.
    #[error("no active address")]
    NoSession,
    /// Operation needs a selected message.
    #[error("no message selected")]
    NoMessageSelected,
    /// Attachment id is not part of the selected message.
    #[error("unknown attachment: {0}")]
    UnknownAttachment(String),
    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the server reported the address as gone.
    pub fn is_gone(&self) -> bool {
        matches!(self, Error::SessionExpired { .. })
    }

    /// True when the request never produced an HTTP response.
    pub fn is_network(&self) -> bool {
        match self {
            Error::Http(e) => e.status().is_none(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedResponse(e.to_string())
    }
}

/// Result type for secmail client operations.
pub type Result<T> = std::result::Result<T, Error>;
