//! Transport layer errors.

use thiserror::Error;
pub use vau_core::ErrorKind;

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Outer HTTP exchange returned a non-200 status.
    #[error("{method} {uri} failed with status {status}")]
    BadStatus {
        /// Request method.
        method: String,
        /// Request URI.
        uri: String,
        /// Response status code.
        status: u16,
    },

    /// Outer transport I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Protocol error from core.
    #[error("Protocol error: {0}")]
    Protocol(#[from] vau_core::Error),

    /// Missing or malformed connection identifier.
    #[error("Invalid connection id: {0}")]
    InvalidConnectionId(String),

    /// Inner HTTP message could not be encoded or decoded.
    #[error("HTTP codec error: {0}")]
    Codec(String),

    /// Request URI cannot be handled.
    #[error("Unsupported URI: {0}")]
    UnsupportedUri(String),

    /// Incomplete client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Protocol(e) => e.kind(),
            Error::InvalidConnectionId(_) | Error::Codec(_) => ErrorKind::Protocol,
            Error::BadStatus { .. } | Error::Io(_) | Error::UnsupportedUri(_) | Error::Config(_) => {
                ErrorKind::Transport
            }
        }
    }
}

impl From<vau_crypto::Error> for Error {
    fn from(e: vau_crypto::Error) -> Self {
        Error::Protocol(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let status = Error::BadStatus {
            method: "POST".into(),
            uri: "https://vau.example/VAU".into(),
            status: 503,
        };
        assert_eq!(status.kind(), ErrorKind::Transport);
        assert_eq!(
            status.to_string(),
            "POST https://vau.example/VAU failed with status 503"
        );

        assert_eq!(
            Error::InvalidConnectionId("missing".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            Error::from(vau_core::Error::Untrusted("revoked".into())).kind(),
            ErrorKind::Trust
        );
    }
}
