//! Error types for protocol operations.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Protocol operation errors.
///
/// Every variant is fatal for the session it occurred in.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed CBOR, missing field or wrong field type.
    #[error("Malformed message: {0}")]
    Decode(String),

    /// CBOR serialization failed.
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Message type tag did not match the expected message.
    #[error("Unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Expected `MessageType` tag.
        expected: &'static str,
        /// Tag found on the wire.
        actual: String,
    },

    /// Operation not valid in the current handshake state.
    #[error("Invalid state transition")]
    InvalidState,

    /// Key confirmation hash did not match the local transcript.
    #[error("Transcript hash mismatch")]
    TranscriptMismatch,

    /// Application frame is too short to hold a header.
    #[error("Insufficient data: need {0} bytes")]
    InsufficientData(usize),

    /// Application frame carried the wrong direction byte.
    #[error("Unexpected frame direction: expected {expected}, got {actual}")]
    UnexpectedDirection {
        /// Expected direction byte.
        expected: u8,
        /// Direction byte found on the wire.
        actual: u8,
    },

    /// Application frame counter was not strictly greater than the last accepted one.
    #[error("Replayed or out-of-order frame: counter {counter}, last accepted {last}")]
    Replay {
        /// Counter carried by the rejected frame.
        counter: u64,
        /// Last accepted counter.
        last: u64,
    },

    /// Application frame named different key material.
    #[error("Key id mismatch")]
    KeyIdMismatch,

    /// Send counter would overflow.
    #[error("Counter exhausted")]
    CounterExhausted,

    /// A previous failure poisoned the session.
    #[error("Session failed and cannot be reused")]
    SessionFailed,

    /// Server key bundle is past its expiry.
    #[error("Key bundle expired at {expires_at} (now {now})")]
    BundleExpired {
        /// Bundle `exp` (epoch seconds).
        expires_at: u64,
        /// Time of the check (epoch seconds).
        now: u64,
    },

    /// Server key bundle validity window exceeds the permitted maximum.
    #[error("Key bundle validity window too long: iat {issued_at}, exp {expires_at}")]
    ValidityWindow {
        /// Bundle `iat` (epoch seconds).
        issued_at: u64,
        /// Bundle `exp` (epoch seconds).
        expires_at: u64,
    },

    /// Trust validator rejected the certificate chain or the bundle signature.
    #[error("Untrusted key bundle: {0}")]
    Untrusted(String),

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    Crypto(#[from] vau_crypto::Error),
}

/// Coarse failure category, used by callers to decide how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unexpected message, transcript or frame violation.
    Protocol,
    /// KEM or AEAD failure.
    Crypto,
    /// Expired key bundle or validator rejection.
    Trust,
    /// Outer transport failure.
    Transport,
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::BundleExpired { .. } | Error::ValidityWindow { .. } | Error::Untrusted(_) => {
                ErrorKind::Trust
            }
            _ => ErrorKind::Protocol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::TranscriptMismatch.kind(), ErrorKind::Protocol);
        assert_eq!(Error::KeyIdMismatch.kind(), ErrorKind::Protocol);
        assert_eq!(
            Error::BundleExpired {
                expires_at: 1,
                now: 2
            }
            .kind(),
            ErrorKind::Trust
        );
        assert_eq!(
            Error::from(vau_crypto::Error::Decryption("tag".into())).kind(),
            ErrorKind::Crypto
        );
    }
}
