//! Handshake transcript used for key confirmation.
//!
//! Both sides log the encoded handshake messages in order and hash the log at
//! two checkpoints:
//! - M3 confirmation: `SHA-256(M1 || M2 || M3.AEAD_ct)`
//! - M4 confirmation: `SHA-256(M1 || M2 || M3)`

use subtle::ConstantTimeEq;
use vau_crypto::CryptoProvider;

/// Append-only log of encoded handshake messages.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    bytes: Vec<u8>,
}

impl Transcript {
    /// Start a transcript with the first message.
    pub fn new(first: &[u8]) -> Self {
        Self {
            bytes: first.to_vec(),
        }
    }

    /// Append an encoded message.
    pub fn append(&mut self, message: &[u8]) {
        self.bytes.extend_from_slice(message);
    }

    /// Hash of the log so far.
    pub fn hash(&self, provider: &dyn CryptoProvider) -> [u8; 32] {
        provider.sha256(&self.bytes)
    }

    /// Hash of the log followed by `extra`, without appending it.
    pub fn hash_with(&self, provider: &dyn CryptoProvider, extra: &[u8]) -> [u8; 32] {
        let mut data = Vec::with_capacity(self.bytes.len() + extra.len());
        data.extend_from_slice(&self.bytes);
        data.extend_from_slice(extra);
        provider.sha256(&data)
    }

    /// Total logged length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Constant-time comparison of a received confirmation hash with the local one.
pub(crate) fn hashes_match(received: &[u8], expected: &[u8; 32]) -> bool {
    received.ct_eq(&expected[..]).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vau_crypto::OsCryptoProvider;

    #[test]
    fn test_hash_with_equals_hash_after_append() {
        let provider = OsCryptoProvider;
        let mut transcript = Transcript::new(b"M1");
        transcript.append(b"M2");

        let peeked = transcript.hash_with(&provider, b"M3");
        assert_eq!(transcript.len(), 4);

        transcript.append(b"M3");
        assert_eq!(transcript.hash(&provider), peeked);
        assert_eq!(peeked, vau_crypto::hash::sha256(b"M1M2M3"));
    }

    #[test]
    fn test_hashes_match() {
        let digest = vau_crypto::hash::sha256(b"x");
        assert!(hashes_match(&digest, &digest));

        let mut other = digest;
        other[31] ^= 1;
        assert!(!hashes_match(&other, &digest));
        assert!(!hashes_match(&digest[..31], &digest));
    }
}
