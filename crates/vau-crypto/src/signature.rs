//! ES256 (ECDSA P-256 with SHA-256) signatures over server key bundles.
//!
//! Signatures use the raw `r || s` encoding (64 bytes), matching JOSE/COSE
//! ES256 rather than ASN.1 DER.

use crate::{Error, Result};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{CryptoRng, RngCore};

/// Length of a raw `r || s` ES256 signature.
pub const SIGNATURE_LEN: usize = 64;

/// ES256 signing key with its cached verifying key.
pub struct Es256KeyPair {
    signing_key: SigningKey,
    public_key_bytes: Vec<u8>,
}

impl Es256KeyPair {
    /// Generate a fresh signing key from `rng`.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_signing_key(SigningKey::random(rng))
    }

    /// Restore a signing key from its 32-byte big-endian scalar.
    pub fn from_private(private_key: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|_| Error::InvalidPrivateKey("Invalid ES256 signing key".into()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key_bytes = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Self {
            signing_key,
            public_key_bytes,
        }
    }

    /// Verifying key, uncompressed SEC1 (65 bytes).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key_bytes
    }

    /// Sign `message`, returning the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

/// Verify a raw ES256 signature with a SEC1-encoded public key.
///
/// # Errors
///
/// Returns `Error::InvalidPublicKey` for an unparsable key and
/// `Error::InvalidSignature` if the signature is malformed or does not verify.
pub fn verify_es256(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|_| Error::InvalidPublicKey("Invalid ES256 verifying key".into()))?;

    if signature.len() != SIGNATURE_LEN {
        return Err(Error::InvalidSignature(format!(
            "ES256 signature must be {} bytes, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }

    let signature = Signature::from_slice(signature)
        .map_err(|_| Error::InvalidSignature("Malformed ES256 signature".into()))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|_| Error::InvalidSignature("ES256 verification failed".into()))
}
