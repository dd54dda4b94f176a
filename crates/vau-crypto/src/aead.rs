//! AEAD (Authenticated Encryption with Associated Data) using AES-256-GCM.
//!
//! Two framings are used by the tunnel:
//! - Handshake payloads: `iv[12] || ciphertext || tag[16]` with a random IV
//!   ([`seal`] / [`open`]).
//! - Application frames: the IV is `random[4] || counter[8]` (big-endian) so
//!   nonces never repeat under one key ([`construct_nonce`]).

use crate::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::Zeroizing;

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Construct an application-frame nonce.
///
/// - `nonce[0:4] = prefix` (random per message)
/// - `nonce[4:12] = counter` (8 bytes, big-endian)
///
/// # Example
/// ```
/// use vau_crypto::aead::construct_nonce;
///
/// let nonce = construct_nonce([0xAA, 0xBB, 0xCC, 0xDD], 1);
/// assert_eq!(&nonce[0..4], &[0xAA, 0xBB, 0xCC, 0xDD]);
/// assert_eq!(&nonce[4..12], &[0, 0, 0, 0, 0, 0, 0, 1]);
/// ```
pub fn construct_nonce(prefix: [u8; 4], counter: u64) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[0..4].copy_from_slice(&prefix);
    nonce[4..12].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// Encrypt with AES-256-GCM per NIST SP 800-38D.
///
/// Returns ciphertext with the 16-byte authentication tag appended.
///
/// # Example
/// ```
/// use vau_crypto::aead::aes256gcm_encrypt;
///
/// let key = [0x42; 32];
/// let nonce = [0x01; 12];
/// let ciphertext_with_tag = aes256gcm_encrypt(&key, &nonce, b"Hello", b"aad").unwrap();
/// assert_eq!(ciphertext_with_tag.len(), 5 + 16);
/// ```
pub fn aes256gcm_encrypt(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| Error::Encryption("Invalid AES-256-GCM key length".into()))?;

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(Nonce::from_slice(nonce), payload)
        .map_err(|_| Error::Encryption("AES-256-GCM encryption failed".into()))
}

/// Decrypt with AES-256-GCM per NIST SP 800-38D.
///
/// # Errors
/// Returns `Error::Decryption` if tag verification fails.
pub fn aes256gcm_decrypt(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    ciphertext_and_tag: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| Error::Decryption("Invalid AES-256-GCM key length".into()))?;

    let payload = Payload {
        msg: ciphertext_and_tag,
        aad,
    };

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), payload)
        .map_err(|_| Error::Decryption("AES-256-GCM authentication failed".into()))?;

    Ok(Zeroizing::new(plaintext))
}

/// Seal `plaintext` under `key`, prefixing the output with `nonce`.
///
/// Output layout: `nonce[12] || ciphertext || tag[16]`.
pub fn seal(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let ciphertext = aes256gcm_encrypt(key, nonce, plaintext, aad)?;
    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open data produced by [`seal`].
///
/// # Errors
/// Returns `Error::InvalidLength` if the input cannot hold a nonce and tag, and
/// `Error::Decryption` if authentication fails.
pub fn open(key: &[u8; 32], sealed: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::InvalidLength {
            expected: NONCE_LEN + TAG_LEN,
            actual: sealed.len(),
        });
    }

    let (nonce, ciphertext_and_tag) = sealed.split_at(NONCE_LEN);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce);

    aes256gcm_decrypt(key, &nonce_bytes, ciphertext_and_tag, aad)
}
