//! Key derivation functions (HKDF-SHA256).
//!
//! The handshake derives keys in two stages:
//! - [`kdf1`] turns the first hybrid encapsulation (against the client's
//!   ephemeral keys) into handshake-only keys protecting M2 and M3.
//! - [`kdf2`] binds both encapsulations into the application and
//!   key-confirmation keys plus the session's `key_id`.
//!
//! Compromise of the stage-one keys alone therefore never yields application keys.

use crate::hybrid::EncapsulationResult;
use crate::{Error, Result};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of every derived symmetric key.
pub const KEY_LEN: usize = 32;

/// Generic HKDF-SHA256 key derivation per RFC 5869.
///
/// # Example
/// ```
/// use vau_crypto::kdf::hkdf_sha256;
///
/// let ikm = &[0x0b; 22];
/// let salt = &hex::decode("000102030405060708090a0b0c").unwrap();
/// let info = &hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();
///
/// let okm = hkdf_sha256(ikm, salt, info, 42).unwrap();
/// assert_eq!(okm.len(), 42);
/// ```
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);

    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    hk.expand(info, &mut okm)
        .map_err(|_| Error::KeyDerivation("HKDF expansion failed".into()))?;

    Ok(okm)
}

/// Handshake keys from the first encapsulation; protect M2 and M3 only.
pub struct HandshakeKeys1 {
    /// Client-to-server handshake key.
    pub client_to_server: Zeroizing<[u8; KEY_LEN]>,
    /// Server-to-client handshake key.
    pub server_to_client: Zeroizing<[u8; KEY_LEN]>,
}

/// Final key set binding both encapsulations.
pub struct HandshakeKeys2 {
    /// Client-to-server key confirmation key.
    pub client_to_server_confirm: Zeroizing<[u8; KEY_LEN]>,
    /// Client-to-server application data key.
    pub client_to_server_app: Zeroizing<[u8; KEY_LEN]>,
    /// Server-to-client key confirmation key.
    pub server_to_client_confirm: Zeroizing<[u8; KEY_LEN]>,
    /// Server-to-client application data key.
    pub server_to_client_app: Zeroizing<[u8; KEY_LEN]>,
    /// Identifier naming this key material; carried in every application frame.
    pub key_id: [u8; KEY_LEN],
}

/// Derive the stage-one handshake keys.
///
/// IKM: `ecdh_ss || mlkem_ss`, no salt, no info, 64 bytes of output.
pub fn kdf1(first: &EncapsulationResult) -> Result<HandshakeKeys1> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(2 * KEY_LEN));
    append_secrets(&mut ikm, first);

    let okm = hkdf_sha256(&ikm, &[], &[], 2 * KEY_LEN)?;

    Ok(HandshakeKeys1 {
        client_to_server: split_key(&okm, 0),
        server_to_client: split_key(&okm, 1),
    })
}

/// Derive the application and key-confirmation keys.
///
/// IKM: `ecdh_ss₁ || mlkem_ss₁ || ecdh_ss₂ || mlkem_ss₂`, 160 bytes of output.
pub fn kdf2(first: &EncapsulationResult, second: &EncapsulationResult) -> Result<HandshakeKeys2> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(4 * KEY_LEN));
    append_secrets(&mut ikm, first);
    append_secrets(&mut ikm, second);

    let okm = hkdf_sha256(&ikm, &[], &[], 5 * KEY_LEN)?;

    let mut key_id = [0u8; KEY_LEN];
    key_id.copy_from_slice(&okm[4 * KEY_LEN..5 * KEY_LEN]);

    Ok(HandshakeKeys2 {
        client_to_server_confirm: split_key(&okm, 0),
        client_to_server_app: split_key(&okm, 1),
        server_to_client_confirm: split_key(&okm, 2),
        server_to_client_app: split_key(&okm, 3),
        key_id,
    })
}

fn append_secrets(ikm: &mut Vec<u8>, result: &EncapsulationResult) {
    ikm.extend_from_slice(&*result.ecdh_shared_secret);
    ikm.extend_from_slice(&*result.mlkem_shared_secret);
}

fn split_key(okm: &[u8], index: usize) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&okm[index * KEY_LEN..(index + 1) * KEY_LEN]);
    key
}
