//! ECDH-P256 key exchange, the classical half of the hybrid KEM.
//!
//! Implements ECDH using the NIST P-256 (secp256r1) elliptic curve as specified
//! in NIST SP 800-56A. Used as a KEM: the sender generates an ephemeral key pair,
//! and its public key is the "ciphertext" delivered to the recipient.
//!
//! # Security
//!
//! - All private keys and shared secrets are wrapped in `Zeroizing<>` to ensure
//!   they are securely cleared from memory when dropped.
//! - Uses `p256` crate from RustCrypto which validates that peer points are on
//!   the curve before any scalar multiplication.
//! - Public keys are encoded in uncompressed form (0x04 || x || y) per SEC 1.
//!
//! # Example
//!
//! ```
//! use vau_crypto::kex::EcdhP256KeyPair;
//!
//! # fn example() -> Result<(), vau_crypto::Error> {
//! let alice = EcdhP256KeyPair::generate()?;
//! let bob = EcdhP256KeyPair::generate()?;
//!
//! let alice_shared = alice.exchange(bob.public_key())?;
//! let bob_shared = bob.exchange(alice.public_key())?;
//!
//! assert_eq!(*alice_shared, *bob_shared);
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{EncodedPoint, PublicKey, SecretKey};
use rand::CryptoRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Length of an uncompressed SEC1 P-256 public key (0x04 || x || y).
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of one affine coordinate.
pub const COORDINATE_LEN: usize = 32;

/// ECDH-P256 key pair for elliptic curve Diffie-Hellman key exchange.
///
/// The private key is automatically zeroed when dropped.
pub struct EcdhP256KeyPair {
    /// Secret key (32 bytes), zeroed on drop.
    secret_key: SecretKey,
    /// Public key in uncompressed form (65 bytes: 0x04 || x || y), cached.
    public_key_bytes: Vec<u8>,
}

impl EcdhP256KeyPair {
    /// Generate a new random P-256 keypair using the operating system RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use vau_crypto::kex::EcdhP256KeyPair;
    ///
    /// let keypair = EcdhP256KeyPair::generate().unwrap();
    /// assert_eq!(keypair.public_key().len(), 65);
    /// assert_eq!(keypair.public_key()[0], 0x04);
    /// ```
    pub fn generate() -> Result<Self> {
        Self::generate_with_rng(&mut rand::rngs::OsRng)
    }

    /// Generate a new P-256 keypair from the supplied RNG.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let secret_key = SecretKey::random(rng);
        Ok(Self::from_secret(secret_key))
    }

    /// Create a keypair from an existing 32-byte big-endian private scalar.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key is the wrong length or out of range.
    pub fn from_private(private_key: &[u8]) -> Result<Self> {
        if private_key.len() != 32 {
            return Err(Error::InvalidKeyLength(format!(
                "P-256 private key must be 32 bytes, got {}",
                private_key.len()
            )));
        }

        let secret_key = SecretKey::from_slice(private_key)
            .map_err(|_| Error::InvalidPrivateKey("Invalid P-256 private key".into()))?;

        Ok(Self::from_secret(secret_key))
    }

    fn from_secret(secret_key: SecretKey) -> Self {
        let public_key_bytes = secret_key
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Self {
            secret_key,
            public_key_bytes,
        }
    }

    /// Get the public key in uncompressed form (65 bytes: 0x04 || x || y).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key_bytes
    }

    /// Perform P-256 ECDH key exchange with a peer's public key.
    ///
    /// The shared secret is the 32-byte x-coordinate of the resulting point.
    /// The peer's public key must be in uncompressed form.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer's public key has invalid length, is not
    /// uncompressed, or is not a point on P-256.
    pub fn exchange(&self, peer_public: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        let peer_public_key = parse_public_key(peer_public)?;

        let shared_secret = diffie_hellman(
            self.secret_key.to_nonzero_scalar(),
            peer_public_key.as_affine(),
        );

        let mut result = [0u8; 32];
        result.copy_from_slice(shared_secret.raw_secret_bytes().as_slice());

        Ok(Zeroizing::new(result))
    }
}

/// Validate an uncompressed SEC1 public key and return the parsed point.
pub fn parse_public_key(public: &[u8]) -> Result<PublicKey> {
    if public.len() != PUBLIC_KEY_LEN {
        return Err(Error::InvalidKeyLength(format!(
            "P-256 public key must be 65 bytes (uncompressed), got {}",
            public.len()
        )));
    }

    if public[0] != 0x04 {
        return Err(Error::InvalidPublicKey(
            "P-256 public key must use uncompressed format (0x04 prefix)".into(),
        ));
    }

    let encoded_point = EncodedPoint::from_bytes(public)
        .map_err(|_| Error::InvalidPublicKey("Failed to parse P-256 public key".into()))?;

    PublicKey::from_encoded_point(&encoded_point)
        .into_option()
        .ok_or_else(|| Error::InvalidPublicKey("Invalid P-256 public key point".into()))
}

/// Assemble an uncompressed SEC1 public key from its affine coordinates.
pub fn public_key_from_coordinates(x: &[u8], y: &[u8]) -> Result<Vec<u8>> {
    for coordinate in [x, y] {
        if coordinate.len() != COORDINATE_LEN {
            return Err(Error::InvalidLength {
                expected: COORDINATE_LEN,
                actual: coordinate.len(),
            });
        }
    }

    let mut public = Vec::with_capacity(PUBLIC_KEY_LEN);
    public.push(0x04);
    public.extend_from_slice(x);
    public.extend_from_slice(y);
    Ok(public)
}

/// Split an uncompressed SEC1 public key into its `(x, y)` coordinates.
pub fn coordinates(public: &[u8]) -> Result<(&[u8], &[u8])> {
    if public.len() != PUBLIC_KEY_LEN || public[0] != 0x04 {
        return Err(Error::InvalidPublicKey(
            "expected an uncompressed 65-byte P-256 point".into(),
        ));
    }
    Ok((&public[1..33], &public[33..65]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_key_exchange_commutativity() {
        let alice = EcdhP256KeyPair::generate().unwrap();
        let bob = EcdhP256KeyPair::generate().unwrap();

        let alice_shared = alice.exchange(bob.public_key()).unwrap();
        let bob_shared = bob.exchange(alice.public_key()).unwrap();

        assert_eq!(&*alice_shared, &*bob_shared);
    }

    #[test]
    fn test_deterministic_from_seeded_rng() {
        let mut rng1 = rand::rngs::StdRng::seed_from_u64(7);
        let mut rng2 = rand::rngs::StdRng::seed_from_u64(7);

        let keypair1 = EcdhP256KeyPair::generate_with_rng(&mut rng1).unwrap();
        let keypair2 = EcdhP256KeyPair::generate_with_rng(&mut rng2).unwrap();

        assert_eq!(keypair1.public_key(), keypair2.public_key());
    }

    #[test]
    fn test_from_private_deterministic() {
        let private_key = [0x42u8; 32];

        let keypair1 = EcdhP256KeyPair::from_private(&private_key).unwrap();
        let keypair2 = EcdhP256KeyPair::from_private(&private_key).unwrap();

        assert_eq!(keypair1.public_key(), keypair2.public_key());
    }

    #[test]
    fn test_reject_invalid_public_key_length() {
        let keypair = EcdhP256KeyPair::generate().unwrap();
        assert!(keypair.exchange(&[0x04; 64]).is_err());
    }

    #[test]
    fn test_reject_compressed_format() {
        let keypair = EcdhP256KeyPair::generate().unwrap();
        let mut invalid_public = vec![0x02; 65];
        invalid_public[0] = 0x02;
        assert!(keypair.exchange(&invalid_public).is_err());
    }

    #[test]
    fn test_reject_point_off_curve() {
        let keypair = EcdhP256KeyPair::generate().unwrap();
        let mut off_curve = keypair.public_key().to_vec();
        off_curve[64] ^= 0x01;
        assert!(keypair.exchange(&off_curve).is_err());
    }

    #[test]
    fn test_coordinates_roundtrip() {
        let keypair = EcdhP256KeyPair::generate().unwrap();
        let (x, y) = coordinates(keypair.public_key()).unwrap();
        let rebuilt = public_key_from_coordinates(x, y).unwrap();
        assert_eq!(rebuilt, keypair.public_key());
    }

    #[test]
    fn test_coordinates_wrong_length() {
        assert!(public_key_from_coordinates(&[0u8; 31], &[0u8; 32]).is_err());
    }
}
