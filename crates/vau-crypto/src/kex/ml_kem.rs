//! ML-KEM-768 key encapsulation mechanism (FIPS 203).
//!
//! The post-quantum half of the hybrid KEM. Combined with ECDH-P256 through the
//! key schedule so the tunnel stays confidential as long as either primitive holds.
//!
//! Key sizes:
//! - Public key: 1184 bytes
//! - Private key: 2400 bytes
//! - Ciphertext: 1088 bytes
//! - Shared secret: 32 bytes
//!
//! # Example
//!
//! ```
//! use vau_crypto::kex::MlKem768KeyPair;
//!
//! # fn example() -> Result<(), vau_crypto::Error> {
//! let recipient = MlKem768KeyPair::generate()?;
//! let (ciphertext, sender_shared) = MlKem768KeyPair::encapsulate(recipient.public_key())?;
//! let recipient_shared = recipient.decapsulate(&ciphertext)?;
//! assert_eq!(&*sender_shared, &*recipient_shared);
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use kem::{Decapsulate, Encapsulate};
use ml_kem::kem::{DecapsulationKey, EncapsulationKey};
use ml_kem::{EncodedSizeUser, KemCore, MlKem768};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

/// ML-KEM-768 public (encapsulation) key length.
pub const PUBLIC_KEY_LEN: usize = 1184;
/// ML-KEM-768 private (decapsulation) key length.
pub const PRIVATE_KEY_LEN: usize = 2400;
/// ML-KEM-768 ciphertext length.
pub const CIPHERTEXT_LEN: usize = 1088;

/// ML-KEM-768 key pair (NIST security level 3).
pub struct MlKem768KeyPair {
    /// Decapsulation key bytes (private key), zeroed on drop.
    decapsulation_key_bytes: Zeroizing<[u8; PRIVATE_KEY_LEN]>,
    /// Encapsulation key bytes (public key).
    encapsulation_key_bytes: [u8; PUBLIC_KEY_LEN],
}

impl MlKem768KeyPair {
    /// Generate a new random ML-KEM-768 keypair using the operating system RNG.
    ///
    /// ```
    /// use vau_crypto::kex::MlKem768KeyPair;
    ///
    /// let keypair = MlKem768KeyPair::generate().unwrap();
    /// assert_eq!(keypair.public_key().len(), 1184);
    /// ```
    pub fn generate() -> Result<Self> {
        Self::generate_with_rng(&mut rand::rngs::OsRng)
    }

    /// Generate a new ML-KEM-768 keypair from the supplied RNG.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let (decapsulation_key, encapsulation_key) = MlKem768::generate(rng);

        let mut dk_bytes = [0u8; PRIVATE_KEY_LEN];
        let mut ek_bytes = [0u8; PUBLIC_KEY_LEN];
        dk_bytes.copy_from_slice(&decapsulation_key.as_bytes()[..]);
        ek_bytes.copy_from_slice(&encapsulation_key.as_bytes()[..]);

        Ok(Self {
            decapsulation_key_bytes: Zeroizing::new(dk_bytes),
            encapsulation_key_bytes: ek_bytes,
        })
    }

    /// Restore a keypair from provisioned key bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLength` if either key has the wrong size.
    pub fn from_bytes(decapsulation_key: &[u8], encapsulation_key: &[u8]) -> Result<Self> {
        if decapsulation_key.len() != PRIVATE_KEY_LEN {
            return Err(Error::InvalidLength {
                expected: PRIVATE_KEY_LEN,
                actual: decapsulation_key.len(),
            });
        }
        if encapsulation_key.len() != PUBLIC_KEY_LEN {
            return Err(Error::InvalidLength {
                expected: PUBLIC_KEY_LEN,
                actual: encapsulation_key.len(),
            });
        }

        let mut dk_bytes = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        dk_bytes.copy_from_slice(decapsulation_key);
        let mut ek_bytes = [0u8; PUBLIC_KEY_LEN];
        ek_bytes.copy_from_slice(encapsulation_key);

        Ok(Self {
            decapsulation_key_bytes: dk_bytes,
            encapsulation_key_bytes: ek_bytes,
        })
    }

    /// Get the public key (encapsulation key) as bytes.
    pub fn public_key(&self) -> &[u8] {
        &self.encapsulation_key_bytes
    }

    /// Encapsulate a fresh shared secret to `recipient_public` using the OS RNG.
    pub fn encapsulate(recipient_public: &[u8]) -> Result<(Vec<u8>, Zeroizing<[u8; 32]>)> {
        Self::encapsulate_with_rng(recipient_public, &mut rand::rngs::OsRng)
    }

    /// Encapsulate a fresh shared secret to `recipient_public`.
    ///
    /// Returns `(ciphertext, shared_secret)`; the ciphertext is 1088 bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLength` if `recipient_public` is not exactly 1184 bytes.
    pub fn encapsulate_with_rng<R: RngCore + CryptoRng>(
        recipient_public: &[u8],
        rng: &mut R,
    ) -> Result<(Vec<u8>, Zeroizing<[u8; 32]>)> {
        let ek_bytes: &[u8; PUBLIC_KEY_LEN] =
            recipient_public
                .try_into()
                .map_err(|_| Error::InvalidLength {
                    expected: PUBLIC_KEY_LEN,
                    actual: recipient_public.len(),
                })?;

        let encapsulation_key =
            EncapsulationKey::<ml_kem::MlKem768Params>::from_bytes(&(*ek_bytes).into());

        let (ciphertext, shared_secret) = encapsulation_key
            .encapsulate(rng)
            .map_err(|e| Error::KeyExchange(format!("Encapsulation failed: {:?}", e)))?;

        let ct_vec = ciphertext[..].to_vec();
        let mut ss_array = [0u8; 32];
        ss_array.copy_from_slice(&shared_secret[..]);

        Ok((ct_vec, Zeroizing::new(ss_array)))
    }

    /// Recover the shared secret from a ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLength` if `ciphertext` is not exactly 1088 bytes.
    pub fn decapsulate(&self, ciphertext: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        let ct_bytes: &[u8; CIPHERTEXT_LEN] =
            ciphertext.try_into().map_err(|_| Error::InvalidLength {
                expected: CIPHERTEXT_LEN,
                actual: ciphertext.len(),
            })?;

        let decapsulation_key = DecapsulationKey::<ml_kem::MlKem768Params>::from_bytes(
            &(*self.decapsulation_key_bytes).into(),
        );

        let shared_secret = decapsulation_key
            .decapsulate(&(*ct_bytes).into())
            .map_err(|e| Error::KeyExchange(format!("Decapsulation failed: {:?}", e)))?;

        let mut ss_array = [0u8; 32];
        ss_array.copy_from_slice(&shared_secret[..]);
        Ok(Zeroizing::new(ss_array))
    }
}
