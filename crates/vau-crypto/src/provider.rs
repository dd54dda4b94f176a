//! Injectable crypto backend.
//!
//! Handshake state machines receive a [`CryptoProvider`] at construction time
//! instead of reaching for a process-wide backend. The default methods route
//! through the stateless functions of this crate; implementors only decide
//! where randomness comes from.
//!
//! - [`OsCryptoProvider`]: operating system RNG, for production.
//! - [`SeededCryptoProvider`]: seeded `StdRng`, for reproducible tests.

use crate::hybrid::{self, EncapsulationResult, HybridCiphertext, HybridKeyPair, HybridPublicKey};
use crate::kdf::{self, HandshakeKeys1, HandshakeKeys2};
use crate::{aead, hash, Result};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::sync::Mutex;
use zeroize::Zeroizing;

/// Source of key material and the primitive operations built on it.
pub trait CryptoProvider: Send + Sync {
    /// Generate a fresh hybrid key pair.
    fn generate_keypair(&self) -> Result<HybridKeyPair>;

    /// Encapsulate fresh shared secrets against `peer`.
    fn encapsulate(&self, peer: &HybridPublicKey) -> Result<EncapsulationResult>;

    /// Fill `dest` with random bytes (nonces, IV prefixes).
    fn fill_random(&self, dest: &mut [u8]);

    /// Recover shared secrets from `ciphertext` with `own` private keys.
    fn decapsulate(
        &self,
        ciphertext: &HybridCiphertext,
        own: &HybridKeyPair,
    ) -> Result<EncapsulationResult> {
        hybrid::decapsulate(ciphertext, own)
    }

    /// Derive the stage-one handshake keys.
    fn kdf1(&self, first: &EncapsulationResult) -> Result<HandshakeKeys1> {
        kdf::kdf1(first)
    }

    /// Derive the application and key-confirmation keys.
    fn kdf2(
        &self,
        first: &EncapsulationResult,
        second: &EncapsulationResult,
    ) -> Result<HandshakeKeys2> {
        kdf::kdf2(first, second)
    }

    /// Seal with a fresh random nonce: `nonce || ciphertext || tag`.
    fn aead_seal(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; aead::NONCE_LEN];
        self.fill_random(&mut nonce);
        aead::seal(key, &nonce, plaintext, aad)
    }

    /// Open data produced by [`CryptoProvider::aead_seal`].
    fn aead_open(&self, key: &[u8; 32], sealed: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        aead::open(key, sealed, aad)
    }

    /// SHA-256 digest.
    fn sha256(&self, data: &[u8]) -> [u8; hash::DIGEST_LEN] {
        hash::sha256(data)
    }
}

/// Provider backed by the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsCryptoProvider;

impl CryptoProvider for OsCryptoProvider {
    fn generate_keypair(&self) -> Result<HybridKeyPair> {
        HybridKeyPair::generate_with_rng(&mut OsRng)
    }

    fn encapsulate(&self, peer: &HybridPublicKey) -> Result<EncapsulationResult> {
        hybrid::encapsulate(peer, &mut OsRng)
    }

    fn fill_random(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Provider with a seeded RNG, producing reproducible key material.
///
/// Never use outside tests: every instance with the same seed yields the same keys.
pub struct SeededCryptoProvider {
    rng: Mutex<StdRng>,
}

impl SeededCryptoProvider {
    /// Create a provider whose output is fully determined by `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned lock still holds a usable RNG state.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}

impl CryptoProvider for SeededCryptoProvider {
    fn generate_keypair(&self) -> Result<HybridKeyPair> {
        self.with_rng(HybridKeyPair::generate_with_rng)
    }

    fn encapsulate(&self, peer: &HybridPublicKey) -> Result<EncapsulationResult> {
        self.with_rng(|rng| hybrid::encapsulate(peer, rng))
    }

    fn fill_random(&self, dest: &mut [u8]) {
        self.with_rng(|rng| rng.fill_bytes(dest));
    }
}
