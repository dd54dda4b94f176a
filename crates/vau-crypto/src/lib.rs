//! Cryptographic primitives for the VAU tunnel protocol.
//!
//! This crate implements the building blocks the handshake is assembled from:
//! - Hybrid key encapsulation (ECDH-P256 + ML-KEM-768)
//! - AEAD encryption (AES-256-GCM)
//! - Two-stage key derivation (HKDF-SHA256)
//! - SHA-256 transcript hashing and ES256 key-bundle signatures
//!
//! Every primitive is a stateless function over byte buffers. Randomness is
//! routed through a [`CryptoProvider`] so callers can inject deterministic
//! key material in tests.
//!
//! Security rules for this crate:
//! - All secrets use Zeroizing wrappers
//! - No logging of key material
//! - Failures are always reported, never swallowed

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod hash;
pub mod hybrid;
pub mod kdf;
pub mod kex;
pub mod provider;
pub mod signature;

pub use error::{Error, Result};
pub use hybrid::{EncapsulationResult, HybridCiphertext, HybridKeyPair, HybridPublicKey};
pub use kdf::{HandshakeKeys1, HandshakeKeys2};
pub use provider::{CryptoProvider, OsCryptoProvider, SeededCryptoProvider};
