//! Key exchange implementations.
//!
//! Implements:
//! - ECDH-P256 (NIST SP 800-56A), the classical half of the hybrid KEM
//! - ML-KEM-768 (FIPS 203), the post-quantum half

pub mod ecdh_p256;
pub mod ml_kem;

pub use self::ecdh_p256::EcdhP256KeyPair;
pub use self::ml_kem::MlKem768KeyPair;
