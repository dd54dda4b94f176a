//! Hybrid key encapsulation: ECDH-P256 combined with ML-KEM-768.
//!
//! The classical half is used as a KEM by generating an ephemeral P-256 key pair
//! per encapsulation; its public key travels as the ECDH "ciphertext". Both
//! shared secrets are fed into the key schedule in [`crate::kdf`].

use crate::kex::{ecdh_p256, ml_kem, EcdhP256KeyPair, MlKem768KeyPair};
use crate::Result;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

/// One classical and one post-quantum key pair, generated and owned together.
pub struct HybridKeyPair {
    ecdh: EcdhP256KeyPair,
    mlkem: MlKem768KeyPair,
}

impl HybridKeyPair {
    /// Generate fresh key pairs from `rng`.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        Ok(Self {
            ecdh: EcdhP256KeyPair::generate_with_rng(rng)?,
            mlkem: MlKem768KeyPair::generate_with_rng(rng)?,
        })
    }

    /// Assemble a hybrid key pair from existing halves (e.g. a provisioned server identity).
    pub fn from_parts(ecdh: EcdhP256KeyPair, mlkem: MlKem768KeyPair) -> Self {
        Self { ecdh, mlkem }
    }

    /// The public halves.
    pub fn public_key(&self) -> HybridPublicKey {
        HybridPublicKey {
            ecdh: self.ecdh.public_key().to_vec(),
            mlkem: self.mlkem.public_key().to_vec(),
        }
    }

    /// The classical key pair.
    pub fn ecdh(&self) -> &EcdhP256KeyPair {
        &self.ecdh
    }

    /// The post-quantum key pair.
    pub fn mlkem(&self) -> &MlKem768KeyPair {
        &self.mlkem
    }
}

/// Public halves of a [`HybridKeyPair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridPublicKey {
    /// Uncompressed SEC1 P-256 point (65 bytes).
    pub ecdh: Vec<u8>,
    /// ML-KEM-768 encapsulation key (1184 bytes).
    pub mlkem: Vec<u8>,
}

/// Ciphertexts produced by one hybrid encapsulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridCiphertext {
    /// Sender's ephemeral P-256 public key (65 bytes, uncompressed).
    pub ecdh: Vec<u8>,
    /// ML-KEM-768 ciphertext (1088 bytes).
    pub mlkem: Vec<u8>,
}

/// Shared secrets and ciphertexts of one encapsulation.
///
/// Produced once per encapsulate/decapsulate call and consumed by the KDF.
pub struct EncapsulationResult {
    /// ECDH shared secret (x-coordinate).
    pub ecdh_shared_secret: Zeroizing<[u8; 32]>,
    /// ML-KEM shared secret.
    pub mlkem_shared_secret: Zeroizing<[u8; 32]>,
    /// Ciphertexts delivered to (or received from) the peer.
    pub ciphertext: HybridCiphertext,
}

/// Encapsulate fresh shared secrets against `peer`.
pub fn encapsulate<R: RngCore + CryptoRng>(
    peer: &HybridPublicKey,
    rng: &mut R,
) -> Result<EncapsulationResult> {
    ecdh_p256::parse_public_key(&peer.ecdh)?;

    let ephemeral = EcdhP256KeyPair::generate_with_rng(rng)?;
    let ecdh_shared_secret = ephemeral.exchange(&peer.ecdh)?;
    let (mlkem_ct, mlkem_shared_secret) = MlKem768KeyPair::encapsulate_with_rng(&peer.mlkem, rng)?;

    Ok(EncapsulationResult {
        ecdh_shared_secret,
        mlkem_shared_secret,
        ciphertext: HybridCiphertext {
            ecdh: ephemeral.public_key().to_vec(),
            mlkem: mlkem_ct,
        },
    })
}

/// Recover the shared secrets of `ciphertext` with `own` private keys.
pub fn decapsulate(ciphertext: &HybridCiphertext, own: &HybridKeyPair) -> Result<EncapsulationResult> {
    if ciphertext.mlkem.len() != ml_kem::CIPHERTEXT_LEN {
        return Err(crate::Error::InvalidLength {
            expected: ml_kem::CIPHERTEXT_LEN,
            actual: ciphertext.mlkem.len(),
        });
    }

    let ecdh_shared_secret = own.ecdh.exchange(&ciphertext.ecdh)?;
    let mlkem_shared_secret = own.mlkem.decapsulate(&ciphertext.mlkem)?;

    Ok(EncapsulationResult {
        ecdh_shared_secret,
        mlkem_shared_secret,
        ciphertext: ciphertext.clone(),
    })
}
