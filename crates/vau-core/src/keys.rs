//! The server's signed long-lived public keys.
//!
//! The server identity is a hybrid key pair whose public halves are published
//! in a [`SignedPublicKeyBundle`]: the CBOR-encoded [`PublicVauKeys`] record,
//! an ES256 signature over those exact bytes, the signer's certificate chain
//! and an OCSP response. The bundle travels sealed inside M2.

use crate::cbor::{self, MapReader};
use crate::message::{decode_point, encode_point};
use crate::{Error, Result};
use ciborium::value::Value;
use vau_crypto::kex::ml_kem;
use vau_crypto::signature::Es256KeyPair;
use vau_crypto::{HybridKeyPair, HybridPublicKey};

/// Maximum distance between `iat` and `exp` of a key bundle.
pub const MAX_VALIDITY_SECS: u64 = 30 * 24 * 60 * 60;

/// The public key record covered by the bundle signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicVauKeys {
    /// Long-lived ECDH and ML-KEM public keys.
    pub keys: HybridPublicKey,
    /// Issued-at, epoch seconds.
    pub issued_at: u64,
    /// Expiry, epoch seconds.
    pub expires_at: u64,
    /// Free-form operator comment.
    pub comment: String,
}

impl PublicVauKeys {
    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec(&cbor::map([
            ("ECDH_PK", encode_point(&self.keys.ecdh)?),
            ("Kyber768_PK", cbor::bytes(&self.keys.mlkem)),
            ("iat", cbor::uint(self.issued_at)),
            ("exp", cbor::uint(self.expires_at)),
            ("comment", cbor::text(&self.comment)),
        ]))
    }

    /// Decode from CBOR.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let value = cbor::from_slice(data)?;
        let reader = MapReader::new(&value, "signed public keys")?;

        let mlkem = reader.bytes("Kyber768_PK")?;
        if mlkem.len() != ml_kem::PUBLIC_KEY_LEN {
            return Err(Error::Decode(format!(
                "Kyber768_PK: expected {} bytes, got {}",
                ml_kem::PUBLIC_KEY_LEN,
                mlkem.len()
            )));
        }

        Ok(Self {
            keys: HybridPublicKey {
                ecdh: decode_point(&reader, "ECDH_PK")?,
                mlkem: mlkem.to_vec(),
            },
            issued_at: reader.uint("iat")?,
            expires_at: reader.uint("exp")?,
            comment: reader.text("comment")?.to_owned(),
        })
    }

    /// Check the window length only.
    pub fn check_window(&self) -> Result<()> {
        let too_long = self
            .expires_at
            .checked_sub(self.issued_at)
            .map_or(true, |window| window > MAX_VALIDITY_SECS);
        if too_long {
            return Err(Error::ValidityWindow {
                issued_at: self.issued_at,
                expires_at: self.expires_at,
            });
        }
        Ok(())
    }

    /// Check the window length and that `now` lies before expiry.
    pub fn check_validity(&self, now: u64) -> Result<()> {
        self.check_window()?;
        if now >= self.expires_at {
            return Err(Error::BundleExpired {
                expires_at: self.expires_at,
                now,
            });
        }
        Ok(())
    }
}

/// Signed key bundle as carried inside M2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPublicKeyBundle {
    /// CBOR-encoded [`PublicVauKeys`]; the exact bytes that were signed.
    pub signed_pub_keys: Vec<u8>,
    /// Raw ES256 signature (`r || s`) over `signed_pub_keys`.
    pub signature_es256: Vec<u8>,
    /// Signer certificate chain, leaf first (DER).
    pub cert_chain: Vec<Vec<u8>>,
    /// OCSP response for the signer certificate (DER).
    pub ocsp_response: Vec<u8>,
    /// Certificate data version, bumped when the chain is re-issued.
    pub cdv: u64,
}

impl SignedPublicKeyBundle {
    /// Sign `keys` and assemble a bundle.
    pub fn sign(
        keys: &PublicVauKeys,
        signer: &Es256KeyPair,
        cert_chain: Vec<Vec<u8>>,
        ocsp_response: Vec<u8>,
        cdv: u64,
    ) -> Result<Self> {
        let signed_pub_keys = keys.encode()?;
        let signature_es256 = signer.sign(&signed_pub_keys);
        Ok(Self {
            signed_pub_keys,
            signature_es256,
            cert_chain,
            ocsp_response,
            cdv,
        })
    }

    /// Decode the embedded public key record.
    pub fn public_keys(&self) -> Result<PublicVauKeys> {
        PublicVauKeys::decode(&self.signed_pub_keys)
    }

    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let chain = self.cert_chain.iter().map(|c| cbor::bytes(c)).collect();
        cbor::to_vec(&cbor::map([
            ("signed_pub_keys", cbor::bytes(&self.signed_pub_keys)),
            ("signature-ES256", cbor::bytes(&self.signature_es256)),
            ("cert_chain", Value::Array(chain)),
            ("ocsp_response", cbor::bytes(&self.ocsp_response)),
            ("cdv", cbor::uint(self.cdv)),
        ]))
    }

    /// Decode from CBOR.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let value = cbor::from_slice(data)?;
        let reader = MapReader::new(&value, "signed key bundle")?;

        let cert_chain = reader
            .array("cert_chain")?
            .iter()
            .map(|item| match item {
                Value::Bytes(der) => Ok(der.clone()),
                _ => Err(Error::Decode("cert_chain entries must be byte strings".into())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            signed_pub_keys: reader.bytes("signed_pub_keys")?.to_vec(),
            signature_es256: reader.bytes("signature-ES256")?.to_vec(),
            cert_chain,
            ocsp_response: reader.bytes("ocsp_response")?.to_vec(),
            cdv: reader.uint("cdv")?,
        })
    }
}

/// A server's long-lived key pair together with the bundle publishing it.
pub struct ServerIdentity {
    keypair: HybridKeyPair,
    bundle: SignedPublicKeyBundle,
    encoded_bundle: Vec<u8>,
    public_keys: PublicVauKeys,
}

impl ServerIdentity {
    /// Bind `keypair` to `bundle`.
    ///
    /// # Errors
    ///
    /// Fails if the bundle's validity window exceeds [`MAX_VALIDITY_SECS`] or
    /// if the bundle publishes keys other than `keypair`'s.
    pub fn new(keypair: HybridKeyPair, bundle: SignedPublicKeyBundle) -> Result<Self> {
        let public_keys = bundle.public_keys()?;
        public_keys.check_window()?;

        if public_keys.keys != keypair.public_key() {
            return Err(Error::Untrusted(
                "key bundle does not match the server key pair".into(),
            ));
        }

        let encoded_bundle = bundle.encode()?;
        Ok(Self {
            keypair,
            bundle,
            encoded_bundle,
            public_keys,
        })
    }

    /// The long-lived key pair.
    pub fn keypair(&self) -> &HybridKeyPair {
        &self.keypair
    }

    /// The published bundle.
    pub fn bundle(&self) -> &SignedPublicKeyBundle {
        &self.bundle
    }

    /// CBOR encoding of the bundle, as sealed into M2.
    pub fn encoded_bundle(&self) -> &[u8] {
        &self.encoded_bundle
    }

    /// The decoded public key record.
    pub fn public_keys(&self) -> &PublicVauKeys {
        &self.public_keys
    }
}
