//! Handshake message codec (M1 through M4).
//!
//! Every message is a CBOR map carrying a literal `MessageType` tag. Decoding
//! is strict: the tag must match the message being decoded, all fields must be
//! present with the right major type, and key material must have the exact
//! lengths of P-256 and ML-KEM-768.
//!
//! Classical public keys and ciphertexts travel as `{"crv":"P-256","x":b,"y":b}`.

use crate::cbor::{self, MapReader};
use crate::{Error, Result};
use ciborium::value::Value;
use vau_crypto::kex::{ecdh_p256, ml_kem};
use vau_crypto::{HybridCiphertext, HybridPublicKey};

/// Map key holding the message type tag.
pub const MESSAGE_TYPE_KEY: &str = "MessageType";

/// Curve name carried in encoded EC points.
pub const CURVE_NAME: &str = "P-256";

/// Handshake message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Client ephemeral public keys.
    M1,
    /// Server encapsulation plus sealed key bundle.
    M2,
    /// Client encapsulation plus key confirmation.
    M3,
    /// Server key confirmation.
    M4,
}

impl MessageType {
    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "M1",
            Self::M2 => "M2",
            Self::M3 => "M3",
            Self::M4 => "M4",
        }
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "M1" => Some(Self::M1),
            "M2" => Some(Self::M2),
            "M3" => Some(Self::M3),
            "M4" => Some(Self::M4),
            _ => None,
        }
    }
}

/// Read the `MessageType` tag of an encoded handshake message without decoding the rest.
pub fn peek_message_type(data: &[u8]) -> Result<MessageType> {
    let value = cbor::from_slice(data)?;
    let reader = MapReader::new(&value, "handshake message")?;
    let tag = reader.text(MESSAGE_TYPE_KEY)?;
    MessageType::from_tag(tag).ok_or_else(|| Error::Decode(format!("unknown message type {tag}")))
}

/// M1: the client's ephemeral hybrid public keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message1 {
    /// Ephemeral ECDH and ML-KEM public keys.
    pub public_keys: HybridPublicKey,
}

/// M2: server encapsulation against the client keys and the sealed key bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message2 {
    /// Ciphertexts of the first encapsulation.
    pub ciphertext: HybridCiphertext,
    /// Signed key bundle sealed with the server-to-client handshake key.
    pub aead_ct: Vec<u8>,
}

/// M3: sealed second encapsulation plus the client's key confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message3 {
    /// [`Message3Inner`] sealed with the client-to-server handshake key.
    pub aead_ct: Vec<u8>,
    /// Transcript hash sealed with the client-to-server confirmation key.
    pub aead_ct_key_confirmation: Vec<u8>,
}

/// Inner layer of M3: ciphertexts of the encapsulation against the server's long-lived keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message3Inner {
    /// Ciphertexts of the second encapsulation.
    pub ciphertext: HybridCiphertext,
}

/// M4: the server's key confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message4 {
    /// Full transcript hash sealed with the server-to-client confirmation key.
    pub aead_ct_key_confirmation: Vec<u8>,
}

impl Message1 {
    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec(&cbor::map([
            (MESSAGE_TYPE_KEY, cbor::text(MessageType::M1.as_str())),
            ("ECDH_PK", encode_point(&self.public_keys.ecdh)?),
            ("Kyber768_PK", cbor::bytes(&self.public_keys.mlkem)),
        ]))
    }

    /// Decode from CBOR, requiring the `M1` tag.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let value = cbor::from_slice(data)?;
        let reader = expect_type(&value, MessageType::M1)?;

        Ok(Self {
            public_keys: HybridPublicKey {
                ecdh: decode_point(&reader, "ECDH_PK")?,
                mlkem: mlkem_field(&reader, "Kyber768_PK", ml_kem::PUBLIC_KEY_LEN)?,
            },
        })
    }
}

impl Message2 {
    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec(&cbor::map([
            (MESSAGE_TYPE_KEY, cbor::text(MessageType::M2.as_str())),
            ("ECDH_ct", encode_point(&self.ciphertext.ecdh)?),
            ("Kyber768_ct", cbor::bytes(&self.ciphertext.mlkem)),
            ("AEAD_ct", cbor::bytes(&self.aead_ct)),
        ]))
    }

    /// Decode from CBOR, requiring the `M2` tag.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let value = cbor::from_slice(data)?;
        let reader = expect_type(&value, MessageType::M2)?;

        Ok(Self {
            ciphertext: HybridCiphertext {
                ecdh: decode_point(&reader, "ECDH_ct")?,
                mlkem: mlkem_field(&reader, "Kyber768_ct", ml_kem::CIPHERTEXT_LEN)?,
            },
            aead_ct: reader.bytes("AEAD_ct")?.to_vec(),
        })
    }
}

impl Message3 {
    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec(&cbor::map([
            (MESSAGE_TYPE_KEY, cbor::text(MessageType::M3.as_str())),
            ("AEAD_ct", cbor::bytes(&self.aead_ct)),
            (
                "AEAD_ct_key_confirmation",
                cbor::bytes(&self.aead_ct_key_confirmation),
            ),
        ]))
    }

    /// Decode from CBOR, requiring the `M3` tag.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let value = cbor::from_slice(data)?;
        let reader = expect_type(&value, MessageType::M3)?;

        Ok(Self {
            aead_ct: reader.bytes("AEAD_ct")?.to_vec(),
            aead_ct_key_confirmation: reader.bytes("AEAD_ct_key_confirmation")?.to_vec(),
        })
    }
}

impl Message3Inner {
    /// Encode to CBOR. The inner layer carries no type tag.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec(&cbor::map([
            ("ECDH_ct", encode_point(&self.ciphertext.ecdh)?),
            ("Kyber768_ct", cbor::bytes(&self.ciphertext.mlkem)),
        ]))
    }

    /// Decode from CBOR.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let value = cbor::from_slice(data)?;
        let reader = MapReader::new(&value, "M3 inner layer")?;

        Ok(Self {
            ciphertext: HybridCiphertext {
                ecdh: decode_point(&reader, "ECDH_ct")?,
                mlkem: mlkem_field(&reader, "Kyber768_ct", ml_kem::CIPHERTEXT_LEN)?,
            },
        })
    }
}

impl Message4 {
    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec(&cbor::map([
            (MESSAGE_TYPE_KEY, cbor::text(MessageType::M4.as_str())),
            (
                "AEAD_ct_key_confirmation",
                cbor::bytes(&self.aead_ct_key_confirmation),
            ),
        ]))
    }

    /// Decode from CBOR, requiring the `M4` tag.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let value = cbor::from_slice(data)?;
        let reader = expect_type(&value, MessageType::M4)?;

        Ok(Self {
            aead_ct_key_confirmation: reader.bytes("AEAD_ct_key_confirmation")?.to_vec(),
        })
    }
}

fn expect_type(value: &Value, expected: MessageType) -> Result<MapReader<'_>> {
    let reader = MapReader::new(value, expected.as_str())?;
    let tag = reader.text(MESSAGE_TYPE_KEY)?;
    if tag != expected.as_str() {
        return Err(Error::UnexpectedMessage {
            expected: expected.as_str(),
            actual: tag.to_owned(),
        });
    }
    Ok(reader)
}

/// Encode an uncompressed SEC1 point as `{"crv","x","y"}`.
pub(crate) fn encode_point(sec1: &[u8]) -> Result<Value> {
    let (x, y) = ecdh_p256::coordinates(sec1)?;
    Ok(cbor::map([
        ("crv", cbor::text(CURVE_NAME)),
        ("x", cbor::bytes(x)),
        ("y", cbor::bytes(y)),
    ]))
}

/// Decode `{"crv","x","y"}` into an uncompressed SEC1 point, validated on the curve.
pub(crate) fn decode_point(reader: &MapReader<'_>, key: &str) -> Result<Vec<u8>> {
    let point = reader.map(key, "EC point")?;

    let curve = point.text("crv")?;
    if curve != CURVE_NAME {
        return Err(Error::Decode(format!("{key}: unsupported curve {curve}")));
    }

    let sec1 = ecdh_p256::public_key_from_coordinates(point.bytes("x")?, point.bytes("y")?)
        .map_err(|e| Error::Decode(format!("{key}: {e}")))?;
    ecdh_p256::parse_public_key(&sec1).map_err(|e| Error::Decode(format!("{key}: {e}")))?;
    Ok(sec1)
}

fn mlkem_field(reader: &MapReader<'_>, key: &str, expected: usize) -> Result<Vec<u8>> {
    let bytes = reader.bytes(key)?;
    if bytes.len() != expected {
        return Err(Error::Decode(format!(
            "{key}: expected {expected} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use vau_crypto::HybridKeyPair;

    fn sample_public() -> HybridPublicKey {
        HybridKeyPair::generate_with_rng(&mut OsRng)
            .unwrap()
            .public_key()
    }

    #[test]
    fn test_message1_roundtrip() {
        let m1 = Message1 {
            public_keys: sample_public(),
        };
        let encoded = m1.encode().unwrap();

        assert_eq!(peek_message_type(&encoded).unwrap(), MessageType::M1);
        assert_eq!(Message1::decode(&encoded).unwrap(), m1);
    }

    #[test]
    fn test_wrong_type_tag_rejected() {
        let m4 = Message4 {
            aead_ct_key_confirmation: vec![1, 2, 3],
        };
        let encoded = m4.encode().unwrap();

        match Message3::decode(&encoded) {
            Err(Error::UnexpectedMessage { expected, actual }) => {
                assert_eq!(expected, "M3");
                assert_eq!(actual, "M4");
            }
            other => panic!("expected UnexpectedMessage, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_field_rejected() {
        let encoded = cbor::to_vec(&cbor::map([
            (MESSAGE_TYPE_KEY, cbor::text("M3")),
            ("AEAD_ct", cbor::bytes(&[0u8; 40])),
        ]))
        .unwrap();
        assert!(matches!(Message3::decode(&encoded), Err(Error::Decode(_))));
    }

    #[test]
    fn test_missing_type_tag_rejected() {
        let encoded = cbor::to_vec(&cbor::map([(
            "AEAD_ct_key_confirmation",
            cbor::bytes(&[0u8; 40]),
        )]))
        .unwrap();
        assert!(Message4::decode(&encoded).is_err());
        assert!(peek_message_type(&encoded).is_err());
    }

    #[test]
    fn test_text_instead_of_bytes_rejected() {
        let encoded = cbor::to_vec(&cbor::map([
            (MESSAGE_TYPE_KEY, cbor::text("M4")),
            ("AEAD_ct_key_confirmation", cbor::text("deadbeef")),
        ]))
        .unwrap();
        assert!(Message4::decode(&encoded).is_err());
    }

    #[test]
    fn test_wrong_curve_rejected() {
        let public = sample_public();
        let (x, y) = ecdh_p256::coordinates(&public.ecdh).unwrap();
        let encoded = cbor::to_vec(&cbor::map([
            (MESSAGE_TYPE_KEY, cbor::text("M1")),
            (
                "ECDH_PK",
                cbor::map([
                    ("crv", cbor::text("brainpoolP256r1")),
                    ("x", cbor::bytes(x)),
                    ("y", cbor::bytes(y)),
                ]),
            ),
            ("Kyber768_PK", cbor::bytes(&public.mlkem)),
        ]))
        .unwrap();
        assert!(Message1::decode(&encoded).is_err());
    }

    #[test]
    fn test_short_coordinate_rejected() {
        let public = sample_public();
        let (x, y) = ecdh_p256::coordinates(&public.ecdh).unwrap();
        let encoded = cbor::to_vec(&cbor::map([
            (MESSAGE_TYPE_KEY, cbor::text("M1")),
            (
                "ECDH_PK",
                cbor::map([
                    ("crv", cbor::text(CURVE_NAME)),
                    ("x", cbor::bytes(&x[1..])),
                    ("y", cbor::bytes(y)),
                ]),
            ),
            ("Kyber768_PK", cbor::bytes(&public.mlkem)),
        ]))
        .unwrap();
        assert!(Message1::decode(&encoded).is_err());
    }

    #[test]
    fn test_wrong_mlkem_length_rejected() {
        let mut public = sample_public();
        public.mlkem.truncate(1000);
        let encoded = Message1 {
            public_keys: public,
        }
        .encode()
        .unwrap();
        assert!(Message1::decode(&encoded).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(peek_message_type(&[0xff, 0x00, 0x13]).is_err());
        assert!(Message2::decode(&[]).is_err());
    }
}
