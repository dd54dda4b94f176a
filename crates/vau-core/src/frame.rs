//! Application frame parsing and serialization.
//!
//! Wire format (41-byte header, then ciphertext):
//!
//! ```text
//! byte 0        direction (1 = request, 2 = response)
//! bytes 1..9    counter, u64 big-endian
//! bytes 9..41   key_id
//! bytes 41..    iv[12] || AES-256-GCM ciphertext || tag[16]
//! ```
//!
//! The header is the associated data of the AEAD.

use crate::{Error, Result};

/// Length of the frame header.
pub const HEADER_LEN: usize = 41;
/// Length of the key id.
pub const KEY_ID_LEN: usize = 32;

/// Frame direction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Client to server (1).
    Request = 0x01,
    /// Server to client (2).
    Response = 0x02,
}

impl Direction {
    /// Convert to wire format.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from wire format.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::Response),
            _ => None,
        }
    }
}

/// One application frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Direction of travel.
    pub direction: Direction,
    /// Sender's message counter.
    pub counter: u64,
    /// Key id of the session's key material.
    pub key_id: [u8; KEY_ID_LEN],
    /// `iv || ciphertext || tag`.
    pub ciphertext: Vec<u8>,
}

impl Frame {
    /// Parse a frame from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        check_len(data, HEADER_LEN)?;

        let direction = Direction::from_u8(data[0])
            .ok_or_else(|| Error::Decode(format!("unknown frame direction 0x{:02X}", data[0])))?;
        let counter = read_u64_be(&data[1..9]);
        let mut key_id = [0u8; KEY_ID_LEN];
        key_id.copy_from_slice(&data[9..HEADER_LEN]);

        Ok(Self {
            direction,
            counter,
            key_id,
            ciphertext: data[HEADER_LEN..].to_vec(),
        })
    }

    /// Serialize the frame to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        buf.extend_from_slice(&self.header());
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    /// The 41-byte header, used as associated data.
    pub fn header(&self) -> [u8; HEADER_LEN] {
        encode_header(self.direction, self.counter, &self.key_id)
    }
}

/// Build a frame header.
pub fn encode_header(direction: Direction, counter: u64, key_id: &[u8; KEY_ID_LEN]) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = direction.to_u8();
    header[1..9].copy_from_slice(&counter.to_be_bytes());
    header[9..HEADER_LEN].copy_from_slice(key_id);
    header
}

// Helper functions

#[inline]
fn check_len(data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        Err(Error::InsufficientData(needed))
    } else {
        Ok(())
    }
}

#[inline]
fn read_u64_be(data: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[..8]);
    u64::from_be_bytes(bytes)
}
