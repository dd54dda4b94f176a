//! Post-handshake application channel.
//!
//! Each direction has its own key and counter. Sending increments the local
//! counter (the first frame carries counter 1); receiving requires the frame's
//! counter to be strictly greater than the last accepted one, so replayed and
//! reordered frames are rejected. Any failure on receive poisons the channel.

use crate::frame::{encode_header, Direction, Frame, KEY_ID_LEN};
use crate::{Error, Result};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{trace, warn};
use vau_crypto::aead::{self, NONCE_LEN, TAG_LEN};
use vau_crypto::{CryptoProvider, HandshakeKeys2};
use zeroize::Zeroizing;

/// Which end of the tunnel a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends requests, receives responses.
    Client,
    /// Receives requests, sends responses.
    Server,
}

impl Role {
    fn outbound(self) -> Direction {
        match self {
            Role::Client => Direction::Request,
            Role::Server => Direction::Response,
        }
    }

    fn inbound(self) -> Direction {
        match self {
            Role::Client => Direction::Response,
            Role::Server => Direction::Request,
        }
    }
}

/// Encrypting and decrypting end of an established tunnel.
pub struct SecureChannel {
    role: Role,
    send_key: Zeroizing<[u8; 32]>,
    receive_key: Zeroizing<[u8; 32]>,
    key_id: [u8; KEY_ID_LEN],
    send_counter: u64,
    receive_counter: u64,
    failed: bool,
    provider: Arc<dyn CryptoProvider>,
}

impl SecureChannel {
    /// Bind the application keys of a finished handshake to `role`.
    pub fn new(role: Role, keys: &HandshakeKeys2, provider: Arc<dyn CryptoProvider>) -> Self {
        let (send_key, receive_key) = match role {
            Role::Client => (&keys.client_to_server_app, &keys.server_to_client_app),
            Role::Server => (&keys.server_to_client_app, &keys.client_to_server_app),
        };

        Self {
            role,
            send_key: send_key.clone(),
            receive_key: receive_key.clone(),
            key_id: keys.key_id,
            send_counter: 0,
            receive_counter: 0,
            failed: false,
            provider,
        }
    }

    /// Role of this end.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Key id carried in every frame.
    pub fn key_id(&self) -> &[u8; KEY_ID_LEN] {
        &self.key_id
    }

    /// Counter of the last sent frame (0 before the first).
    pub fn send_counter(&self) -> u64 {
        self.send_counter
    }

    /// Counter of the last accepted frame (0 before the first).
    pub fn receive_counter(&self) -> u64 {
        self.receive_counter
    }

    /// Whether a receive failure has poisoned the channel.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Encrypt `plaintext` into a serialized frame.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if self.failed {
            return Err(Error::SessionFailed);
        }

        let counter = self
            .send_counter
            .checked_add(1)
            .ok_or(Error::CounterExhausted)?;

        let header = encode_header(self.role.outbound(), counter, &self.key_id);

        let mut prefix = [0u8; 4];
        self.provider.fill_random(&mut prefix);
        let nonce = aead::construct_nonce(prefix, counter);
        let ciphertext = aead::seal(&self.send_key, &nonce, plaintext, &header)?;

        self.send_counter = counter;

        let frame = Frame {
            direction: self.role.outbound(),
            counter,
            key_id: self.key_id,
            ciphertext,
        };
        trace!(counter, len = frame.ciphertext.len(), "Sealed application frame");
        Ok(frame.serialize())
    }

    /// Authenticate and decrypt a serialized frame.
    ///
    /// On any error the channel is poisoned and every later call fails with
    /// [`Error::SessionFailed`].
    pub fn open(&mut self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if self.failed {
            return Err(Error::SessionFailed);
        }

        match self.open_frame(data) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                warn!(error = %e, "Rejected application frame; closing channel");
                self.failed = true;
                Err(e)
            }
        }
    }

    fn open_frame(&mut self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let frame = Frame::parse(data)?;

        let expected = self.role.inbound();
        if frame.direction != expected {
            return Err(Error::UnexpectedDirection {
                expected: expected.to_u8(),
                actual: frame.direction.to_u8(),
            });
        }

        if !bool::from(frame.key_id[..].ct_eq(&self.key_id[..])) {
            return Err(Error::KeyIdMismatch);
        }

        if frame.counter <= self.receive_counter {
            return Err(Error::Replay {
                counter: frame.counter,
                last: self.receive_counter,
            });
        }

        if frame.ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::InsufficientData(
                crate::frame::HEADER_LEN + NONCE_LEN + TAG_LEN,
            ));
        }

        let plaintext = aead::open(&self.receive_key, &frame.ciphertext, &frame.header())?;

        self.receive_counter = frame.counter;
        trace!(counter = frame.counter, "Opened application frame");
        Ok(plaintext)
    }
}
