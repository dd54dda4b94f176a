//! Core protocol engine for the VAU tunnel.
//!
//! This crate implements the tunnel's protocol layer on top of `vau-crypto`:
//! - CBOR codec for the handshake messages M1 to M4 and the server key bundle
//! - Client and server handshake state machines
//! - Transcript hashing and key confirmation
//! - Trust validation seam for the server's certificate chain
//! - Application frames and the replay-protected [`SecureChannel`]
//!
//! Nothing here performs I/O. The outer HTTP binding lives in `vau-transport`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
pub mod channel;
pub mod client;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod keys;
pub mod message;
pub mod server;
pub mod transcript;
pub mod trust;

pub use channel::{Role, SecureChannel};
pub use client::ClientHandshake;
pub use error::{Error, ErrorKind, Result};
pub use frame::{Direction, Frame};
pub use handshake::{Clock, HandshakeStage};
pub use keys::{PublicVauKeys, ServerIdentity, SignedPublicKeyBundle};
pub use message::{peek_message_type, MessageType};
pub use server::ServerHandshake;
pub use trust::{InsecureTrustValidator, PinnedSignerValidator, TrustValidator, ValidationRequest, ValidationResult};
