//! Server side of the handshake.
//!
//! ```text
//! Init --M1--> AwaitM3 --M3--> Established
//!   \___________\______________> Failed
//! ```
//!
//! The server's own key bundle is re-checked for expiry on every inbound
//! message. A transcript mismatch on M3 fails closed: no M4 is produced.

use crate::channel::{Role, SecureChannel};
use crate::handshake::{system_clock, Clock, HandshakeStage};
use crate::keys::ServerIdentity;
use crate::message::{peek_message_type, Message1, Message2, Message3, Message3Inner, Message4, MessageType};
use crate::transcript::{hashes_match, Transcript};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use vau_crypto::{CryptoProvider, EncapsulationResult, HandshakeKeys1, HandshakeKeys2};

enum ServerState {
    Init,
    AwaitM3 {
        first: EncapsulationResult,
        keys1: HandshakeKeys1,
        transcript: Transcript,
    },
    Established {
        keys: HandshakeKeys2,
    },
    Failed,
}

impl ServerState {
    fn stage(&self) -> HandshakeStage {
        match self {
            ServerState::Init => HandshakeStage::Init,
            ServerState::AwaitM3 { .. } => HandshakeStage::AwaitM3,
            ServerState::Established { .. } => HandshakeStage::Established,
            ServerState::Failed => HandshakeStage::Failed,
        }
    }
}

struct ServerContext {
    provider: Arc<dyn CryptoProvider>,
    identity: Arc<ServerIdentity>,
    clock: Clock,
}

/// Server handshake state machine; one instance per connection.
pub struct ServerHandshake {
    context: ServerContext,
    state: ServerState,
}

impl ServerHandshake {
    /// Create a handshake answering with `identity`'s keys.
    pub fn new(identity: Arc<ServerIdentity>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            context: ServerContext {
                provider,
                identity,
                clock: system_clock,
            },
            state: ServerState::Init,
        }
    }

    /// Replace the wall clock used for key bundle expiry checks.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.context.clock = clock;
        self
    }

    /// Current stage.
    pub fn stage(&self) -> HandshakeStage {
        self.state.stage()
    }

    /// Whether the handshake completed.
    pub fn is_established(&self) -> bool {
        matches!(self.state, ServerState::Established { .. })
    }

    /// Key id of the negotiated keys, once established.
    pub fn key_id(&self) -> Option<[u8; 32]> {
        match &self.state {
            ServerState::Established { keys } => Some(keys.key_id),
            _ => None,
        }
    }

    /// Answer M1 with M2, or M3 with M4, dispatching on the message type tag.
    pub fn receive_message(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        self.step(|context, state| {
            context.identity.public_keys().check_validity((context.clock)())?;

            match peek_message_type(message)? {
                MessageType::M1 => receive_m1(context, state, message),
                MessageType::M3 => receive_m3(context, state, message),
                other => Err(Error::UnexpectedMessage {
                    expected: "M1 or M3",
                    actual: other.as_str().to_owned(),
                }),
            }
        })
    }

    /// Turn an established handshake into an application channel.
    pub fn into_channel(self) -> Result<SecureChannel> {
        match self.state {
            ServerState::Established { keys } => Ok(SecureChannel::new(
                Role::Server,
                &keys,
                self.context.provider,
            )),
            ServerState::Failed => Err(Error::SessionFailed),
            _ => Err(Error::InvalidState),
        }
    }

    fn step<T>(
        &mut self,
        transition: impl FnOnce(&ServerContext, ServerState) -> Result<(ServerState, T)>,
    ) -> Result<T> {
        if matches!(self.state, ServerState::Failed) {
            return Err(Error::SessionFailed);
        }

        let state = std::mem::replace(&mut self.state, ServerState::Failed);
        match transition(&self.context, state) {
            Ok((next, output)) => {
                debug!(stage = ?next.stage(), "Server handshake advanced");
                self.state = next;
                Ok(output)
            }
            Err(e) => {
                warn!(error = %e, "Server handshake failed");
                Err(e)
            }
        }
    }
}

fn receive_m1(
    context: &ServerContext,
    state: ServerState,
    message: &[u8],
) -> Result<(ServerState, Vec<u8>)> {
    if !matches!(state, ServerState::Init) {
        return Err(Error::InvalidState);
    }
    let provider = context.provider.as_ref();

    let m1 = Message1::decode(message)?;
    let first = provider.encapsulate(&m1.public_keys)?;
    let keys1 = provider.kdf1(&first)?;

    let aead_ct = provider.aead_seal(
        &keys1.server_to_client,
        context.identity.encoded_bundle(),
        &[],
    )?;
    let m2 = Message2 {
        ciphertext: first.ciphertext.clone(),
        aead_ct,
    }
    .encode()?;
    trace!(len = m2.len(), "Encoded M2");

    let mut transcript = Transcript::new(message);
    transcript.append(&m2);

    Ok((
        ServerState::AwaitM3 {
            first,
            keys1,
            transcript,
        },
        m2,
    ))
}

fn receive_m3(
    context: &ServerContext,
    state: ServerState,
    message: &[u8],
) -> Result<(ServerState, Vec<u8>)> {
    let (first, keys1, mut transcript) = match state {
        ServerState::AwaitM3 {
            first,
            keys1,
            transcript,
        } => (first, keys1, transcript),
        _ => return Err(Error::InvalidState),
    };
    let provider = context.provider.as_ref();

    let m3 = Message3::decode(message)?;
    let expected = transcript.hash_with(provider, &m3.aead_ct);
    transcript.append(message);

    let inner_bytes = provider.aead_open(&keys1.client_to_server, &m3.aead_ct, &[])?;
    let inner = Message3Inner::decode(&inner_bytes)?;

    let second = provider.decapsulate(&inner.ciphertext, context.identity.keypair())?;
    let keys2 = provider.kdf2(&first, &second)?;

    let client_hash = provider.aead_open(
        &keys2.client_to_server_confirm,
        &m3.aead_ct_key_confirmation,
        &[],
    )?;
    if !hashes_match(&client_hash, &expected) {
        return Err(Error::TranscriptMismatch);
    }

    let confirmation = transcript.hash(provider);
    let aead_ct_key_confirmation =
        provider.aead_seal(&keys2.server_to_client_confirm, &confirmation, &[])?;
    let m4 = Message4 {
        aead_ct_key_confirmation,
    }
    .encode()?;
    trace!(len = m4.len(), "Encoded M4");

    Ok((ServerState::Established { keys: keys2 }, m4))
}
