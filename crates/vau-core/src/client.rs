//! Client side of the handshake.
//!
//! ```text
//! Init --start--> AwaitM2 --receive_m2--> AwaitM4 --receive_m4--> Established
//!   \________________\_______________________\______________________> Failed
//! ```
//!
//! Each transition is a plain function consuming the previous state by value.
//! The [`ClientHandshake`] wrapper swaps the state out before a transition and
//! leaves [`HandshakeStage::Failed`] behind if the transition errors.

use crate::channel::{Role, SecureChannel};
use crate::handshake::{system_clock, Clock, HandshakeStage};
use crate::keys::{PublicVauKeys, SignedPublicKeyBundle};
use crate::message::{Message1, Message2, Message3, Message3Inner, Message4};
use crate::transcript::{hashes_match, Transcript};
use crate::trust::{verify_bundle, TrustValidator};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use vau_crypto::{CryptoProvider, HandshakeKeys2, HybridKeyPair};

enum ClientState {
    Init,
    AwaitM2 {
        keypair: HybridKeyPair,
        transcript: Transcript,
    },
    AwaitM4 {
        keys: HandshakeKeys2,
        server_keys: PublicVauKeys,
        transcript: Transcript,
    },
    Established {
        keys: HandshakeKeys2,
    },
    Failed,
}

impl ClientState {
    fn stage(&self) -> HandshakeStage {
        match self {
            ClientState::Init => HandshakeStage::Init,
            ClientState::AwaitM2 { .. } => HandshakeStage::AwaitM2,
            ClientState::AwaitM4 { .. } => HandshakeStage::AwaitM4,
            ClientState::Established { .. } => HandshakeStage::Established,
            ClientState::Failed => HandshakeStage::Failed,
        }
    }
}

struct ClientContext {
    provider: Arc<dyn CryptoProvider>,
    validator: Arc<dyn TrustValidator>,
    hostname: String,
    clock: Clock,
}

/// Client handshake state machine.
pub struct ClientHandshake {
    context: ClientContext,
    state: ClientState,
}

impl ClientHandshake {
    /// Create a handshake towards `hostname`.
    pub fn new(
        provider: Arc<dyn CryptoProvider>,
        validator: Arc<dyn TrustValidator>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            context: ClientContext {
                provider,
                validator,
                hostname: hostname.into(),
                clock: system_clock,
            },
            state: ClientState::Init,
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
        matches!(self.state, ClientState::Established { .. })
    }

    /// Key id of the negotiated keys, once established.
    pub fn key_id(&self) -> Option<[u8; 32]> {
        match &self.state {
            ClientState::Established { keys } => Some(keys.key_id),
            _ => None,
        }
    }

    /// Generate ephemeral keys and produce M1.
    pub fn start(&mut self) -> Result<Vec<u8>> {
        self.step(start)
    }

    /// Process M2 and produce M3.
    pub fn receive_m2(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        self.step(|context, state| receive_m2(context, state, message))
    }

    /// Process M4, completing the handshake.
    pub fn receive_m4(&mut self, message: &[u8]) -> Result<()> {
        self.step(|context, state| receive_m4(context, state, message))
    }

    /// Turn an established handshake into an application channel.
    pub fn into_channel(self) -> Result<SecureChannel> {
        match self.state {
            ClientState::Established { keys } => Ok(SecureChannel::new(
                Role::Client,
                &keys,
                self.context.provider,
            )),
            ClientState::Failed => Err(Error::SessionFailed),
            _ => Err(Error::InvalidState),
        }
    }

    fn step<T>(
        &mut self,
        transition: impl FnOnce(&ClientContext, ClientState) -> Result<(ClientState, T)>,
    ) -> Result<T> {
        let state = std::mem::replace(&mut self.state, ClientState::Failed);
        match transition(&self.context, state) {
            Ok((next, output)) => {
                debug!(stage = ?next.stage(), "Client handshake advanced");
                self.state = next;
                Ok(output)
            }
            Err(e) => {
                warn!(error = %e, "Client handshake failed");
                Err(e)
            }
        }
    }
}

fn start(context: &ClientContext, state: ClientState) -> Result<(ClientState, Vec<u8>)> {
    match state {
        ClientState::Init => {}
        ClientState::Failed => return Err(Error::SessionFailed),
        _ => return Err(Error::InvalidState),
    }

    let keypair = context.provider.generate_keypair()?;
    let m1 = Message1 {
        public_keys: keypair.public_key(),
    }
    .encode()?;
    trace!(len = m1.len(), "Encoded M1");

    let transcript = Transcript::new(&m1);
    Ok((ClientState::AwaitM2 { keypair, transcript }, m1))
}

fn receive_m2(
    context: &ClientContext,
    state: ClientState,
    message: &[u8],
) -> Result<(ClientState, Vec<u8>)> {
    let (keypair, mut transcript) = match state {
        ClientState::AwaitM2 { keypair, transcript } => (keypair, transcript),
        ClientState::Failed => return Err(Error::SessionFailed),
        _ => return Err(Error::InvalidState),
    };
    let provider = context.provider.as_ref();
    let now = (context.clock)();

    let m2 = Message2::decode(message)?;
    let first = provider.decapsulate(&m2.ciphertext, &keypair)?;
    let keys1 = provider.kdf1(&first)?;

    let bundle_bytes = provider.aead_open(&keys1.server_to_client, &m2.aead_ct, &[])?;
    let bundle = SignedPublicKeyBundle::decode(&bundle_bytes)?;
    let server_keys = verify_bundle(&bundle, context.validator.as_ref(), &context.hostname, now)?;
    transcript.append(message);

    let second = provider.encapsulate(&server_keys.keys)?;
    let keys2 = provider.kdf2(&first, &second)?;

    let inner = Message3Inner {
        ciphertext: second.ciphertext.clone(),
    }
    .encode()?;
    let aead_ct = provider.aead_seal(&keys1.client_to_server, &inner, &[])?;

    let confirmation = transcript.hash_with(provider, &aead_ct);
    let aead_ct_key_confirmation =
        provider.aead_seal(&keys2.client_to_server_confirm, &confirmation, &[])?;

    let m3 = Message3 {
        aead_ct,
        aead_ct_key_confirmation,
    }
    .encode()?;
    transcript.append(&m3);
    trace!(len = m3.len(), "Encoded M3");

    Ok((
        ClientState::AwaitM4 {
            keys: keys2,
            server_keys,
            transcript,
        },
        m3,
    ))
}

fn receive_m4(
    context: &ClientContext,
    state: ClientState,
    message: &[u8],
) -> Result<(ClientState, ())> {
    let (keys, server_keys, transcript) = match state {
        ClientState::AwaitM4 {
            keys,
            server_keys,
            transcript,
        } => (keys, server_keys, transcript),
        ClientState::Failed => return Err(Error::SessionFailed),
        _ => return Err(Error::InvalidState),
    };
    let provider = context.provider.as_ref();

    server_keys.check_validity((context.clock)())?;

    let m4 = Message4::decode(message)?;
    let server_hash =
        provider.aead_open(&keys.server_to_client_confirm, &m4.aead_ct_key_confirmation, &[])?;

    if !hashes_match(&server_hash, &transcript.hash(provider)) {
        return Err(Error::TranscriptMismatch);
    }

    Ok((ClientState::Established { keys }, ()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::InsecureTrustValidator;
    use vau_crypto::SeededCryptoProvider;

    fn handshake() -> ClientHandshake {
        ClientHandshake::new(
            Arc::new(SeededCryptoProvider::from_seed(1)),
            Arc::new(InsecureTrustValidator),
            "vau.example",
        )
    }

    #[test]
    fn test_start_emits_m1() {
        let mut client = handshake();
        assert_eq!(client.stage(), HandshakeStage::Init);

        let m1 = client.start().unwrap();
        assert_eq!(client.stage(), HandshakeStage::AwaitM2);
        assert!(Message1::decode(&m1).is_ok());
    }

    #[test]
    fn test_start_twice_fails() {
        let mut client = handshake();
        client.start().unwrap();
        assert!(matches!(client.start(), Err(Error::InvalidState)));
        assert_eq!(client.stage(), HandshakeStage::Failed);
        assert!(matches!(client.start(), Err(Error::SessionFailed)));
    }

    #[test]
    fn test_garbage_m2_fails() {
        let mut client = handshake();
        client.start().unwrap();
        assert!(client.receive_m2(b"not cbor").is_err());
        assert_eq!(client.stage(), HandshakeStage::Failed);
    }

    #[test]
    fn test_m4_before_m2_fails() {
        let mut client = handshake();
        client.start().unwrap();
        assert!(matches!(
            client.receive_m4(&[0xa0]),
            Err(Error::InvalidState)
        ));
    }

    #[test]
    fn test_into_channel_requires_established() {
        let mut client = handshake();
        client.start().unwrap();
        assert!(matches!(client.into_channel(), Err(Error::InvalidState)));
    }
}
