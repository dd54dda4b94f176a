//! Integration test helpers for the outer HTTP binding.
//!
//! Provides:
//! - A provisioned server identity with a signed key bundle
//! - `MemoryEndpoint`: an in-process VAU endpoint behind the `HttpClient` seam
//! - Connector setup with a fixed clock

#![allow(dead_code)]

use http::{Method, Uri};
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use vau_core::keys::{PublicVauKeys, ServerIdentity, SignedPublicKeyBundle};
use vau_core::trust::{PinnedSignerValidator, TrustValidator};
use vau_core::{SecureChannel, ServerHandshake};
use vau_crypto::signature::Es256KeyPair;
use vau_crypto::{HybridKeyPair, OsCryptoProvider};
use vau_transport::codec::{decode_request, encode_response};
use vau_transport::{
    Connector, ConnectorBuilder, HttpClient, HttpRequest, HttpResponse, Result, TunnelClient,
};

/// Bundle issue time used by every fixture.
pub const ISSUED_AT: u64 = 1_700_000_000;
/// Bundle expiry used by every fixture (one day later).
pub const EXPIRES_AT: u64 = ISSUED_AT + 86_400;
/// Endpoint origin used by every test.
pub const BASE_URI: &str = "https://vau.example";

/// A clock inside the bundle's validity window.
pub fn clock_valid() -> u64 {
    ISSUED_AT + 3_600
}

/// A clock past the bundle's expiry.
pub fn clock_expired() -> u64 {
    EXPIRES_AT + 1
}

/// Install a test subscriber so `RUST_LOG` shows library logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How the endpoint answers M1 with respect to the connection id header.
#[derive(Debug, Clone)]
pub enum CidMode {
    /// Issue `/VAU/session-{n}` under `VAU-CID`.
    Issue,
    /// Issue a fresh id under a lowercase `vau-cid` header.
    IssueLowercase,
    /// Omit the header.
    Missing,
    /// Always send this value.
    Fixed(String),
}

/// Inner application served through the tunnel.
pub type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

enum Session {
    Handshake(ServerHandshake),
    Open(SecureChannel),
}

/// In-process VAU endpoint.
pub struct MemoryEndpoint {
    identity: Arc<ServerIdentity>,
    signer: Es256KeyPair,
    sessions: Mutex<HashMap<String, Session>>,
    next_id: AtomicU64,
    cid_mode: CidMode,
    handler: Handler,
    status_override: Mutex<Option<u16>>,
    /// Every outer request received, in order.
    pub outer_requests: Mutex<Vec<HttpRequest>>,
    /// Every decrypted inner request, in order.
    pub inner_requests: Mutex<Vec<HttpRequest>>,
}

impl MemoryEndpoint {
    /// Endpoint answering inner requests with [`echo`].
    pub fn new() -> Self {
        let keypair = HybridKeyPair::generate_with_rng(&mut OsRng).expect("server keys");
        let signer = Es256KeyPair::generate_with_rng(&mut OsRng);
        let keys = PublicVauKeys {
            keys: keypair.public_key(),
            issued_at: ISSUED_AT,
            expires_at: EXPIRES_AT,
            comment: "transport test".into(),
        };
        let bundle = SignedPublicKeyBundle::sign(&keys, &signer, vec![vec![0x30]], vec![0x30], 1)
            .expect("bundle");

        Self {
            identity: Arc::new(ServerIdentity::new(keypair, bundle).expect("identity")),
            signer,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            cid_mode: CidMode::Issue,
            handler: Box::new(echo),
            status_override: Mutex::new(None),
            outer_requests: Mutex::new(Vec::new()),
            inner_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cid_mode(mut self, mode: CidMode) -> Self {
        self.cid_mode = mode;
        self
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = handler;
        self
    }

    /// Answer every following request with `status` and an empty body.
    pub fn fail_with(&self, status: u16) {
        *self.status_override.lock().unwrap() = Some(status);
    }

    /// Validator pinned to this endpoint's bundle signer.
    pub fn validator(&self) -> Arc<dyn TrustValidator> {
        Arc::new(PinnedSignerValidator::new(self.signer.public_key().to_vec()))
    }

    pub fn outer_request_count(&self) -> usize {
        self.outer_requests.lock().unwrap().len()
    }

    fn handshake(&self, body: &[u8]) -> HttpResponse {
        let mut handshake = ServerHandshake::new(self.identity.clone(), Arc::new(OsCryptoProvider))
            .with_clock(clock_valid);
        let m2 = match handshake.receive_message(body) {
            Ok(m2) => m2,
            Err(_) => return HttpResponse::new(400, Vec::new()),
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let issued = format!("/VAU/session-{id}");
        let (header, cid) = match &self.cid_mode {
            CidMode::Issue => (Some("VAU-CID"), issued),
            CidMode::IssueLowercase => (Some("vau-cid"), issued),
            CidMode::Missing => (None, issued),
            CidMode::Fixed(value) => (Some("VAU-CID"), value.clone()),
        };

        self.sessions
            .lock()
            .unwrap()
            .insert(cid.clone(), Session::Handshake(handshake));

        let response = HttpResponse::new(200, m2);
        match header {
            Some(name) => response.with_header(name, cid),
            None => response,
        }
    }

    fn session(&self, path: &str, body: &[u8]) -> HttpResponse {
        let mut sessions = self.sessions.lock().unwrap();
        let Some(session) = sessions.remove(path) else {
            return HttpResponse::new(404, Vec::new());
        };

        match session {
            Session::Handshake(mut handshake) => {
                let Ok(m4) = handshake.receive_message(body) else {
                    return HttpResponse::new(403, Vec::new());
                };
                let channel = handshake.into_channel().expect("established");
                sessions.insert(path.to_owned(), Session::Open(channel));
                HttpResponse::new(200, m4)
            }
            Session::Open(mut channel) => {
                let Ok(plaintext) = channel.open(body) else {
                    return HttpResponse::new(403, Vec::new());
                };
                let inner = decode_request(&plaintext).expect("inner request");
                let response = (self.handler)(&inner);
                self.inner_requests.lock().unwrap().push(inner);

                let encoded = encode_response(&response).expect("inner response");
                let frame = channel.seal(&encoded).expect("seal");
                sessions.insert(path.to_owned(), Session::Open(channel));
                HttpResponse::new(200, frame)
            }
        }
    }
}

impl HttpClient for MemoryEndpoint {
    fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.outer_requests.lock().unwrap().push(request.clone());

        if let Some(status) = *self.status_override.lock().unwrap() {
            return Ok(HttpResponse::new(status, Vec::new()));
        }
        if request.method != Method::POST {
            return Ok(HttpResponse::new(405, Vec::new()));
        }

        Ok(match request.uri.path() {
            "/VAU" => self.handshake(&request.body),
            path => self.session(path, &request.body),
        })
    }
}

/// Inner handler reflecting the request: status 200, `X-Method` and `X-Path`
/// headers, and the request body.
pub fn echo(request: &HttpRequest) -> HttpResponse {
    HttpResponse::new(200, request.body.clone())
        .with_header("X-Method", request.method.as_str())
        .with_header("X-Path", request.uri.path())
        .with_header("Content-Type", "application/octet-stream")
}

/// Connector to `endpoint` with a valid clock and a pinned validator.
pub fn connector(endpoint: &Arc<MemoryEndpoint>) -> Connector {
    ConnectorBuilder::new()
        .outer_client(endpoint.clone())
        .trust_validator(endpoint.validator())
        .clock(clock_valid)
        .user_agent("TEST1234567890AB/2.1.12-45")
        .build()
        .expect("connector")
}

/// Connect to `endpoint` at [`BASE_URI`].
pub fn connect(endpoint: &Arc<MemoryEndpoint>) -> TunnelClient {
    connector(endpoint)
        .connect(&Uri::from_static(BASE_URI))
        .expect("tunnel")
}
