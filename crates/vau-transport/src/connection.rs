//! Connection orchestration over the outer HTTP binding.
//!
//! ```text
//! client                               outer endpoint
//!   | POST {handshake_path}  M1  ------->  |
//!   | <-------  200, VAU-CID: /cid, M2     |
//!   | POST /cid              M3  ------->  |
//!   | <-------  200, M4                    |
//!   | POST /cid   frame(request) ------->  |
//!   | <-------  200, frame(response)       |
//! ```
//!
//! Every failure is final. A new tunnel needs a new [`Connector::connect`],
//! which starts over with fresh ephemeral keys.

use crate::config::{ClientConfig, USER_AGENT_HEADER};
use crate::exchange::{HttpClient, HttpRequest, HttpResponse};
use crate::{Error, Result};
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{Method, Uri};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use vau_core::{ClientHandshake, Clock, SecureChannel, TrustValidator};
use vau_crypto::CryptoProvider;
use zeroize::Zeroizing;

const CBOR_CONTENT_TYPE: &str = "application/cbor";
const FRAME_CONTENT_TYPE: &str = "application/octet-stream";

/// Opens tunnels to VAU endpoints.
pub struct Connector {
    outer: Arc<dyn HttpClient>,
    validator: Arc<dyn TrustValidator>,
    provider: Arc<dyn CryptoProvider>,
    config: ClientConfig,
    clock: Clock,
}

impl Connector {
    pub(crate) fn new(
        outer: Arc<dyn HttpClient>,
        validator: Arc<dyn TrustValidator>,
        provider: Arc<dyn CryptoProvider>,
        config: ClientConfig,
        clock: Clock,
    ) -> Self {
        Self {
            outer,
            validator,
            provider,
            config,
            clock,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run the handshake against the endpoint at `base` (scheme and authority).
    pub fn connect(&self, base: &Uri) -> Result<TunnelClient> {
        let (scheme, authority) = origin(base)?;
        let hostname = authority.host().to_owned();

        let mut handshake = ClientHandshake::new(
            self.provider.clone(),
            self.validator.clone(),
            hostname.as_str(),
        )
        .with_clock(self.clock);

        let handshake_uri = join(&scheme, &authority, &self.config.handshake_path)?;
        let m1 = handshake.start()?;
        let response = self.post(&handshake_uri, CBOR_CONTENT_TYPE, m1)?;

        let cid = response
            .header(&self.config.cid_header)
            .ok_or_else(|| {
                Error::InvalidConnectionId(format!(
                    "response has no '{}' header",
                    self.config.cid_header
                ))
            })?;
        validate_connection_id(cid, self.config.max_cid_len)?;
        let cid_uri = join(&scheme, &authority, cid)?;
        debug!(host = %hostname, cid, "Received connection id");

        let m3 = handshake.receive_m2(&response.body)?;
        let response = self.post(&cid_uri, CBOR_CONTENT_TYPE, m3)?;
        handshake.receive_m4(&response.body)?;

        let channel = handshake.into_channel()?;
        info!(host = %hostname, "Tunnel established");

        Ok(TunnelClient {
            outer: self.outer.clone(),
            channel,
            uri: cid_uri,
            user_agent: self.config.user_agent.clone(),
            inbox: VecDeque::new(),
            failed: false,
        })
    }

    fn post(&self, uri: &Uri, content_type: &str, body: Vec<u8>) -> Result<HttpResponse> {
        post(
            self.outer.as_ref(),
            &self.config.user_agent,
            uri,
            content_type,
            body,
        )
    }
}

/// An established tunnel bound to one connection identifier.
///
/// Frames travel as outer POST requests; each response body carries the
/// peer's frame for that exchange. Not safe for concurrent use; wrap in a
/// mutex (as [`crate::VauHttpClient`] does) to share.
pub struct TunnelClient {
    outer: Arc<dyn HttpClient>,
    channel: SecureChannel,
    uri: Uri,
    user_agent: String,
    inbox: VecDeque<Vec<u8>>,
    failed: bool,
}

impl TunnelClient {
    /// Connection-qualified URI frames are posted to.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Session key id shared with the server.
    pub fn key_id(&self) -> &[u8; 32] {
        self.channel.key_id()
    }

    /// Whether an earlier failure closed the tunnel.
    pub fn is_failed(&self) -> bool {
        self.failed || self.channel.is_failed()
    }

    /// Seal `plaintext` and post it. The response frame is queued for [`receive`](Self::receive).
    pub fn send(&mut self, plaintext: &[u8]) -> Result<()> {
        self.guard(|tunnel| {
            let frame = tunnel.channel.seal(plaintext)?;
            let response = post(
                tunnel.outer.as_ref(),
                &tunnel.user_agent,
                &tunnel.uri,
                FRAME_CONTENT_TYPE,
                frame,
            )?;
            tunnel.inbox.push_back(response.body);
            Ok(())
        })
    }

    /// Open the oldest queued response frame.
    pub fn receive(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        self.guard(|tunnel| {
            let frame = tunnel
                .inbox
                .pop_front()
                .ok_or(Error::Protocol(vau_core::Error::InvalidState))?;
            Ok(tunnel.channel.open(&frame)?)
        })
    }

    /// One round trip: [`send`](Self::send) then [`receive`](Self::receive).
    pub fn call(&mut self, plaintext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.send(plaintext)?;
        self.receive()
    }

    fn guard<T>(&mut self, operation: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.is_failed() {
            return Err(Error::Protocol(vau_core::Error::SessionFailed));
        }
        operation(self).map_err(|e| {
            warn!(error = %e, uri = %self.uri, "Tunnel failed");
            self.failed = true;
            e
        })
    }
}

/// Check a connection identifier received from the outer endpoint.
///
/// It must start with `/`, be at most `max_len` characters long and consist
/// of ASCII letters, digits, `-`, `_` and `/` only.
pub fn validate_connection_id(cid: &str, max_len: usize) -> Result<()> {
    if !cid.starts_with('/') {
        return Err(Error::InvalidConnectionId(format!(
            "'{cid}' does not start with '/'"
        )));
    }
    if cid.len() > max_len {
        return Err(Error::InvalidConnectionId(format!(
            "length {} exceeds {max_len}",
            cid.len()
        )));
    }
    if let Some(bad) = cid
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/')))
    {
        return Err(Error::InvalidConnectionId(format!(
            "illegal character {bad:?}"
        )));
    }
    Ok(())
}

fn post(
    outer: &dyn HttpClient,
    user_agent: &str,
    uri: &Uri,
    content_type: &str,
    body: Vec<u8>,
) -> Result<HttpResponse> {
    trace!(%uri, len = body.len(), "POST");
    let request = HttpRequest::new(Method::POST, uri.clone())
        .with_header("Content-Type", content_type)
        .with_header(USER_AGENT_HEADER, user_agent)
        .with_body(body);

    let response = outer.call(request)?;
    if response.status != 200 {
        return Err(Error::BadStatus {
            method: Method::POST.to_string(),
            uri: uri.to_string(),
            status: response.status,
        });
    }
    Ok(response)
}

fn origin(base: &Uri) -> Result<(Scheme, Authority)> {
    match (base.scheme(), base.authority()) {
        (Some(scheme), Some(authority)) => Ok((scheme.clone(), authority.clone())),
        _ => Err(Error::UnsupportedUri(format!(
            "'{base}' has no scheme or authority"
        ))),
    }
}

fn join(scheme: &Scheme, authority: &Authority, path: &str) -> Result<Uri> {
    let path = path
        .parse::<PathAndQuery>()
        .map_err(|e| Error::UnsupportedUri(format!("'{path}': {e}")))?;
    Uri::builder()
        .scheme(scheme.clone())
        .authority(authority.clone())
        .path_and_query(path)
        .build()
        .map_err(|e| Error::UnsupportedUri(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_connection_ids() {
        let longest = format!("/{}", "a".repeat(199));
        for cid in ["/", "/VAU/abc-123_XYZ", "/a/b/c", longest.as_str()] {
            assert!(validate_connection_id(cid, 200).is_ok(), "{cid}");
        }
    }

    #[test]
    fn test_invalid_connection_ids() {
        let too_long = format!("/{}", "a".repeat(200));
        for cid in [
            "",
            "abc",
            "/with space",
            "/dots.are.bad",
            "/query?x=1",
            "/ümlaut",
            too_long.as_str(),
        ] {
            assert!(
                matches!(
                    validate_connection_id(cid, 200),
                    Err(Error::InvalidConnectionId(_))
                ),
                "{cid}"
            );
        }
    }

    #[test]
    fn test_join() {
        let base = Uri::from_static("https://vau.example:8443/ignored");
        let (scheme, authority) = origin(&base).unwrap();
        let uri = join(&scheme, &authority, "/VAU/cid-1").unwrap();
        assert_eq!(uri.to_string(), "https://vau.example:8443/VAU/cid-1");
    }

    #[test]
    fn test_origin_requires_absolute_uri() {
        assert!(matches!(
            origin(&Uri::from_static("/VAU")),
            Err(Error::UnsupportedUri(_))
        ));
    }
}
