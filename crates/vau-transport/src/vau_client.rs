//! Inner HTTP client that tunnels every request through an established VAU channel.

use crate::codec;
use crate::connection::TunnelClient;
use crate::exchange::{HttpClient, HttpRequest, HttpResponse};
use crate::{Error, Result};
use std::sync::Mutex;
use tracing::debug;

/// [`HttpClient`] over a [`TunnelClient`].
///
/// Calls are serialized; the channel's counters admit one exchange at a time.
pub struct VauHttpClient {
    tunnel: Mutex<TunnelClient>,
}

impl VauHttpClient {
    /// Wrap an established tunnel.
    pub fn new(tunnel: TunnelClient) -> Self {
        Self {
            tunnel: Mutex::new(tunnel),
        }
    }

    /// Whether the underlying tunnel has failed.
    pub fn is_failed(&self) -> bool {
        self.tunnel.lock().map(|t| t.is_failed()).unwrap_or(true)
    }
}

impl HttpClient for VauHttpClient {
    fn call(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        strip_framing_headers(&mut request);
        let encoded = codec::encode_request(&request)?;

        let plaintext = {
            let mut tunnel = self
                .tunnel
                .lock()
                .map_err(|_| Error::Protocol(vau_core::Error::SessionFailed))?;
            tunnel.call(&encoded)?
        };

        let response = codec::decode_response(&plaintext)?;
        debug!(
            method = %request.method,
            path = request.uri.path(),
            status = response.status,
            "Tunnelled request completed"
        );
        Ok(response)
    }
}

/// Drop `Content-Length` and `Transfer-Encoding: chunked`; the tunnel frames bodies itself.
fn strip_framing_headers(request: &mut HttpRequest) {
    request.headers.retain(|h| {
        let content_length = h.name.eq_ignore_ascii_case("Content-Length");
        let chunked = h.name.eq_ignore_ascii_case("Transfer-Encoding")
            && h.value.trim().eq_ignore_ascii_case("chunked");
        !(content_length || chunked)
    });
}
