//! Client configuration and the [`ConnectorBuilder`].

use crate::connection::Connector;
use crate::exchange::HttpClient;
use crate::{Error, Result};
use std::sync::Arc;
use vau_core::handshake::system_clock;
use vau_core::{Clock, TrustValidator};
use vau_crypto::{CryptoProvider, OsCryptoProvider};

/// Well-known path receiving M1.
pub const DEFAULT_HANDSHAKE_PATH: &str = "/VAU";
/// Response header carrying the connection identifier.
pub const DEFAULT_CID_HEADER: &str = "VAU-CID";
/// Longest accepted connection identifier.
pub const DEFAULT_MAX_CID_LEN: usize = 200;
/// Header carrying the user agent on outer requests.
pub const USER_AGENT_HEADER: &str = "X-Useragent";

/// Tunnel client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Value of the `X-Useragent` header on every outer request.
    pub user_agent: String,
    /// Path receiving M1.
    pub handshake_path: String,
    /// Name of the connection identifier header (matched ignoring case).
    pub cid_header: String,
    /// Maximum connection identifier length in characters.
    pub max_cid_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("vau-rs/", env!("CARGO_PKG_VERSION")).to_owned(),
            handshake_path: DEFAULT_HANDSHAKE_PATH.to_owned(),
            cid_header: DEFAULT_CID_HEADER.to_owned(),
            max_cid_len: DEFAULT_MAX_CID_LEN,
        }
    }
}

/// Assembles a [`Connector`] from its collaborators.
///
/// The outer client and the trust validator are required. The crypto
/// provider defaults to [`OsCryptoProvider`] and the clock to system time.
#[derive(Default)]
pub struct ConnectorBuilder {
    outer: Option<Arc<dyn HttpClient>>,
    validator: Option<Arc<dyn TrustValidator>>,
    provider: Option<Arc<dyn CryptoProvider>>,
    config: ClientConfig,
    clock: Option<Clock>,
}

impl ConnectorBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Outer HTTP transport.
    pub fn outer_client(mut self, outer: Arc<dyn HttpClient>) -> Self {
        self.outer = Some(outer);
        self
    }

    /// Validator for the server's certificate chain.
    pub fn trust_validator(mut self, validator: Arc<dyn TrustValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Source of randomness and primitives.
    pub fn crypto_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the user agent only.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Clock for key bundle expiry checks.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the connector.
    pub fn build(self) -> Result<Connector> {
        let outer = self
            .outer
            .ok_or_else(|| Error::Config("outer HTTP client is required".into()))?;
        let validator = self
            .validator
            .ok_or_else(|| Error::Config("trust validator is required".into()))?;

        if !self.config.handshake_path.starts_with('/') {
            return Err(Error::Config(format!(
                "handshake path must start with '/': '{}'",
                self.config.handshake_path
            )));
        }
        if self.config.cid_header.is_empty() {
            return Err(Error::Config("connection id header name is empty".into()));
        }

        Ok(Connector::new(
            outer,
            validator,
            self.provider.unwrap_or_else(|| Arc::new(OsCryptoProvider)),
            self.config,
            self.clock.unwrap_or(system_clock),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{HttpRequest, HttpResponse};
    use vau_core::InsecureTrustValidator;

    struct Unreachable;

    impl HttpClient for Unreachable {
        fn call(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Err(Error::Io("unreachable".into()))
        }
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.handshake_path, "/VAU");
        assert_eq!(config.cid_header, "VAU-CID");
        assert_eq!(config.max_cid_len, 200);
        assert!(config.user_agent.starts_with("vau-rs/"));
    }

    #[test]
    fn test_missing_collaborators() {
        let err = ConnectorBuilder::new()
            .trust_validator(Arc::new(InsecureTrustValidator))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        let err = ConnectorBuilder::new()
            .outer_client(Arc::new(Unreachable))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_relative_handshake_path() {
        let config = ClientConfig {
            handshake_path: "VAU".into(),
            ..ClientConfig::default()
        };
        let result = ConnectorBuilder::new()
            .outer_client(Arc::new(Unreachable))
            .trust_validator(Arc::new(InsecureTrustValidator))
            .config(config)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build() {
        let connector = ConnectorBuilder::new()
            .outer_client(Arc::new(Unreachable))
            .trust_validator(Arc::new(InsecureTrustValidator))
            .user_agent("ACME0001/1.0")
            .build()
            .unwrap();
        assert_eq!(connector.config().user_agent, "ACME0001/1.0");
    }
}
