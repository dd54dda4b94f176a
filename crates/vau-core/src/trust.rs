//! Trust validation seam for the server key bundle.
//!
//! Certificate path building and OCSP checking are delegated to a
//! [`TrustValidator`] supplied by the caller. The core itself enforces the
//! bundle's validity window and, when the validator names the signer key,
//! verifies the ES256 signature over the public key record.

use crate::keys::{PublicVauKeys, SignedPublicKeyBundle};
use crate::{Error, Result};
use tracing::{debug, warn};

/// Input handed to a [`TrustValidator`].
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    /// Signer certificate chain, leaf first (DER).
    pub certificate_chain: &'a [Vec<u8>],
    /// OCSP response for the leaf certificate (DER).
    pub ocsp_response: &'a [u8],
    /// Host the client is connecting to.
    pub hostname: &'a str,
    /// Time of the check, epoch seconds.
    pub now: u64,
}

/// Outcome of a trust decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the chain is trusted.
    pub trusted: bool,
    /// Reason for a rejection.
    pub reason: Option<String>,
    /// SEC1 public key of the validated leaf certificate, if available.
    pub signer_key: Option<Vec<u8>>,
}

impl ValidationResult {
    /// A positive decision, optionally naming the leaf's public key.
    pub fn trusted(signer_key: Option<Vec<u8>>) -> Self {
        Self {
            trusted: true,
            reason: None,
            signer_key,
        }
    }

    /// A negative decision.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            trusted: false,
            reason: Some(reason.into()),
            signer_key: None,
        }
    }
}

/// Decides whether a certificate chain and OCSP response are trustworthy.
pub trait TrustValidator: Send + Sync {
    /// Validate the chain presented in a key bundle.
    fn validate(&self, request: &ValidationRequest<'_>) -> ValidationResult;
}

/// Accepts every chain without inspecting it.
///
/// Only for test and reference environments.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureTrustValidator;

impl TrustValidator for InsecureTrustValidator {
    fn validate(&self, request: &ValidationRequest<'_>) -> ValidationResult {
        warn!(
            hostname = request.hostname,
            "Accepting key bundle without certificate validation"
        );
        ValidationResult::trusted(None)
    }
}

/// Trusts any chain but pins the key that must have signed the bundle.
#[derive(Debug, Clone)]
pub struct PinnedSignerValidator {
    signer_key: Vec<u8>,
}

impl PinnedSignerValidator {
    /// Pin the SEC1 public key `signer_key`.
    pub fn new(signer_key: Vec<u8>) -> Self {
        Self { signer_key }
    }
}

impl TrustValidator for PinnedSignerValidator {
    fn validate(&self, _request: &ValidationRequest<'_>) -> ValidationResult {
        ValidationResult::trusted(Some(self.signer_key.clone()))
    }
}

/// Validate `bundle` and return its public key record.
pub(crate) fn verify_bundle(
    bundle: &SignedPublicKeyBundle,
    validator: &dyn TrustValidator,
    hostname: &str,
    now: u64,
) -> Result<PublicVauKeys> {
    let keys = bundle.public_keys()?;
    keys.check_validity(now)?;

    let result = validator.validate(&ValidationRequest {
        certificate_chain: &bundle.cert_chain,
        ocsp_response: &bundle.ocsp_response,
        hostname,
        now,
    });

    if !result.trusted {
        return Err(Error::Untrusted(
            result.reason.unwrap_or_else(|| "rejected by trust validator".into()),
        ));
    }

    if let Some(signer_key) = result.signer_key {
        vau_crypto::signature::verify_es256(
            &signer_key,
            &bundle.signed_pub_keys,
            &bundle.signature_es256,
        )
        .map_err(|e| Error::Untrusted(e.to_string()))?;
        debug!(cdv = bundle.cdv, "Key bundle signature verified");
    }

    Ok(keys)
}
