//! TLS trust configuration for backend clients
//!
//! The policy is a pure function of the endpoint scheme and whether trust
//! anchor bytes were supplied:
//!
//! | scheme  | trust anchor | policy                                  |
//! |---------|--------------|-----------------------------------------|
//! | `http`  | ignored      | [`TlsPolicy::Plain`]                    |
//! | `https` | absent       | [`TlsPolicy::InsecureSkipVerify`]       |
//! | `https` | present      | [`TlsPolicy::TrustAnchor`], TLS 1.2+    |
//!
//! Self-signed backends without a distributed CA are common in on-premise
//! deployments, so an `https` endpoint without a trust anchor is accepted
//! without certificate validation.

use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;
use aws_smithy_runtime_api::client::http::SharedHttpClient;
use cosi_common::{ProvisionerError, Result};
use http::Uri;
use rustls::client::{ServerCertVerified, ServerCertVerifier, WebPkiVerifier};
use rustls::{Certificate, ClientConfig, RootCertStore, ServerName};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// Protocol versions offered when validating against a trust anchor
static PINNED_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// Transport security chosen for one client
#[derive(Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Plain HTTP, no trust configuration
    Plain,
    /// TLS with server certificate validation disabled
    InsecureSkipVerify,
    /// TLS validated against the supplied PEM certificates only
    TrustAnchor(Vec<u8>),
}

/// Field-less view of a [`TlsPolicy`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TlsMode {
    Plain,
    InsecureSkipVerify,
    Verified,
}

impl TlsPolicy {
    /// Apply the decision table to an endpoint
    pub fn decide(endpoint: &Uri, trust_anchor: Option<&[u8]>) -> Result<Self> {
        match endpoint.scheme_str() {
            Some(scheme) if scheme.eq_ignore_ascii_case("http") => Ok(Self::Plain),
            Some(scheme) if scheme.eq_ignore_ascii_case("https") => Ok(match trust_anchor {
                Some(pem) if !pem.is_empty() => Self::TrustAnchor(pem.to_vec()),
                _ => Self::InsecureSkipVerify,
            }),
            Some(scheme) => Err(ProvisionerError::internal(format!(
                "unsupported endpoint scheme {scheme:?} in {endpoint}"
            ))),
            None => Err(ProvisionerError::internal(format!(
                "endpoint {endpoint} has no scheme"
            ))),
        }
    }

    #[must_use]
    pub(crate) const fn mode(&self) -> TlsMode {
        match self {
            Self::Plain => TlsMode::Plain,
            Self::InsecureSkipVerify => TlsMode::InsecureSkipVerify,
            Self::TrustAnchor(_) => TlsMode::Verified,
        }
    }

    /// Certificate verifier for TLS policies, `None` for plain transport
    pub fn server_verifier(&self) -> Result<Option<Arc<dyn ServerCertVerifier>>> {
        Ok(match self {
            Self::Plain => None,
            Self::InsecureSkipVerify => Some(Arc::new(AcceptAnyServerCert)),
            Self::TrustAnchor(pem) => Some(Arc::new(WebPkiVerifier::new(root_store(pem)?, None))),
        })
    }

    /// HTTP client carrying this policy.
    ///
    /// `None` means the SDK default client, which speaks plain HTTP to an
    /// `http` endpoint.
    pub fn http_client(&self) -> Result<Option<SharedHttpClient>> {
        let Some(verifier) = self.server_verifier()? else {
            return Ok(None);
        };

        let config = ClientConfig::builder()
            .with_safe_default_cipher_suites()
            .with_safe_default_kx_groups()
            .with_protocol_versions(PINNED_VERSIONS)
            .map_err(|e| ProvisionerError::internal(format!("invalid TLS configuration: {e}")))?
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(config)
            .https_only()
            .enable_http1()
            .build();

        Ok(Some(HyperClientBuilder::new().build(connector)))
    }
}

impl fmt::Debug for TlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for TlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::InsecureSkipVerify => f.write_str("tls-insecure"),
            Self::TrustAnchor(pem) => write!(f, "tls-verified({} bytes)", pem.len()),
        }
    }
}

/// Build a root store holding exactly the certificates in `pem`
pub fn root_store(pem: &[u8]) -> Result<RootCertStore> {
    let certs = rustls_pemfile::certs(&mut &pem[..]).map_err(|e| {
        ProvisionerError::internal(format!("failed to parse trust anchor PEM: {e}"))
    })?;

    let mut store = RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(&certs);
    if ignored > 0 {
        warn!(ignored, "skipped unusable certificates in trust anchor");
    }
    if added == 0 {
        return Err(ProvisionerError::internal(
            "trust anchor contains no usable certificate",
        ));
    }
    Ok(store)
}

/// Verifier that accepts any server certificate
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
