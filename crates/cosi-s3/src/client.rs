//! Backend client construction
//!
//! One canonical policy: static credentials, region fallback, the TLS
//! decision table from [`crate::tls`], path-style addressing, a fixed
//! per-operation timeout and no SDK-level retries. Clients are built per
//! request and never pooled.

use crate::classify::BackendError;
use crate::credentials::{CredentialBundle, CredentialResolver};
use crate::tls::{TlsMode, TlsPolicy};
use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use cosi_common::{DEFAULT_REGION, ProvisionerError, Result, SecretReference};
use http::Uri;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

/// Hard ceiling for every backend call, not a retry budget
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Provider name attached to the static credentials
const CREDENTIALS_PROVIDER: &str = "cosi-secret";

/// Bucket operations needed by the provisioner
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BucketClient: Send + Sync {
    /// Issue exactly one create-bucket call
    async fn create_bucket(&self, name: &str) -> std::result::Result<(), BackendError>;
}

/// S3 client bound to one credential bundle
#[derive(Debug)]
pub struct S3BucketClient {
    client: aws_sdk_s3::Client,
    region: String,
    tls: TlsMode,
}

impl S3BucketClient {
    /// Build a client for `bundle`
    pub fn build(bundle: &CredentialBundle) -> Result<Self> {
        let endpoint: Uri = bundle.endpoint.parse().map_err(|e| {
            ProvisionerError::internal(format!("invalid endpoint {:?}: {e}", bundle.endpoint))
        })?;
        if endpoint.host().is_none() {
            return Err(ProvisionerError::internal(format!(
                "endpoint {:?} has no host",
                bundle.endpoint
            )));
        }

        let policy = TlsPolicy::decide(&endpoint, bundle.trust_anchor.as_deref())?;
        let region = if bundle.region.is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            bundle.region.clone()
        };

        let mut config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(Credentials::new(
                &bundle.access_key_id,
                &bundle.secret_access_key,
                None,
                None,
                CREDENTIALS_PROVIDER,
            ))
            .endpoint_url(bundle.endpoint.as_str())
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(REQUEST_TIMEOUT)
                    .build(),
            );
        if let Some(http_client) = policy.http_client()? {
            config = config.http_client(http_client);
        }

        debug!(endpoint = %endpoint, region = %region, tls = %policy, "built S3 client");
        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config.build()),
            region,
            tls: policy.mode(),
        })
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub(crate) const fn tls_mode(&self) -> TlsMode {
        self.tls
    }
}

/// Location constraint for a region; `us-east-1` must not send one
fn location_constraint(region: &str) -> Option<CreateBucketConfiguration> {
    (region != DEFAULT_REGION).then(|| {
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build()
    })
}

#[async_trait]
impl BucketClient for S3BucketClient {
    async fn create_bucket(&self, name: &str) -> std::result::Result<(), BackendError> {
        debug!(
            bucket = name,
            region = %self.region,
            tls = ?self.tls_mode(),
            "sending create bucket"
        );
        self.client
            .create_bucket()
            .bucket(name)
            .set_create_bucket_configuration(location_constraint(&self.region))
            .send()
            .await
            .map(|_| ())
            .map_err(BackendError::from)
    }
}

/// A ready-to-use backend for one request
pub struct BackendSession {
    /// Region the bucket is created in, reported back to the caller
    pub region: String,
    pub client: Box<dyn BucketClient>,
}

impl std::fmt::Debug for BackendSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSession")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Turns request parameters into a connected backend.
///
/// The provisioner receives this at construction time; tests inject fakes
/// instead of reaching the cluster or a real backend.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, parameters: &HashMap<String, String>) -> Result<BackendSession>;
}

/// Production factory: secret lookup followed by S3 client construction
#[derive(Clone)]
pub struct S3ClientFactory {
    resolver: CredentialResolver,
}

impl S3ClientFactory {
    #[must_use]
    pub const fn new(resolver: CredentialResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ClientFactory for S3ClientFactory {
    #[instrument(skip_all)]
    async fn connect(&self, parameters: &HashMap<String, String>) -> Result<BackendSession> {
        let reference = SecretReference::from_parameters(parameters)?;
        let bundle = self.resolver.resolve(&reference).await?;
        let client = S3BucketClient::build(&bundle)?;
        Ok(BackendSession {
            region: client.region().to_string(),
            client: Box::new(client),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Outcome, classify};
    use crate::credentials::{MockSecretSource, SecretData};
    use cosi_common::types::secret_keys;
    use cosi_common::{PARAM_SECRET_NAME, PARAM_SECRET_NAMESPACE};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const CA: &[u8] = include_bytes!("../tests/fixtures/ca.pem");

    fn bundle(endpoint: &str, trust_anchor: Option<&[u8]>) -> CredentialBundle {
        CredentialBundle {
            access_key_id: "access-key".into(),
            secret_access_key: "secret-key".into(),
            endpoint: endpoint.into(),
            region: "us-west-1".into(),
            trust_anchor: trust_anchor.map(<[u8]>::to_vec),
        }
    }

    /// Listener on loopback plus an endpoint that names it by host name
    async fn local_backend() -> (TcpListener, CredentialBundle) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // us-east-1 sends no request body; a host name keeps the SDK from
        // choosing path style on its own as it does for IP endpoints.
        let mut backend = bundle(&format!("http://localhost:{port}"), None);
        backend.region = DEFAULT_REGION.to_string();
        (listener, backend)
    }

    async fn read_head(stream: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&head).into_owned()
    }

    fn parameters() -> HashMap<String, String> {
        HashMap::from([
            (PARAM_SECRET_NAME.to_string(), "test-secret".to_string()),
            (PARAM_SECRET_NAMESPACE.to_string(), "test-namespace".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_build_plain_client() {
        let client = S3BucketClient::build(&bundle("http://localhost:9000", Some(CA))).unwrap();
        assert_eq!(client.tls_mode(), TlsMode::Plain);
        assert_eq!(client.region(), "us-west-1");
    }

    #[tokio::test]
    async fn test_build_tls_without_trust_anchor_skips_validation() {
        let client = S3BucketClient::build(&bundle("https://s3.local", None)).unwrap();
        assert_eq!(client.tls_mode(), TlsMode::InsecureSkipVerify);
    }

    #[tokio::test]
    async fn test_build_tls_with_trust_anchor_validates() {
        let client = S3BucketClient::build(&bundle("https://s3.local", Some(CA))).unwrap();
        assert_eq!(client.tls_mode(), TlsMode::Verified);
    }

    #[tokio::test]
    async fn test_build_region_fallback() {
        let mut b = bundle("http://localhost:9000", None);
        b.region.clear();
        let client = S3BucketClient::build(&b).unwrap();
        assert_eq!(client.region(), DEFAULT_REGION);
    }

    #[tokio::test]
    async fn test_build_failures_are_internal() {
        for endpoint in ["not a url", "ftp://s3.local", "/just/a/path"] {
            let err = S3BucketClient::build(&bundle(endpoint, None)).unwrap_err();
            assert!(matches!(err, ProvisionerError::Internal(_)), "{endpoint}");
        }

        let err = S3BucketClient::build(&bundle("https://s3.local", Some(b"junk"))).unwrap_err();
        assert!(matches!(err, ProvisionerError::Internal(_)));
    }

    #[tokio::test]
    async fn test_create_bucket_uses_path_style() {
        let (listener, backend) = local_backend().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let head = read_head(&mut stream).await;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            head
        });

        let client = S3BucketClient::build(&backend).unwrap();
        let result = client.create_bucket("test-bucket").await;
        let head = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();

        assert!(head.starts_with("PUT /test-bucket/ HTTP/1.1"), "{head}");
        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test]
    async fn test_create_bucket_is_bounded_by_request_timeout() {
        let (listener, backend) = local_backend().await;
        tokio::spawn(async move {
            // Accept and hold the connection without ever answering.
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let client = S3BucketClient::build(&backend).unwrap();
        let started = Instant::now();
        let err = client.create_bucket("test-bucket").await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.message.contains("timed out"), "{}", err.message);
        assert!(elapsed >= REQUEST_TIMEOUT - Duration::from_secs(1), "{elapsed:?}");
        assert!(elapsed < REQUEST_TIMEOUT + Duration::from_secs(5), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_create_bucket_makes_a_single_attempt() {
        let (listener, backend) = local_backend().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                seen.fetch_add(1, Ordering::SeqCst);
                read_head(&mut stream).await;
                stream
                    .write_all(
                        b"HTTP/1.1 500 Internal Server Error\r\n\
                          Content-Length: 0\r\nConnection: close\r\n\r\n",
                    )
                    .await
                    .unwrap();
            }
        });

        let client = S3BucketClient::build(&backend).unwrap();
        let err = client.create_bucket("test-bucket").await.unwrap_err();

        assert_eq!(classify(&Err(err)), Outcome::Internal);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_location_constraint() {
        assert!(location_constraint(DEFAULT_REGION).is_none());
        let config = location_constraint("eu-west-3").unwrap();
        assert_eq!(
            config.location_constraint(),
            Some(&BucketLocationConstraint::from("eu-west-3"))
        );
    }

    #[tokio::test]
    async fn test_factory_connects_from_parameters() {
        let mut source = MockSecretSource::new();
        source.expect_get().times(1).returning(|_| {
            let data: SecretData = [
                (secret_keys::ACCESS_KEY_ID, "access-key"),
                (secret_keys::SECRET_ACCESS_KEY, "secret-key"),
                (secret_keys::ENDPOINT, "http://localhost"),
                (secret_keys::REGION, "us-west-1"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
            Ok(Some(data))
        });

        let factory = S3ClientFactory::new(CredentialResolver::new(Arc::new(source)));
        let session = factory.connect(&parameters()).await.unwrap();
        assert_eq!(session.region, "us-west-1");
    }

    #[tokio::test]
    async fn test_factory_rejects_missing_reference_without_lookup() {
        let mut source = MockSecretSource::new();
        source.expect_get().never();

        let factory = S3ClientFactory::new(CredentialResolver::new(Arc::new(source)));
        let err = factory.connect(&HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ProvisionerError::InvalidArgument(_)));
    }
}
