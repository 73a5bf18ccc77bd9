//! Backend credential resolution
//!
//! Credentials live in a Kubernetes Secret named by the request parameters.
//! They are fetched once per request and never cached.

use async_trait::async_trait;
use cosi_common::types::secret_keys;
use cosi_common::{DEFAULT_REGION, ProvisionerError, Result, SecretReference};
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

/// Raw secret contents keyed by data field
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Read access to the cluster's secret store
///
/// Implementations must be safe for concurrent use by in-flight requests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch a secret's data, `Ok(None)` when it does not exist
    async fn get(&self, reference: &SecretReference) -> Result<Option<SecretData>>;
}

/// Secret source backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretSource {
    client: kube::Client,
}

impl KubeSecretSource {
    /// Create a source from an already configured client
    #[must_use]
    pub const fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretSource for KubeSecretSource {
    async fn get(&self, reference: &SecretReference) -> Result<Option<SecretData>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &reference.namespace);
        let secret = secrets.get_opt(&reference.name).await.map_err(|e| {
            ProvisionerError::internal(format!("failed to get secret {reference}: {e}"))
        })?;
        Ok(secret.map(secret_data))
    }
}

/// Flatten `data` and `stringData`, binary data taking precedence
fn secret_data(secret: Secret) -> SecretData {
    let mut data: SecretData = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value.0))
        .collect();
    for (key, value) in secret.string_data.unwrap_or_default() {
        data.entry(key).or_insert_with(|| value.into_bytes());
    }
    data
}

/// Everything needed to talk to one backend
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
    pub region: String,
    /// PEM certificates the endpoint must chain to
    pub trust_anchor: Option<Vec<u8>>,
}

impl CredentialBundle {
    /// Build a bundle from secret data.
    ///
    /// Access key, secret key and endpoint are required; region falls back to
    /// [`DEFAULT_REGION`] and the trust anchor is optional.
    pub fn from_secret_data(reference: &SecretReference, data: &SecretData) -> Result<Self> {
        let field = |key: &str| -> Result<Option<String>> {
            data.get(key)
                .map(|raw| {
                    String::from_utf8(raw.clone()).map_err(|_| {
                        ProvisionerError::internal(format!(
                            "secret {reference} field {key} is not valid UTF-8"
                        ))
                    })
                })
                .transpose()
                .map(|value| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
        };
        let required = |key: &str| -> Result<String> {
            field(key)?.ok_or_else(|| {
                ProvisionerError::internal(format!("secret {reference} is missing field {key}"))
            })
        };

        Ok(Self {
            access_key_id: required(secret_keys::ACCESS_KEY_ID)?,
            secret_access_key: required(secret_keys::SECRET_ACCESS_KEY)?,
            endpoint: required(secret_keys::ENDPOINT)?,
            region: field(secret_keys::REGION)?.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            trust_anchor: data
                .get(secret_keys::TLS_CA_CERT)
                .filter(|pem| !pem.is_empty())
                .cloned(),
        })
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("trust_anchor", &self.trust_anchor.as_ref().map(Vec::len))
            .finish()
    }
}

/// Resolves secret references into credential bundles
#[derive(Clone)]
pub struct CredentialResolver {
    secrets: Arc<dyn SecretSource>,
    /// Used when the secret carries no trust anchor of its own
    default_trust_anchor: Option<Vec<u8>>,
}

impl CredentialResolver {
    pub fn new(secrets: Arc<dyn SecretSource>) -> Self {
        Self {
            secrets,
            default_trust_anchor: None,
        }
    }

    /// Set the process-wide fallback trust anchor
    #[must_use]
    pub fn with_default_trust_anchor(mut self, pem: Option<Vec<u8>>) -> Self {
        self.default_trust_anchor = pem.filter(|pem| !pem.is_empty());
        self
    }

    /// Fetch and parse the referenced secret. Single attempt, no retry.
    #[instrument(skip(self), fields(secret = %reference.name, namespace = %reference.namespace))]
    pub async fn resolve(&self, reference: &SecretReference) -> Result<CredentialBundle> {
        let data = self
            .secrets
            .get(reference)
            .await?
            .ok_or_else(|| ProvisionerError::internal(format!("secret {reference} not found")))?;

        let mut bundle = CredentialBundle::from_secret_data(reference, &data)?;
        if bundle.trust_anchor.is_none() {
            bundle.trust_anchor.clone_from(&self.default_trust_anchor);
        }

        debug!(endpoint = %bundle.endpoint, region = %bundle.region, "resolved backend credentials");
        Ok(bundle)
    }
}
