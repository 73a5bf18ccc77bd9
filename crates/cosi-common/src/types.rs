//! Request-parameter and secret-field vocabulary
//!
//! A `BucketClass` carries the secret reference in its parameters; the
//! sidecar copies those parameters verbatim into every `DriverCreateBucket`.

use crate::error::{ProvisionerError, Result};
use std::collections::HashMap;
use std::fmt;

/// Parameter key naming the backend credentials secret
pub const PARAM_SECRET_NAME: &str = "COSI_OBJECT_STORAGE_PROVIDER_SECRET_NAME";

/// Parameter key naming the namespace of the backend credentials secret
pub const PARAM_SECRET_NAMESPACE: &str = "COSI_OBJECT_STORAGE_PROVIDER_SECRET_NAMESPACE";

/// Secret data keys
pub mod secret_keys {
    pub const ACCESS_KEY_ID: &str = "COSI_S3_ACCESS_KEY_ID";
    pub const SECRET_ACCESS_KEY: &str = "COSI_S3_ACCESS_SECRET_KEY";
    pub const ENDPOINT: &str = "COSI_S3_ENDPOINT";
    pub const REGION: &str = "COSI_S3_REGION";
    /// PEM bundle the endpoint's certificate must chain to
    pub const TLS_CA_CERT: &str = "COSI_S3_TLS_CA_CERT";
}

/// Region used when the secret does not name one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Location of the secret holding backend credentials
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

impl SecretReference {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Extract the reference from `DriverCreateBucket` parameters.
    ///
    /// Both keys must be present and non-empty.
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Result<Self> {
        let name = required_parameter(parameters, PARAM_SECRET_NAME)?;
        let namespace = required_parameter(parameters, PARAM_SECRET_NAMESPACE)?;
        Ok(Self::new(name, namespace))
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

fn required_parameter<'a>(parameters: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    match parameters.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(ProvisionerError::invalid_argument(format!(
            "parameter {key} is empty"
        ))),
        None => Err(ProvisionerError::invalid_argument(format!(
            "missing parameter {key}"
        ))),
    }
}
