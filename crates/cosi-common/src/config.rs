//! Driver configuration
//!
//! Values arrive already parsed from flags or environment; this module only
//! holds them and validates the listen address.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default sidecar-facing socket
pub const DEFAULT_DRIVER_ADDRESS: &str = "unix:///var/lib/cosi/cosi.sock";

/// Default provisioner name reported by `DriverGetInfo`
pub const DEFAULT_DRIVER_NAME: &str = "cosi.s3.objectstorage.k8s.io";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Root configuration for the driver process
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Name returned to the sidecar
    pub driver_name: String,
    /// Listen address, `unix://` only
    pub address: DriverAddress,
    /// Base log filter
    pub log_level: String,
    /// Enable backend request logging
    pub debug: bool,
    /// PEM file used as trust anchor when a secret carries none
    pub ca_cert_path: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver_name: DEFAULT_DRIVER_NAME.to_string(),
            address: DriverAddress::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            debug: false,
            ca_cert_path: None,
        }
    }
}

/// Address validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("unsupported scheme {0:?}: only unix sockets are accepted")]
    UnsupportedScheme(String),

    #[error("address {0:?} has no scheme")]
    MissingScheme(String),

    #[error("address {0:?} has no socket path")]
    MissingPath(String),
}

/// Filesystem-addressable listen address
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverAddress {
    path: PathBuf,
}

impl DriverAddress {
    /// Socket file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for DriverAddress {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/cosi/cosi.sock"),
        }
    }
}

impl FromStr for DriverAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| AddressError::MissingScheme(s.to_string()))?;
        if !scheme.eq_ignore_ascii_case("unix") {
            return Err(AddressError::UnsupportedScheme(scheme.to_string()));
        }

        // unix:///abs/path, unix://rel/path and unix:/abs/path are all seen in
        // the wild; the authority form is not meaningful for sockets.
        let path = rest.strip_prefix("//").unwrap_or(rest);
        if path.is_empty() {
            return Err(AddressError::MissingPath(s.to_string()));
        }
        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

impl fmt::Display for DriverAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unix://{}", self.path.display())
    }
}
