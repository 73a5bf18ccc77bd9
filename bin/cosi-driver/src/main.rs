//! COSI S3 Driver
//!
//! This binary serves the COSI Identity and Provisioner services on a Unix
//! socket shared with the objectstorage-provisioner sidecar.

use anyhow::{Context, Result};
use clap::Parser;
use cosi_common::config::{DEFAULT_DRIVER_ADDRESS, DEFAULT_DRIVER_NAME, DEFAULT_LOG_LEVEL};
use cosi_common::{DriverAddress, DriverConfig};
use cosi_driver::{DriverServer, IdentityService, ProvisionerService, logging};
use cosi_s3::{CredentialResolver, KubeSecretSource, S3ClientFactory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cosi-driver")]
#[command(about = "COSI driver provisioning buckets on S3-compatible storage")]
#[command(version)]
struct Args {
    /// Listen address; only unix:// sockets are accepted
    #[arg(long, env = "COSI_ENDPOINT", default_value = DEFAULT_DRIVER_ADDRESS)]
    driver_address: DriverAddress,

    /// Provisioner name reported to the sidecar
    #[arg(long, env = "DRIVER_NAME", default_value = DEFAULT_DRIVER_NAME)]
    driver_name: String,

    /// PEM trust anchor for backends whose secret carries none
    #[arg(long, env = "COSI_S3_CA_CERT")]
    s3_ca_cert: Option<PathBuf>,

    /// Log backend requests
    #[arg(long, env = "COSI_DEBUG", default_value_t = false)]
    debug: bool,

    /// Log level
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

impl From<Args> for DriverConfig {
    fn from(args: Args) -> Self {
        Self {
            driver_name: args.driver_name,
            address: args.driver_address,
            log_level: args.log_level,
            debug: args.debug,
            ca_cert_path: args.s3_ca_cert,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = DriverConfig::from(Args::parse());

    // Initialize logging
    logging::init(&config.log_level, config.debug);

    info!("Starting COSI S3 driver");
    info!("Driver name: {}", config.driver_name);
    if config.driver_name.is_empty() {
        warn!("Driver name is empty; DriverGetInfo will be rejected");
    }

    let trust_anchor = match &config.ca_cert_path {
        Some(path) => {
            let pem = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read CA certificate {}", path.display()))?;
            cosi_s3::tls::root_store(&pem)
                .with_context(|| format!("invalid CA certificate {}", path.display()))?;
            info!("Default trust anchor: {}", path.display());
            Some(pem)
        }
        None => None,
    };

    let kube_client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    let resolver = CredentialResolver::new(Arc::new(KubeSecretSource::new(kube_client)))
        .with_default_trust_anchor(trust_anchor);

    let identity = IdentityService::new(config.driver_name.clone());
    let provisioner = ProvisionerService::new(Arc::new(S3ClientFactory::new(resolver)));

    DriverServer::bind(config.address)?
        .serve_with_shutdown(identity, provisioner, shutdown_signal())
        .await?;

    info!("COSI driver shut down gracefully");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_args_into_config() {
        let args = Args::try_parse_from([
            "cosi-driver",
            "--driver-address",
            "unix:///tmp/cosi/driver.sock",
            "--driver-name",
            "s3.example.com",
            "--s3-ca-cert",
            "/etc/cosi/ca.pem",
            "--debug",
            "--log-level",
            "warn",
        ])
        .unwrap();
        let config = DriverConfig::from(args);

        assert_eq!(config.address.path(), Path::new("/tmp/cosi/driver.sock"));
        assert_eq!(config.driver_name, "s3.example.com");
        assert_eq!(config.ca_cert_path.as_deref(), Some(Path::new("/etc/cosi/ca.pem")));
        assert_eq!(config.log_level, "warn");
        assert!(config.debug);
    }

    #[test]
    fn test_args_reject_network_address() {
        let err = Args::try_parse_from(["cosi-driver", "--driver-address", "tcp://0.0.0.0:9000"])
            .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }
}
