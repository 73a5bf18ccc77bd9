//! Unix-socket gRPC server bootstrap

use crate::identity::IdentityService;
use crate::provisioner::ProvisionerService;
use anyhow::{Context, Result};
use cosi_common::DriverAddress;
use cosi_proto::cosi::identity_server::IdentityServer;
use cosi_proto::cosi::provisioner_server::ProvisionerServer;
use std::future::Future;
use std::path::Path;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tracing::{info, warn};

/// Driver bound to its socket, ready to serve
#[derive(Debug)]
pub struct DriverServer {
    address: DriverAddress,
    listener: UnixListener,
}

impl DriverServer {
    /// Bind the socket, replacing a stale socket file left by a previous run
    pub fn bind(address: DriverAddress) -> Result<Self> {
        let path = address.path();
        prepare_socket_path(path)?;

        let listener = UnixListener::bind(path)
            .with_context(|| format!("failed to bind {address}"))?;
        Ok(Self { address, listener })
    }

    #[must_use]
    pub const fn address(&self) -> &DriverAddress {
        &self.address
    }

    /// Serve both services until `signal` resolves, then remove the socket
    pub async fn serve_with_shutdown<F>(
        self,
        identity: IdentityService,
        provisioner: ProvisionerService,
        signal: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!(address = %self.address, "Starting gRPC server");

        let served = Server::builder()
            .add_service(IdentityServer::new(identity))
            .add_service(ProvisionerServer::new(provisioner))
            .serve_with_incoming_shutdown(UnixListenerStream::new(self.listener), signal)
            .await;

        if let Err(e) = std::fs::remove_file(self.address.path()) {
            warn!(error = %e, "failed to remove socket file");
        }
        served.context("gRPC server failed")
    }
}

fn prepare_socket_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed stale socket");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn address(path: &Path) -> DriverAddress {
        format!("unix://{}", path.display()).parse().unwrap()
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cosi.sock");
        std::fs::write(&path, b"stale").unwrap();

        let server = DriverServer::bind(address(&path)).unwrap();
        assert_eq!(server.address().path(), path);
        assert!(!std::fs::metadata(&path).unwrap().is_file());
    }

    #[tokio::test]
    async fn test_bind_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/run/cosi.sock");

        DriverServer::bind(address(&path)).unwrap();
        assert!(path.exists());
    }
}
