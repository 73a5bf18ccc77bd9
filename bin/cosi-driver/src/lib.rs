//! COSI S3 Driver
//!
//! gRPC Identity and Provisioner services for the Container Object Storage
//! Interface sidecar, served on a local Unix socket.

pub mod identity;
pub mod logging;
pub mod provisioner;
pub mod server;

pub use identity::IdentityService;
pub use provisioner::ProvisionerService;
pub use server::DriverServer;
