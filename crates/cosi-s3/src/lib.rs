//! COSI S3 - S3-compatible backend for the provisioner
//!
//! Credential resolution from Kubernetes secrets, client construction with
//! deterministic TLS trust, and create-bucket classification.

pub mod bucket;
pub mod classify;
pub mod client;
pub mod credentials;
pub mod tls;

pub use bucket::create_bucket;
pub use classify::{BackendError, Outcome, classify};
pub use client::{BackendSession, BucketClient, ClientFactory, S3BucketClient, S3ClientFactory};
pub use credentials::{CredentialBundle, CredentialResolver, KubeSecretSource, SecretSource};
pub use tls::TlsPolicy;
