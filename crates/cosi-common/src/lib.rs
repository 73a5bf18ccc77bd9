//! COSI Common - Shared types and utilities
//!
//! This crate provides the error taxonomy, configuration and request
//! vocabulary shared by the S3 backend crate and the driver binary.

pub mod config;
pub mod error;
pub mod types;

pub use config::{DriverAddress, DriverConfig};
pub use error::{ProvisionerError, Result};
pub use types::*;
