//! COSI Protocol - gRPC service definitions
//!
//! This crate contains the protobuf-generated code for the Container Object
//! Storage Interface `Identity` and `Provisioner` services.

/// Identity and Provisioner services (`cosi.v1alpha1`)
pub mod cosi {
    tonic::include_proto!("cosi.v1alpha1");
}
