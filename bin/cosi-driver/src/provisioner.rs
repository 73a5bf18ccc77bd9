//! Provisioner gRPC service implementation
//!
//! Each `DriverCreateBucket` runs a linear pipeline: validate the request,
//! connect to the backend through the injected [`ClientFactory`] (secret
//! lookup then client construction), create the bucket once, respond. No
//! state survives the request. Failures are classified where they occur and
//! converted to a gRPC status at the end.

use cosi_common::ProvisionerError;
use cosi_proto::cosi::{
    DriverCreateBucketRequest, DriverCreateBucketResponse, DriverDeleteBucketRequest,
    DriverDeleteBucketResponse, DriverGrantBucketAccessRequest, DriverGrantBucketAccessResponse,
    DriverRevokeBucketAccessRequest, DriverRevokeBucketAccessResponse, Protocol, S3,
    S3SignatureVersion, protocol, provisioner_server::Provisioner,
};
use cosi_s3::ClientFactory;
use std::collections::HashMap;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{info, instrument};

/// Bucket lifecycle service
#[derive(Clone)]
pub struct ProvisionerService {
    factory: Arc<dyn ClientFactory>,
}

impl ProvisionerService {
    /// Create the service around the factory used to reach backends
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory }
    }

    async fn create_bucket(
        &self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> cosi_common::Result<DriverCreateBucketResponse> {
        if name.is_empty() {
            return Err(ProvisionerError::invalid_argument("bucket name is required"));
        }

        let session = self.factory.connect(parameters).await?;
        cosi_s3::create_bucket(session.client.as_ref(), name).await?;

        Ok(DriverCreateBucketResponse {
            bucket_id: name.to_string(),
            bucket_info: Some(Protocol {
                r#type: Some(protocol::Type::S3(S3 {
                    region: session.region,
                    signature_version: S3SignatureVersion::S3v4.into(),
                })),
            }),
        })
    }
}

impl std::fmt::Debug for ProvisionerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionerService").finish_non_exhaustive()
    }
}

#[tonic::async_trait]
impl Provisioner for ProvisionerService {
    #[instrument(skip_all, fields(bucket = %request.get_ref().name))]
    async fn driver_create_bucket(
        &self,
        request: Request<DriverCreateBucketRequest>,
    ) -> Result<Response<DriverCreateBucketResponse>, Status> {
        let req = request.into_inner();
        let response = self.create_bucket(&req.name, &req.parameters).await?;

        info!(bucket_id = %response.bucket_id, "bucket provisioned");
        Ok(Response::new(response))
    }

    async fn driver_delete_bucket(
        &self,
        _request: Request<DriverDeleteBucketRequest>,
    ) -> Result<Response<DriverDeleteBucketResponse>, Status> {
        Err(ProvisionerError::unimplemented("DriverDeleteBucket is not implemented").into())
    }

    async fn driver_grant_bucket_access(
        &self,
        _request: Request<DriverGrantBucketAccessRequest>,
    ) -> Result<Response<DriverGrantBucketAccessResponse>, Status> {
        Err(ProvisionerError::unimplemented("DriverGrantBucketAccess is not implemented").into())
    }

    async fn driver_revoke_bucket_access(
        &self,
        _request: Request<DriverRevokeBucketAccessRequest>,
    ) -> Result<Response<DriverRevokeBucketAccessResponse>, Status> {
        Err(ProvisionerError::unimplemented("DriverRevokeBucketAccess is not implemented").into())
    }
}
