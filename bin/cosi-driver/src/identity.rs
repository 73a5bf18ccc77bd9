//! Identity gRPC service implementation

use cosi_common::ProvisionerError;
use cosi_proto::cosi::{DriverGetInfoRequest, DriverGetInfoResponse, identity_server::Identity};
use tonic::{Request, Response, Status};

/// Reports the provisioner name fixed at process start
#[derive(Clone, Debug)]
pub struct IdentityService {
    driver_name: String,
}

impl IdentityService {
    pub fn new(driver_name: impl Into<String>) -> Self {
        Self {
            driver_name: driver_name.into(),
        }
    }
}

#[tonic::async_trait]
impl Identity for IdentityService {
    async fn driver_get_info(
        &self,
        _request: Request<DriverGetInfoRequest>,
    ) -> Result<Response<DriverGetInfoResponse>, Status> {
        // Configuration integrity check; the request carries nothing we read.
        if self.driver_name.is_empty() {
            return Err(ProvisionerError::invalid_argument("driver name is not configured").into());
        }

        Ok(Response::new(DriverGetInfoResponse {
            name: self.driver_name.clone(),
        }))
    }
}
