//! Bucket operation executor

use crate::classify::{Outcome, classify};
use crate::client::BucketClient;
use cosi_common::{ProvisionerError, Result};
use tracing::{info, warn};

/// Create `name` with a single backend call.
///
/// A bucket already owned by the caller counts as created, so a sidecar
/// retrying an identical request converges. A bucket owned by anyone else
/// is an `AlreadyExists` failure.
pub async fn create_bucket(client: &dyn BucketClient, name: &str) -> Result<()> {
    info!(bucket = name, "starting bucket creation");

    let result = client.create_bucket(name).await;
    match classify(&result) {
        Outcome::Success => {
            info!(bucket = name, "bucket creation succeeded");
            Ok(())
        }
        Outcome::AlreadyOwnedByCaller => {
            info!(bucket = name, "bucket already owned by caller, treating as created");
            Ok(())
        }
        Outcome::AlreadyOwnedByOther => {
            warn!(bucket = name, "bucket name taken by another owner");
            Err(ProvisionerError::already_exists(format!(
                "bucket {name} already exists"
            )))
        }
        Outcome::Internal => {
            let cause = result.err().map(|e| e.message).unwrap_or_default();
            Err(ProvisionerError::internal(format!(
                "failed to create bucket {name}: {cause}"
            )))
        }
    }
}
