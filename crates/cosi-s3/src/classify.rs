//! Backend outcome classification
//!
//! Backend SDK errors are reduced to a [`BackendError`] (error code plus
//! rendered message) in exactly one place, so a change of S3 library only
//! touches the `From` impl below. Classification itself is a pure function.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use std::fmt;
use thiserror::Error;

/// S3 error code: bucket exists and belongs to another account
pub const CODE_BUCKET_ALREADY_EXISTS: &str = "BucketAlreadyExists";

/// S3 error code: bucket exists and belongs to the calling account
pub const CODE_BUCKET_ALREADY_OWNED_BY_YOU: &str = "BucketAlreadyOwnedByYou";

/// Backend failure reduced to what classification needs
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    /// Service error code, when the backend sent one
    pub code: Option<String>,
    /// Full rendered error, for operator logs
    pub message: String,
}

impl BackendError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }
}

impl<R: fmt::Debug> From<SdkError<CreateBucketError, R>> for BackendError {
    fn from(err: SdkError<CreateBucketError, R>) -> Self {
        Self {
            code: err.code().map(str::to_string),
            message: DisplayErrorContext(&err).to_string(),
        }
    }
}

/// Caller-relevant result of one backend create call.
///
/// Request validation failures and unsupported operations are decided before
/// any backend call and therefore never come out of [`classify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Idempotent retry by the same principal; reported as success
    AlreadyOwnedByCaller,
    /// Name taken by another principal; reported as `AlreadyExists`
    AlreadyOwnedByOther,
    Internal,
}

/// Classify a create-bucket result. First match wins.
///
/// Matches on the error code; when the backend sent none (some gateways put
/// the code only in the body text) falls back to a substring match.
#[must_use]
pub fn classify(result: &Result<(), BackendError>) -> Outcome {
    let Err(err) = result else {
        return Outcome::Success;
    };

    let matches = |code: &str| match err.code.as_deref() {
        Some(actual) => actual == code,
        None => err.message.contains(code),
    };

    if matches(CODE_BUCKET_ALREADY_EXISTS) {
        Outcome::AlreadyOwnedByOther
    } else if matches(CODE_BUCKET_ALREADY_OWNED_BY_YOU) {
        Outcome::AlreadyOwnedByCaller
    } else {
        Outcome::Internal
    }
}
