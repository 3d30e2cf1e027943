//! AWS provider error types

use aws_sdk_sts::error::{DisplayErrorContext, SdkError};
use invflow_core::InventoryError;
use thiserror::Error;

/// AWS provider errors
#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Identity resolution failed: {0}")]
    Identity(String),

    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AwsError {
    /// Wrap an SDK error with the operation that produced it
    pub fn api<E, R>(operation: &'static str, err: SdkError<E, R>) -> Self
    where
        E: std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        AwsError::Api {
            operation,
            message: DisplayErrorContext(&err).to_string(),
        }
    }
}

impl From<AwsError> for InventoryError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::ProfileNotFound(profile) => InventoryError::ProfileNotFound(profile),
            AwsError::Identity(message) => InventoryError::Identity(message),
            AwsError::Io(err) => InventoryError::Io(err),
            api @ AwsError::Api { .. } => InventoryError::Api(api.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
