//! AWS control plane error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    #[error("Response is missing {0}")]
    MissingField(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid resumption token: {0}")]
    InvalidToken(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Cloud error: {0}")]
    CloudError(#[from] orgflow_cloud::CloudError),
}

impl AwsError {
    /// Wrap an SDK error with its full source chain
    pub(crate) fn api<E>(operation: &'static str, err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        AwsError::Api {
            operation,
            message: aws_sdk_organizations::error::DisplayErrorContext(&err).to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
