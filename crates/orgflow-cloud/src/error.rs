//! Orchestration error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the orchestration layer itself
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Control plane error: {0}")]
    ApiError(String),

    #[error("{action} requires parameter {name}")]
    MissingParameter { action: String, name: String },

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// Terminal failure of a single provisioning step
///
/// Stored verbatim in the provisioning result, so it must survive a round
/// trip through the state file.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepError {
    /// Missing or malformed parameter, detected before any external call
    #[error("validation error: {0}")]
    Validation(String),

    /// The control plane rejected the request synchronously
    #[error("dispatch rejected: {0}")]
    Dispatch(String),

    /// Attempt budget exhausted while the external job was still pending
    #[error("poll budget exhausted after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    /// The external job reported failure
    #[error("external failure: {0}")]
    ExternalFailure(String),
}

impl StepError {
    /// Whether a re-run should keep polling the recorded job instead of
    /// dispatching a new one
    pub fn is_resumable(&self) -> bool {
        matches!(self, StepError::PollTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_serialization() {
        let err = StepError::PollTimeout { attempts: 3 };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"kind":"poll_timeout","detail":{"attempts":3}}"#);

        let err = StepError::ExternalFailure("EMAIL_ALREADY_EXISTS".to_string());
        let back: StepError = serde_json::from_str(&serde_json::to_string(&err).unwrap()).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_only_poll_timeout_is_resumable() {
        assert!(StepError::PollTimeout { attempts: 1 }.is_resumable());
        assert!(!StepError::Dispatch("denied".into()).is_resumable());
        assert!(!StepError::ExternalFailure("failed".into()).is_resumable());
        assert!(!StepError::Validation("missing".into()).is_resumable());
    }
}
