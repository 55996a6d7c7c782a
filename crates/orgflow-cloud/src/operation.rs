//! Asynchronous operation state machine
//!
//! Turns a dispatch call and its correlated status polls into a single
//! lifecycle:
//!
//! ```text
//!            dispatch ok             poll: terminal success
//!   start ───────────────► Pending ─────────────────────────► Complete
//!     │                       │
//!     │ dispatch rejected     │ poll: terminal failure / budget exhausted
//!     └───────────────────────┴─────────────────────────────► Failed
//! ```
//!
//! Complete and Failed are final; polling a finished operation returns the
//! recorded state without calling the control plane.

use crate::action::DispatchRequest;
use crate::error::{Result, StepError};
use crate::provider::{ControlPlane, ResumptionToken};

/// Lifecycle state of an operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationState {
    /// Job accepted, outcome unknown
    Pending,
    /// Job finished; payload holds the raw response
    Complete { payload: serde_json::Value },
    /// Job rejected, failed, or never finished in budget
    Failed { error: StepError },
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::Pending)
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationState::Pending => write!(f, "pending"),
            OperationState::Complete { .. } => write!(f, "complete"),
            OperationState::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Correlates an operation with its external job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub step_id: String,
    pub token: ResumptionToken,
}

/// One external job servicing one step; never reused for another step
#[derive(Debug)]
pub struct AsyncOperation {
    step_id: String,
    handle: Option<OperationHandle>,
    state: OperationState,
    attempts: u32,
    last_payload: Option<serde_json::Value>,
}

impl AsyncOperation {
    /// Dispatch `request` exactly once
    ///
    /// A rejected dispatch yields an operation that is already Failed; the
    /// dispatch itself is never retried.
    pub async fn start(plane: &dyn ControlPlane, request: &DispatchRequest) -> Self {
        tracing::debug!(
            step = %request.step_id,
            action = %request.action,
            region = %request.region,
            "Dispatching"
        );

        match plane.dispatch(request).await {
            Ok(token) => {
                tracing::info!(step = %request.step_id, token = %token, "Dispatched");
                Self::resume(request.step_id.clone(), token)
            }
            Err(e) => {
                tracing::warn!(step = %request.step_id, error = %e, "Dispatch rejected");
                Self::failed(request.step_id.clone(), StepError::Dispatch(e.to_string()))
            }
        }
    }

    /// Re-attach to a job dispatched by an earlier invocation
    pub fn resume(step_id: impl Into<String>, token: ResumptionToken) -> Self {
        let step_id = step_id.into();
        Self {
            handle: Some(OperationHandle {
                step_id: step_id.clone(),
                token,
            }),
            step_id,
            state: OperationState::Pending,
            attempts: 0,
            last_payload: None,
        }
    }

    /// Operation that failed before anything was sent upstream
    pub fn failed(step_id: impl Into<String>, error: StepError) -> Self {
        Self {
            step_id: step_id.into(),
            handle: None,
            state: OperationState::Failed { error },
            attempts: 0,
            last_payload: None,
        }
    }

    /// Operation that finished without an external call
    pub fn completed(step_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            step_id: step_id.into(),
            handle: None,
            state: OperationState::Complete {
                payload: payload.clone(),
            },
            attempts: 0,
            last_payload: Some(payload),
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn handle(&self) -> Option<&OperationHandle> {
        self.handle.as_ref()
    }

    pub fn token(&self) -> Option<&ResumptionToken> {
        self.handle.as_ref().map(|h| &h.token)
    }

    pub fn state(&self) -> &OperationState {
        &self.state
    }

    /// Number of status polls issued so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_payload(&self) -> Option<&serde_json::Value> {
        self.last_payload.as_ref()
    }

    /// Query the external status once
    ///
    /// A transport error is returned as `Err` and leaves the state Pending;
    /// the attempt is still counted.
    pub async fn poll(&mut self, plane: &dyn ControlPlane) -> Result<&OperationState> {
        if self.state.is_terminal() {
            return Ok(&self.state);
        }
        let Some(handle) = &self.handle else {
            return Ok(&self.state);
        };

        self.attempts += 1;
        let status = plane.poll(&handle.token).await?;

        if let Some(payload) = &status.result_payload {
            self.last_payload = Some(payload.clone());
        }

        if !status.terminal {
            tracing::debug!(step = %self.step_id, attempt = self.attempts, "Still pending");
            return Ok(&self.state);
        }

        self.state = if status.success == Some(true) {
            OperationState::Complete {
                payload: status.result_payload.unwrap_or(serde_json::Value::Null),
            }
        } else {
            let message = status
                .error_message
                .unwrap_or_else(|| "job reported failure without a message".to_string());
            OperationState::Failed {
                error: StepError::ExternalFailure(message),
            }
        };

        tracing::info!(step = %self.step_id, state = %self.state, "Operation finished");
        Ok(&self.state)
    }

    /// Give up on a job that is still pending
    pub(crate) fn exhaust(&mut self) {
        if !self.state.is_terminal() {
            self.state = OperationState::Failed {
                error: StepError::PollTimeout {
                    attempts: self.attempts,
                },
            };
        }
    }
}
