//! Bounded completion polling

use crate::operation::{AsyncOperation, OperationState};
use crate::provider::{ControlPlane, PollPolicy};
use std::time::Duration;
use tokio::time::sleep;

/// Polls an operation at a fixed interval until it finishes or the attempt
/// budget runs out
#[derive(Debug, Clone, Copy)]
pub struct CompletionPoller {
    interval: Duration,
    max_attempts: u32,
}

impl CompletionPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_policy(policy: PollPolicy) -> Self {
        Self::new(policy.interval, policy.max_attempts)
    }

    /// Drive `operation` to a terminal state
    ///
    /// Transport errors count against the budget like any other non-terminal
    /// observation. After `max_attempts` polls without a terminal status the
    /// operation is marked Failed with `PollTimeout`.
    pub async fn wait_for_completion(
        &self,
        operation: &mut AsyncOperation,
        plane: &dyn ControlPlane,
    ) -> OperationState {
        if operation.state().is_terminal() {
            return operation.state().clone();
        }

        for attempt in 0..self.max_attempts {
            match operation.poll(plane).await.map(|state| state.is_terminal()) {
                Ok(true) => return operation.state().clone(),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        step = %operation.step_id(),
                        attempt = attempt + 1,
                        error = %e,
                        "Status poll failed, retrying"
                    );
                }
            }

            if attempt + 1 < self.max_attempts {
                sleep(self.interval).await;
            }
        }

        operation.exhaust();
        tracing::warn!(
            step = %operation.step_id(),
            attempts = operation.attempts(),
            "Poll budget exhausted"
        );
        operation.state().clone()
    }
}
