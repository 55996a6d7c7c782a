//! orgflow provisioning orchestrator
//!
//! This crate turns an ordered chain of provisioning steps into calls against
//! a control plane that only accepts one mutation at a time and reports
//! completion asynchronously.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  orgflow CLI                     │
//! │              (orgflow plan/apply)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ProvisioningStep[]
//! ┌─────────────────▼───────────────────────────────┐
//! │                orgflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │            TreeOrchestrator               │   │
//! │  └──────┬───────────────────────────┬───────┘   │
//! │  ┌──────▼───────┐          ┌────────▼───────┐   │
//! │  │AsyncOperation│◄─────────┤CompletionPoller│   │
//! │  └──────┬───────┘          └────────────────┘   │
//! │         │ trait ControlPlane   ┌────────────┐   │
//! │         │                      │ State Mgmt │   │
//! │         │                      └────────────┘   │
//! └─────────┼───────────────────────────────────────┘
//!           │
//! ┌─────────▼─────────┐
//! │ aws-organizations │
//! │   control plane   │
//! └───────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod operation;
pub mod orchestrator;
pub mod poller;
pub mod provider;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use action::{
    ActionCall, DispatchRequest, EntityKind, EntityRef, ParamValue, Plan, PlanSummary,
    ProvisioningStep, StepVerb, lookup_path, validate_chain,
};
pub use error::{CloudError, Result, StepError};
pub use operation::{AsyncOperation, OperationHandle, OperationState};
pub use orchestrator::{Checkpoint, TreeOrchestrator};
pub use poller::CompletionPoller;
pub use provider::{
    ControlPlane, DEFAULT_POLL_INTERVAL, DEFAULT_REGION, OrchestratorConfig, PollPolicy,
    PollStatus, ResumptionToken,
};
pub use state::{ProvisioningResult, StateLock, StateManager, StepOutcome, StepRecord, StepStatus};
