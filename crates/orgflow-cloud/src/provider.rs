//! Control plane trait definition

use crate::action::{DispatchRequest, EntityKind};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Region every organization-level call is pinned to unless overridden
pub const DEFAULT_REGION: &str = "us-east-1";

/// Spacing between status polls unless overridden
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// External control plane abstraction trait
///
/// Implementations expose every mutation as a start/poll pair. The orchestrator
/// holds a single shared instance for the whole run and threads it through
/// every step.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Returns the control plane name (e.g., "aws-organizations")
    fn name(&self) -> &str;

    /// Start the external job for `request`
    ///
    /// Called at most once per operation. An error here means the request was
    /// rejected synchronously.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<ResumptionToken>;

    /// Query the status of a previously dispatched job
    ///
    /// Must not mutate the target resource. An error here is a transport
    /// problem, not a job failure.
    async fn poll(&self, token: &ResumptionToken) -> Result<PollStatus>;
}

/// Opaque identifier correlating a dispatched job with its polls
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumptionToken(String);

impl ResumptionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResumptionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a single status poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollStatus {
    /// Whether the job reached a final state
    pub terminal: bool,

    /// Outcome of a terminal job
    pub success: Option<bool>,

    /// Raw response, used to extract the entity id
    pub result_payload: Option<serde_json::Value>,

    /// Upstream failure message
    pub error_message: Option<String>,
}

impl PollStatus {
    pub fn pending() -> Self {
        Self {
            terminal: false,
            success: None,
            result_payload: None,
            error_message: None,
        }
    }

    pub fn succeeded(payload: serde_json::Value) -> Self {
        Self {
            terminal: true,
            success: Some(true),
            result_payload: Some(payload),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            terminal: true,
            success: Some(false),
            result_payload: None,
            error_message: Some(message.into()),
        }
    }
}

/// Polling cadence and budget for one resource family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between polls
    pub interval: Duration,

    /// Maximum number of polls before giving up
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: 30,
        }
    }
}

/// Settings consumed by the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Region hint passed with every dispatch
    pub region: String,

    /// Per-family overrides; kinds without an entry use `default_policy`
    pub policies: HashMap<EntityKind, PollPolicy>,

    pub default_policy: PollPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        // Account creation takes minutes, everything else a few seconds
        let policies = [
            (EntityKind::Account, 90),
            (EntityKind::EmailIdentity, 60),
            (EntityKind::Organization, 6),
            (EntityKind::Root, 6),
            (EntityKind::Unit, 6),
            (EntityKind::Placement, 6),
            (EntityKind::ServiceAccess, 6),
            (EntityKind::DelegatedAdmin, 6),
        ]
        .into_iter()
        .map(|(kind, attempts)| (kind, PollPolicy::new(DEFAULT_POLL_INTERVAL, attempts)))
        .collect();

        Self {
            region: DEFAULT_REGION.to_string(),
            policies,
            default_policy: PollPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_policy(mut self, kind: EntityKind, policy: PollPolicy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    /// Apply the same interval to every family, keeping their budgets
    pub fn with_interval(mut self, interval: Duration) -> Self {
        for policy in self.policies.values_mut() {
            policy.interval = interval;
        }
        self.default_policy.interval = interval;
        self
    }

    pub fn policy_for(&self, kind: EntityKind) -> PollPolicy {
        self.policies
            .get(&kind)
            .copied()
            .unwrap_or(self.default_policy)
    }
}
