//! AWS Organizations control plane for orgflow
//!
//! Implements [`orgflow_cloud::ControlPlane`] on top of the AWS SDK.
//! Organizations calls are global and must be sent to `us-east-1`; SES is
//! used only to verify the management email before the organization exists.
//!
//! # Requirements
//!
//! - Credentials resolvable through the default AWS provider chain
//! - Management-account permissions for `organizations:*` and
//!   `ses:VerifyEmailIdentity`
//!
//! Every upstream change is made when a step is dispatched. Polls only read
//! back state, so a lost poll response can be retried freely.
//!
//! # Example
//!
//! ```ignore
//! use orgflow_cloud_aws::AwsControlPlane;
//! use orgflow_cloud::{OrchestratorConfig, TreeOrchestrator};
//! use std::sync::Arc;
//!
//! let plane = AwsControlPlane::from_env("us-east-1").await;
//! let orchestrator = TreeOrchestrator::new(Arc::new(plane), OrchestratorConfig::default());
//! let result = orchestrator.run(&plan.steps, None).await?;
//! ```

pub mod error;
pub mod job;
pub mod organizations;
pub mod provider;

pub use error::{AwsError, Result};
pub use job::JobRef;
pub use organizations::{
    CreateAccountProgress, EmailVerification, OrganizationsApi, OrganizationsClient, UnitInfo,
};
pub use provider::{AwsControlPlane, account_tags};
