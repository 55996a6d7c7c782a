//! AWS Organizations control plane implementation

use crate::error::{AwsError, Result};
use crate::job::{
    JobRef, account_payload, delegated_admin_payload, email_payload, organization_payload,
    placement_payload, roots_payload, service_access_payload, unit_payload,
};
use crate::organizations::{
    CreateAccountProgress, EmailVerification, OrganizationsApi, OrganizationsClient,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use orgflow_cloud::{CloudError, ControlPlane, DispatchRequest, PollStatus, ResumptionToken};
use std::sync::Arc;

/// Parameters passed to `CreateAccount` directly instead of as tags
const ACCOUNT_INPUTS: [&str; 3] = ["Email", "AccountName", "ParentId"];

/// Tags to put on an account: every metadata parameter of the request
pub fn account_tags(request: &DispatchRequest) -> Vec<(String, String)> {
    request
        .parameters
        .iter()
        .filter(|(name, _)| !ACCOUNT_INPUTS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Control plane backed by the AWS SDK
///
/// Every mutation happens in `dispatch`. Polls only read back state.
pub struct AwsControlPlane {
    client: Arc<dyn OrganizationsClient>,
    region: String,
}

impl AwsControlPlane {
    pub fn new(config: &SdkConfig) -> Self {
        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| orgflow_cloud::DEFAULT_REGION.to_string());
        Self::with_client(Arc::new(OrganizationsApi::new(config)), region)
    }

    pub fn with_client(client: Arc<dyn OrganizationsClient>, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Load credentials from the default chain, pinned to `region`
    pub async fn from_env(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self::new(&config)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn start(&self, request: &DispatchRequest) -> Result<JobRef> {
        let client = self.client.as_ref();
        let job = match request.action.as_str() {
            "CreateAccount" => JobRef::CreateAccount {
                request_id: client
                    .create_account(
                        request.require("Email")?,
                        request.require("AccountName")?,
                        &account_tags(request),
                    )
                    .await?,
            },
            "TagResource" => {
                let account_id = request.require_prior_id()?;
                client
                    .tag_resource(account_id, &account_tags(request))
                    .await?;
                JobRef::Account {
                    account_id: account_id.to_string(),
                }
            }
            "MoveAccount" => {
                let account_id = request.require("AccountId")?;
                let parent_id = request.require("ParentId")?;
                self.place_account(account_id, parent_id).await?;
                JobRef::Placement {
                    account_id: account_id.to_string(),
                    parent_id: parent_id.to_string(),
                }
            }
            "CreateOrganizationalUnit" => JobRef::Unit {
                unit_id: client
                    .create_unit(request.require("ParentId")?, request.require("Name")?)
                    .await?,
            },
            "UpdateOrganizationalUnit" => {
                let unit_id = request.require_prior_id()?;
                client.rename_unit(unit_id, request.require("Name")?).await?;
                JobRef::Unit {
                    unit_id: unit_id.to_string(),
                }
            }
            "DeleteOrganizationalUnit" => {
                let unit_id = request.require_prior_id()?;
                client.delete_unit(unit_id).await?;
                JobRef::Deleted {
                    id: unit_id.to_string(),
                }
            }
            "CreateOrganization" => JobRef::Organization {
                organization_id: client.create_organization().await?,
            },
            "DescribeOrganization" => JobRef::Organization {
                organization_id: client.describe_organization().await?,
            },
            "DeleteOrganization" => {
                let organization_id = request.require_prior_id()?;
                client.delete_organization().await?;
                JobRef::Deleted {
                    id: organization_id.to_string(),
                }
            }
            "ListRoots" => JobRef::Roots,
            "EnableAWSServiceAccess" => {
                let service_principal = request.require("ServicePrincipal")?;
                client.enable_service_access(service_principal).await?;
                JobRef::ServiceAccess {
                    service_principal: service_principal.to_string(),
                }
            }
            "DisableAWSServiceAccess" => {
                let service_principal = request.require("ServicePrincipal")?;
                client.disable_service_access(service_principal).await?;
                JobRef::Deleted {
                    id: service_principal.to_string(),
                }
            }
            "RegisterDelegatedAdministrator" => {
                let account_id = request.require("AccountId")?;
                let service_principal = request.require("ServicePrincipal")?;
                let registered = client.list_delegated_admins(service_principal).await?;
                if registered.iter().any(|id| id == account_id) {
                    tracing::debug!(
                        account = %account_id,
                        service = %service_principal,
                        "Already a delegated administrator"
                    );
                } else {
                    client
                        .register_delegated_admin(account_id, service_principal)
                        .await?;
                }
                JobRef::DelegatedAdmin {
                    account_id: account_id.to_string(),
                    service_principal: service_principal.to_string(),
                }
            }
            "DeregisterDelegatedAdministrator" => {
                let account_id = match request.param("AccountId") {
                    Some(id) => id,
                    None => request.require_prior_id()?,
                };
                client
                    .deregister_delegated_admin(account_id, request.require("ServicePrincipal")?)
                    .await?;
                JobRef::Deleted {
                    id: account_id.to_string(),
                }
            }
            "VerifyEmailIdentity" => {
                let address = request.require("EmailAddress")?;
                client.verify_email(address).await?;
                JobRef::EmailIdentity {
                    address: address.to_string(),
                }
            }
            other => return Err(AwsError::UnsupportedAction(other.to_string())),
        };
        Ok(job)
    }

    async fn check(&self, job: &JobRef) -> Result<PollStatus> {
        let client = self.client.as_ref();
        let status = match job {
            JobRef::CreateAccount { request_id } => {
                match client.create_account_status(request_id).await? {
                    CreateAccountProgress::InProgress => PollStatus::pending(),
                    CreateAccountProgress::Failed { reason } => PollStatus::failed(reason),
                    CreateAccountProgress::Succeeded { account_id } => {
                        PollStatus::succeeded(account_payload(&account_id))
                    }
                }
            }
            JobRef::Account { account_id } => {
                let account_id = client.describe_account(account_id).await?;
                PollStatus::succeeded(account_payload(&account_id))
            }
            JobRef::Placement {
                account_id,
                parent_id,
            } => match client.parent_of(account_id).await? {
                Some(current) if current == *parent_id => {
                    PollStatus::succeeded(placement_payload(account_id, parent_id))
                }
                _ => PollStatus::pending(),
            },
            JobRef::Unit { unit_id } => {
                let unit = client.describe_unit(unit_id).await?;
                PollStatus::succeeded(unit_payload(&unit.id, unit.name.as_deref()))
            }
            JobRef::Organization { organization_id } => {
                PollStatus::succeeded(organization_payload(organization_id))
            }
            JobRef::Roots => {
                let roots = client.list_roots().await?;
                if roots.is_empty() {
                    PollStatus::pending()
                } else {
                    PollStatus::succeeded(roots_payload(&roots))
                }
            }
            JobRef::ServiceAccess { service_principal } => {
                let enabled = client.list_service_access().await?;
                if enabled.contains(service_principal) {
                    PollStatus::succeeded(service_access_payload(service_principal))
                } else {
                    PollStatus::pending()
                }
            }
            JobRef::DelegatedAdmin {
                account_id,
                service_principal,
            } => {
                let registered = client.list_delegated_admins(service_principal).await?;
                if registered.contains(account_id) {
                    PollStatus::succeeded(delegated_admin_payload(account_id, service_principal))
                } else {
                    PollStatus::pending()
                }
            }
            JobRef::EmailIdentity { address } => match client.email_verification(address).await? {
                EmailVerification::Verified => PollStatus::succeeded(email_payload(address)),
                EmailVerification::Failed(message) => PollStatus::failed(message),
                EmailVerification::Pending => PollStatus::pending(),
            },
            JobRef::Deleted { .. } => PollStatus::succeeded(serde_json::json!({})),
        };
        Ok(status)
    }

    /// Move an account under `parent_id` unless it is already there
    async fn place_account(&self, account_id: &str, parent_id: &str) -> Result<()> {
        let current = self.client.parent_of(account_id).await?;
        match current.as_deref() {
            Some(current) if current == parent_id => {
                tracing::debug!(account = %account_id, parent = %parent_id, "Already placed");
                Ok(())
            }
            Some(current) => {
                tracing::info!(
                    account = %account_id,
                    from = %current,
                    to = %parent_id,
                    "Moving account"
                );
                self.client.move_account(account_id, current, parent_id).await
            }
            None => Err(AwsError::MissingField("Parents")),
        }
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    fn name(&self) -> &str {
        "aws"
    }

    async fn dispatch(&self, request: &DispatchRequest) -> orgflow_cloud::Result<ResumptionToken> {
        tracing::debug!(step = %request.step_id, action = %request.action, "AWS dispatch");
        let job = self
            .start(request)
            .await
            .map_err(|e| CloudError::ApiError(e.to_string()))?;
        Ok(job.token())
    }

    async fn poll(&self, token: &ResumptionToken) -> orgflow_cloud::Result<PollStatus> {
        let job = JobRef::parse(token).map_err(|e| CloudError::ApiError(e.to_string()))?;
        self.check(&job)
            .await
            .map_err(|e| CloudError::ApiError(e.to_string()))
    }
}
