//! Organizations and SES calls behind a trait seam

use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_organizations::types::{CreateAccountState, OrganizationFeatureSet, Tag};
use aws_sdk_ses::types::VerificationStatus;

/// Progress of a `CreateAccount` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateAccountProgress {
    InProgress,
    Succeeded { account_id: String },
    Failed { reason: String },
}

/// Verification state of an SES email identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailVerification {
    Pending,
    Verified,
    Failed(String),
}

/// Organizations unit as read back from the API
#[derive(Debug, Clone)]
pub struct UnitInfo {
    pub id: String,
    pub name: Option<String>,
}

/// Calls the control plane makes against Organizations and SES
///
/// Methods named after a read (`describe_*`, `list_*`, `*_status`,
/// `parent_of`, `email_verification`) must not change anything upstream;
/// status polls only use those.
#[async_trait]
pub trait OrganizationsClient: Send + Sync {
    /// Start account creation, returning the request id
    async fn create_account(
        &self,
        email: &str,
        name: &str,
        tags: &[(String, String)],
    ) -> Result<String>;
    async fn create_account_status(&self, request_id: &str) -> Result<CreateAccountProgress>;
    async fn describe_account(&self, account_id: &str) -> Result<String>;
    async fn tag_resource(&self, resource_id: &str, tags: &[(String, String)]) -> Result<()>;
    /// Current parent (root or unit) of an account or unit
    async fn parent_of(&self, child_id: &str) -> Result<Option<String>>;
    async fn move_account(&self, account_id: &str, from: &str, to: &str) -> Result<()>;

    async fn create_unit(&self, parent_id: &str, name: &str) -> Result<String>;
    async fn rename_unit(&self, unit_id: &str, name: &str) -> Result<()>;
    async fn delete_unit(&self, unit_id: &str) -> Result<()>;
    async fn describe_unit(&self, unit_id: &str) -> Result<UnitInfo>;

    async fn create_organization(&self) -> Result<String>;
    async fn describe_organization(&self) -> Result<String>;
    async fn delete_organization(&self) -> Result<()>;
    async fn list_roots(&self) -> Result<Vec<String>>;

    async fn enable_service_access(&self, service_principal: &str) -> Result<()>;
    async fn disable_service_access(&self, service_principal: &str) -> Result<()>;
    /// Service principals with trusted access to the organization
    async fn list_service_access(&self) -> Result<Vec<String>>;
    async fn register_delegated_admin(
        &self,
        account_id: &str,
        service_principal: &str,
    ) -> Result<()>;
    async fn deregister_delegated_admin(
        &self,
        account_id: &str,
        service_principal: &str,
    ) -> Result<()>;
    /// Account ids registered as delegated administrators for a service
    async fn list_delegated_admins(&self, service_principal: &str) -> Result<Vec<String>>;

    async fn verify_email(&self, address: &str) -> Result<()>;
    async fn email_verification(&self, address: &str) -> Result<EmailVerification>;
}

/// Organizations + SES API client
#[derive(Debug, Clone)]
pub struct OrganizationsApi {
    organizations: aws_sdk_organizations::Client,
    ses: aws_sdk_ses::Client,
}

fn build_tags(tags: &[(String, String)]) -> Result<Vec<Tag>> {
    tags.iter()
        .map(|(key, value)| {
            Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|e| AwsError::InvalidRequest(e.to_string()))
        })
        .collect()
}

impl OrganizationsApi {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            organizations: aws_sdk_organizations::Client::new(config),
            ses: aws_sdk_ses::Client::new(config),
        }
    }
}

#[async_trait]
impl OrganizationsClient for OrganizationsApi {
    // --- accounts ---

    async fn create_account(
        &self,
        email: &str,
        name: &str,
        tags: &[(String, String)],
    ) -> Result<String> {
        let output = self
            .organizations
            .create_account()
            .email(email)
            .account_name(name)
            .set_tags(Some(build_tags(tags)?))
            .send()
            .await
            .map_err(|e| AwsError::api("CreateAccount", e))?;

        output
            .create_account_status()
            .and_then(|s| s.id())
            .map(str::to_string)
            .ok_or(AwsError::MissingField("CreateAccountStatus.Id"))
    }

    async fn create_account_status(&self, request_id: &str) -> Result<CreateAccountProgress> {
        let output = self
            .organizations
            .describe_create_account_status()
            .create_account_request_id(request_id)
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeCreateAccountStatus", e))?;

        let status = output
            .create_account_status()
            .ok_or(AwsError::MissingField("CreateAccountStatus"))?;

        let progress = match status.state() {
            Some(CreateAccountState::Succeeded) => CreateAccountProgress::Succeeded {
                account_id: status
                    .account_id()
                    .map(str::to_string)
                    .ok_or(AwsError::MissingField("CreateAccountStatus.AccountId"))?,
            },
            Some(CreateAccountState::Failed) => CreateAccountProgress::Failed {
                reason: status
                    .failure_reason()
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_else(|| "account creation failed".to_string()),
            },
            _ => CreateAccountProgress::InProgress,
        };
        Ok(progress)
    }

    async fn describe_account(&self, account_id: &str) -> Result<String> {
        let output = self
            .organizations
            .describe_account()
            .account_id(account_id)
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeAccount", e))?;

        output
            .account()
            .and_then(|a| a.id())
            .map(str::to_string)
            .ok_or(AwsError::MissingField("Account.Id"))
    }

    async fn tag_resource(&self, resource_id: &str, tags: &[(String, String)]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.organizations
            .tag_resource()
            .resource_id(resource_id)
            .set_tags(Some(build_tags(tags)?))
            .send()
            .await
            .map_err(|e| AwsError::api("TagResource", e))?;
        Ok(())
    }

    async fn parent_of(&self, child_id: &str) -> Result<Option<String>> {
        let output = self
            .organizations
            .list_parents()
            .child_id(child_id)
            .send()
            .await
            .map_err(|e| AwsError::api("ListParents", e))?;

        Ok(output
            .parents()
            .first()
            .and_then(|p| p.id())
            .map(str::to_string))
    }

    async fn move_account(&self, account_id: &str, from: &str, to: &str) -> Result<()> {
        self.organizations
            .move_account()
            .account_id(account_id)
            .source_parent_id(from)
            .destination_parent_id(to)
            .send()
            .await
            .map_err(|e| AwsError::api("MoveAccount", e))?;
        Ok(())
    }

    // --- organizational units ---

    async fn create_unit(&self, parent_id: &str, name: &str) -> Result<String> {
        let output = self
            .organizations
            .create_organizational_unit()
            .parent_id(parent_id)
            .name(name)
            .send()
            .await
            .map_err(|e| AwsError::api("CreateOrganizationalUnit", e))?;

        output
            .organizational_unit()
            .and_then(|u| u.id())
            .map(str::to_string)
            .ok_or(AwsError::MissingField("OrganizationalUnit.Id"))
    }

    async fn rename_unit(&self, unit_id: &str, name: &str) -> Result<()> {
        self.organizations
            .update_organizational_unit()
            .organizational_unit_id(unit_id)
            .name(name)
            .send()
            .await
            .map_err(|e| AwsError::api("UpdateOrganizationalUnit", e))?;
        Ok(())
    }

    async fn delete_unit(&self, unit_id: &str) -> Result<()> {
        self.organizations
            .delete_organizational_unit()
            .organizational_unit_id(unit_id)
            .send()
            .await
            .map_err(|e| AwsError::api("DeleteOrganizationalUnit", e))?;
        Ok(())
    }

    async fn describe_unit(&self, unit_id: &str) -> Result<UnitInfo> {
        let output = self
            .organizations
            .describe_organizational_unit()
            .organizational_unit_id(unit_id)
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeOrganizationalUnit", e))?;

        let unit = output
            .organizational_unit()
            .ok_or(AwsError::MissingField("OrganizationalUnit"))?;
        Ok(UnitInfo {
            id: unit
                .id()
                .map(str::to_string)
                .ok_or(AwsError::MissingField("OrganizationalUnit.Id"))?,
            name: unit.name().map(str::to_string),
        })
    }

    // --- organization ---

    async fn create_organization(&self) -> Result<String> {
        let output = self
            .organizations
            .create_organization()
            .feature_set(OrganizationFeatureSet::All)
            .send()
            .await
            .map_err(|e| AwsError::api("CreateOrganization", e))?;

        output
            .organization()
            .and_then(|o| o.id())
            .map(str::to_string)
            .ok_or(AwsError::MissingField("Organization.Id"))
    }

    async fn describe_organization(&self) -> Result<String> {
        let output = self
            .organizations
            .describe_organization()
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeOrganization", e))?;

        output
            .organization()
            .and_then(|o| o.id())
            .map(str::to_string)
            .ok_or(AwsError::MissingField("Organization.Id"))
    }

    async fn delete_organization(&self) -> Result<()> {
        self.organizations
            .delete_organization()
            .send()
            .await
            .map_err(|e| AwsError::api("DeleteOrganization", e))?;
        Ok(())
    }

    async fn list_roots(&self) -> Result<Vec<String>> {
        let output = self
            .organizations
            .list_roots()
            .send()
            .await
            .map_err(|e| AwsError::api("ListRoots", e))?;

        Ok(output
            .roots()
            .iter()
            .filter_map(|r| r.id().map(str::to_string))
            .collect())
    }

    // --- trusted access and delegated administrators ---

    async fn enable_service_access(&self, service_principal: &str) -> Result<()> {
        self.organizations
            .enable_aws_service_access()
            .service_principal(service_principal)
            .send()
            .await
            .map_err(|e| AwsError::api("EnableAWSServiceAccess", e))?;
        Ok(())
    }

    async fn disable_service_access(&self, service_principal: &str) -> Result<()> {
        self.organizations
            .disable_aws_service_access()
            .service_principal(service_principal)
            .send()
            .await
            .map_err(|e| AwsError::api("DisableAWSServiceAccess", e))?;
        Ok(())
    }

    async fn list_service_access(&self) -> Result<Vec<String>> {
        let mut principals = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .organizations
                .list_aws_service_access_for_organization()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| AwsError::api("ListAWSServiceAccessForOrganization", e))?;

            principals.extend(
                output
                    .enabled_service_principals()
                    .iter()
                    .filter_map(|p| p.service_principal().map(str::to_string)),
            );
            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(principals);
            }
        }
    }

    async fn register_delegated_admin(
        &self,
        account_id: &str,
        service_principal: &str,
    ) -> Result<()> {
        self.organizations
            .register_delegated_administrator()
            .account_id(account_id)
            .service_principal(service_principal)
            .send()
            .await
            .map_err(|e| AwsError::api("RegisterDelegatedAdministrator", e))?;
        Ok(())
    }

    async fn deregister_delegated_admin(
        &self,
        account_id: &str,
        service_principal: &str,
    ) -> Result<()> {
        self.organizations
            .deregister_delegated_administrator()
            .account_id(account_id)
            .service_principal(service_principal)
            .send()
            .await
            .map_err(|e| AwsError::api("DeregisterDelegatedAdministrator", e))?;
        Ok(())
    }

    async fn list_delegated_admins(&self, service_principal: &str) -> Result<Vec<String>> {
        let mut accounts = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .organizations
                .list_delegated_administrators()
                .service_principal(service_principal)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| AwsError::api("ListDelegatedAdministrators", e))?;

            accounts.extend(
                output
                    .delegated_administrators()
                    .iter()
                    .filter_map(|a| a.id().map(str::to_string)),
            );
            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(accounts);
            }
        }
    }

    // --- SES ---

    async fn verify_email(&self, address: &str) -> Result<()> {
        self.ses
            .verify_email_identity()
            .email_address(address)
            .send()
            .await
            .map_err(|e| AwsError::api("VerifyEmailIdentity", e))?;
        Ok(())
    }

    async fn email_verification(&self, address: &str) -> Result<EmailVerification> {
        let output = self
            .ses
            .get_identity_verification_attributes()
            .identities(address)
            .send()
            .await
            .map_err(|e| AwsError::api("GetIdentityVerificationAttributes", e))?;

        let Some(attributes) = output.verification_attributes().get(address) else {
            return Ok(EmailVerification::Pending);
        };

        let verification = match attributes.verification_status() {
            VerificationStatus::Success => EmailVerification::Verified,
            VerificationStatus::Failed => {
                EmailVerification::Failed(format!("verification of {} failed", address))
            }
            _ => EmailVerification::Pending,
        };
        Ok(verification)
    }
}
