//! Resumption tokens for AWS jobs
//!
//! Most Organizations calls finish synchronously, so the token records what
//! to read back rather than a job id. Only account creation has a real
//! request id. Tokens are plain strings so a later invocation can resume
//! polling without any other state.

use crate::error::{AwsError, Result};
use orgflow_cloud::ResumptionToken;
use serde_json::{Value, json};

/// What a poll has to look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRef {
    /// `CreateAccount` request
    CreateAccount { request_id: String },
    /// Existing account (after tagging)
    Account { account_id: String },
    /// Account expected under `parent_id`
    Placement {
        account_id: String,
        parent_id: String,
    },
    Unit { unit_id: String },
    Organization { organization_id: String },
    Roots,
    /// Service principal expected to have trusted access
    ServiceAccess { service_principal: String },
    /// Account expected among the delegated administrators of a service
    DelegatedAdmin {
        account_id: String,
        service_principal: String,
    },
    EmailIdentity { address: String },
    /// Resource deleted synchronously
    Deleted { id: String },
}

impl JobRef {
    pub fn parse(token: &ResumptionToken) -> Result<Self> {
        let raw = token.as_str();
        let invalid = || AwsError::InvalidToken(raw.to_string());

        if raw == "roots" {
            return Ok(JobRef::Roots);
        }

        let (kind, rest) = raw.split_once('/').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }
        let pair = || match rest.split_once('/') {
            Some((first, second)) if !first.is_empty() && !second.is_empty() => {
                Ok((first.to_string(), second.to_string()))
            }
            _ => Err(invalid()),
        };
        let single = || {
            if rest.contains('/') {
                Err(invalid())
            } else {
                Ok(rest.to_string())
            }
        };

        let job = match kind {
            "create-account" => JobRef::CreateAccount {
                request_id: single()?,
            },
            "account" => JobRef::Account {
                account_id: single()?,
            },
            "placement" => {
                let (account_id, parent_id) = pair()?;
                JobRef::Placement {
                    account_id,
                    parent_id,
                }
            }
            "unit" => JobRef::Unit { unit_id: single()? },
            "organization" => JobRef::Organization {
                organization_id: single()?,
            },
            "service-access" => JobRef::ServiceAccess {
                service_principal: single()?,
            },
            "delegated-admin" => {
                let (account_id, service_principal) = pair()?;
                JobRef::DelegatedAdmin {
                    account_id,
                    service_principal,
                }
            }
            "email" => JobRef::EmailIdentity {
                address: single()?,
            },
            "deleted" => JobRef::Deleted { id: single()? },
            _ => return Err(invalid()),
        };
        Ok(job)
    }

    pub fn token(&self) -> ResumptionToken {
        let raw = match self {
            JobRef::CreateAccount { request_id } => format!("create-account/{}", request_id),
            JobRef::Account { account_id } => format!("account/{}", account_id),
            JobRef::Placement {
                account_id,
                parent_id,
            } => format!("placement/{}/{}", account_id, parent_id),
            JobRef::Unit { unit_id } => format!("unit/{}", unit_id),
            JobRef::Organization { organization_id } => format!("organization/{}", organization_id),
            JobRef::Roots => "roots".to_string(),
            JobRef::ServiceAccess { service_principal } => {
                format!("service-access/{}", service_principal)
            }
            JobRef::DelegatedAdmin {
                account_id,
                service_principal,
            } => format!("delegated-admin/{}/{}", account_id, service_principal),
            JobRef::EmailIdentity { address } => format!("email/{}", address),
            JobRef::Deleted { id } => format!("deleted/{}", id),
        };
        ResumptionToken::new(raw)
    }
}

// Response payloads, shaped after the Organizations/SES responses so the
// orchestrator's id paths apply unchanged.

pub(crate) fn account_payload(account_id: &str) -> Value {
    json!({ "AccountId": account_id })
}

pub(crate) fn placement_payload(account_id: &str, parent_id: &str) -> Value {
    json!({ "AccountId": account_id, "ParentId": parent_id })
}

pub(crate) fn unit_payload(unit_id: &str, name: Option<&str>) -> Value {
    json!({ "OrganizationalUnit": { "Id": unit_id, "Name": name } })
}

pub(crate) fn organization_payload(organization_id: &str) -> Value {
    json!({ "Organization": { "Id": organization_id } })
}

pub(crate) fn roots_payload(root_ids: &[String]) -> Value {
    let roots: Vec<Value> = root_ids.iter().map(|id| json!({ "Id": id })).collect();
    json!({ "Roots": roots })
}

pub(crate) fn service_access_payload(service_principal: &str) -> Value {
    json!({ "ServicePrincipal": service_principal })
}

pub(crate) fn delegated_admin_payload(account_id: &str, service_principal: &str) -> Value {
    json!({ "AccountId": account_id, "ServicePrincipal": service_principal })
}

pub(crate) fn email_payload(address: &str) -> Value {
    json!({ "EmailAddress": address })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgflow_cloud::{EntityKind, lookup_path};

    #[test]
    fn test_token_round_trip() {
        let jobs = [
            JobRef::CreateAccount {
                request_id: "car-123".to_string(),
            },
            JobRef::Placement {
                account_id: "111122223333".to_string(),
                parent_id: "ou-ab12-cd34".to_string(),
            },
            JobRef::Unit {
                unit_id: "ou-ab12-cd34".to_string(),
            },
            JobRef::Roots,
            JobRef::ServiceAccess {
                service_principal: "ssm.amazonaws.com".to_string(),
            },
            JobRef::DelegatedAdmin {
                account_id: "111122223333".to_string(),
                service_principal: "config-multiaccountsetup.amazonaws.com".to_string(),
            },
            JobRef::EmailIdentity {
                address: "admin+aws@example.com".to_string(),
            },
        ];
        for job in jobs {
            assert_eq!(JobRef::parse(&job.token()).unwrap(), job);
        }
    }

    #[test]
    fn test_token_format() {
        let job = JobRef::DelegatedAdmin {
            account_id: "111122223333".to_string(),
            service_principal: "ssm.amazonaws.com".to_string(),
        };
        assert_eq!(
            job.token().as_str(),
            "delegated-admin/111122223333/ssm.amazonaws.com"
        );
    }

    #[test]
    fn test_invalid_tokens() {
        for raw in [
            "",
            "unit",
            "unit/",
            "bucket/b-1",
            "create-account/car-1/ou-1",
            "placement/111122223333",
            "placement//ou-1",
            "delegated-admin/111122223333/",
        ] {
            let token = ResumptionToken::new(raw);
            assert!(
                matches!(JobRef::parse(&token), Err(AwsError::InvalidToken(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_payloads_match_id_paths() {
        let cases = [
            (EntityKind::Account, account_payload("111122223333"), "111122223333"),
            (
                EntityKind::Placement,
                placement_payload("111122223333", "ou-1"),
                "ou-1",
            ),
            (EntityKind::Unit, unit_payload("ou-1", Some("SDLC")), "ou-1"),
            (EntityKind::Organization, organization_payload("o-1"), "o-1"),
            (EntityKind::Root, roots_payload(&["r-1".to_string()]), "r-1"),
            (
                EntityKind::ServiceAccess,
                service_access_payload("ssm.amazonaws.com"),
                "ssm.amazonaws.com",
            ),
            (
                EntityKind::DelegatedAdmin,
                delegated_admin_payload("111122223333", "ssm.amazonaws.com"),
                "111122223333",
            ),
            (
                EntityKind::EmailIdentity,
                email_payload("a+aws@b.com"),
                "a+aws@b.com",
            ),
        ];
        for (kind, payload, expected) in cases {
            assert_eq!(
                lookup_path(&payload, kind.id_path()).as_deref(),
                Some(expected),
                "{kind}"
            );
        }
    }
}
