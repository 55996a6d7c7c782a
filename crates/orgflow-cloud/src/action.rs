//! Provisioning steps and the ordered plan they form

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Mutation requested by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepVerb {
    /// Create a new resource
    Create,
    /// Modify an existing resource
    Update,
    /// Delete a resource
    Delete,
}

impl std::fmt::Display for StepVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepVerb::Create => write!(f, "create"),
            StepVerb::Update => write!(f, "update"),
            StepVerb::Delete => write!(f, "delete"),
        }
    }
}

/// Kind of entity a step targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// Sub-addressed management email that must be verified first
    EmailIdentity,
    /// The organization itself
    Organization,
    /// The organization root (looked up, never created)
    Root,
    /// Organizational unit
    Unit,
    /// Member account
    Account,
    /// Position of an account under its unit
    Placement,
    /// Trusted access of an AWS service to the organization
    ServiceAccess,
    /// Account registered as delegated administrator for a service
    DelegatedAdmin,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::EmailIdentity => write!(f, "email-identity"),
            EntityKind::Organization => write!(f, "organization"),
            EntityKind::Root => write!(f, "root"),
            EntityKind::Unit => write!(f, "unit"),
            EntityKind::Account => write!(f, "account"),
            EntityKind::Placement => write!(f, "placement"),
            EntityKind::ServiceAccess => write!(f, "service-access"),
            EntityKind::DelegatedAdmin => write!(f, "delegated-admin"),
        }
    }
}

/// What dispatching a (verb, kind) pair means upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCall {
    /// Invoke the named control-plane action
    Invoke(&'static str),
    /// Nothing to send; the step completes locally
    NoOp,
    /// The control plane has no such operation
    Unsupported,
}

impl EntityKind {
    /// Dotted response path holding the entity id once the job completes
    pub fn id_path(&self) -> &'static str {
        match self {
            EntityKind::EmailIdentity => "EmailAddress",
            EntityKind::Organization => "Organization.Id",
            EntityKind::Root => "Roots.0.Id",
            EntityKind::Unit => "OrganizationalUnit.Id",
            EntityKind::Account => "AccountId",
            EntityKind::Placement => "ParentId",
            EntityKind::ServiceAccess => "ServicePrincipal",
            EntityKind::DelegatedAdmin => "AccountId",
        }
    }

    /// Control-plane action backing `verb` for this kind
    pub fn action(&self, verb: StepVerb) -> ActionCall {
        use ActionCall::*;
        match (self, verb) {
            (EntityKind::EmailIdentity, StepVerb::Delete) => NoOp,
            (EntityKind::EmailIdentity, _) => Invoke("VerifyEmailIdentity"),
            (EntityKind::Organization, StepVerb::Create) => Invoke("CreateOrganization"),
            (EntityKind::Organization, StepVerb::Update) => Invoke("DescribeOrganization"),
            (EntityKind::Organization, StepVerb::Delete) => Invoke("DeleteOrganization"),
            (EntityKind::Root, StepVerb::Delete) => NoOp,
            (EntityKind::Root, _) => Invoke("ListRoots"),
            (EntityKind::Unit, StepVerb::Create) => Invoke("CreateOrganizationalUnit"),
            (EntityKind::Unit, StepVerb::Update) => Invoke("UpdateOrganizationalUnit"),
            (EntityKind::Unit, StepVerb::Delete) => Invoke("DeleteOrganizationalUnit"),
            (EntityKind::Account, StepVerb::Create) => Invoke("CreateAccount"),
            (EntityKind::Account, StepVerb::Update) => Invoke("TagResource"),
            (EntityKind::Account, StepVerb::Delete) => Unsupported,
            (EntityKind::Placement, StepVerb::Delete) => NoOp,
            (EntityKind::Placement, _) => Invoke("MoveAccount"),
            (EntityKind::ServiceAccess, StepVerb::Delete) => Invoke("DisableAWSServiceAccess"),
            (EntityKind::ServiceAccess, _) => Invoke("EnableAWSServiceAccess"),
            (EntityKind::DelegatedAdmin, StepVerb::Delete) => {
                Invoke("DeregisterDelegatedAdministrator")
            }
            (EntityKind::DelegatedAdmin, _) => Invoke("RegisterDelegatedAdministrator"),
        }
    }
}

/// Reference to a declared entity
///
/// `path` is the slash-joined chain of names from the top of the tree, so two
/// units with the same display name under different parents stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub path: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Get the full entity key (kind:path)
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.path)
    }

    /// Last path segment, i.e. the display name
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.path)
    }
}

/// Value of a step parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    /// Known when the plan is built
    Literal(String),
    /// Entity id produced by the step with this id
    EntityId(String),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Literal(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Literal(value)
    }
}

/// A single unit of provisioning work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningStep {
    /// Stable identifier, also used as the request idempotency key
    pub id: String,

    pub verb: StepVerb,

    pub target: EntityRef,

    pub parameters: BTreeMap<String, ParamValue>,

    /// Step that must be Complete before this one is dispatched
    pub predecessor: Option<String>,

    /// Physical id of an already existing entity (Update/Delete)
    pub prior_physical_id: Option<String>,
}

impl ProvisioningStep {
    pub fn new(verb: StepVerb, target: EntityRef) -> Self {
        Self {
            id: format!("{}-{}", verb, target.key()),
            verb,
            target,
            parameters: BTreeMap::new(),
            predecessor: None,
            prior_physical_id: None,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Insert a literal parameter only when a value is present
    pub fn with_optional_param(self, name: &str, value: Option<String>) -> Self {
        match value {
            Some(v) => self.with_param(name, v),
            None => self,
        }
    }

    pub fn with_prior_physical_id(mut self, id: impl Into<String>) -> Self {
        self.prior_physical_id = Some(id.into());
        self
    }

    pub fn after(mut self, predecessor: Option<String>) -> Self {
        self.predecessor = predecessor;
        self
    }

    pub fn action(&self) -> ActionCall {
        self.target.kind.action(self.verb)
    }

    /// Ids of the steps whose entity ids this step consumes
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.parameters.values().filter_map(|v| match v {
            ParamValue::EntityId(step_id) => Some(step_id.as_str()),
            ParamValue::Literal(_) => None,
        })
    }
}

/// Fully resolved request handed to the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Id of the step being serviced
    pub step_id: String,

    pub verb: StepVerb,

    pub kind: EntityKind,

    /// Control-plane action name (e.g. "CreateAccount")
    pub action: String,

    /// Region hint for the call
    pub region: String,

    pub parameters: BTreeMap<String, String>,

    pub prior_physical_id: Option<String>,
}

impl DispatchRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Get a parameter the action cannot run without
    pub fn require(&self, name: &str) -> Result<&str> {
        self.param(name).ok_or_else(|| CloudError::MissingParameter {
            action: self.action.clone(),
            name: name.to_string(),
        })
    }

    /// Physical id for Update/Delete requests
    pub fn require_prior_id(&self) -> Result<&str> {
        self.prior_physical_id
            .as_deref()
            .ok_or_else(|| CloudError::MissingParameter {
                action: self.action.clone(),
                name: "PriorPhysicalId".to_string(),
            })
    }
}

/// Read a dotted path such as `Roots.0.Id` out of a response payload
///
/// Numeric segments index into arrays. Strings are returned as-is, numbers
/// are rendered; anything else yields `None`.
pub fn lookup_path(payload: &serde_json::Value, path: &str) -> Option<String> {
    let mut current = payload;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            serde_json::Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }

    match current {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Check that steps form a single linked chain
///
/// The first step has no predecessor, every later step names the step right
/// before it, ids are unique, and parameter references only point backwards.
pub fn validate_chain(steps: &[ProvisioningStep]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, step) in steps.iter().enumerate() {
        let expected = index.checked_sub(1).map(|i| steps[i].id.as_str());
        if step.predecessor.as_deref() != expected {
            return Err(CloudError::InvalidPlan(format!(
                "step {} must follow {:?}, found {:?}",
                step.id, expected, step.predecessor
            )));
        }

        if let Some(reference) = step.references().find(|r| !seen.contains(r)) {
            return Err(CloudError::InvalidPlan(format!(
                "step {} references {} which is not an earlier step",
                step.id, reference
            )));
        }

        if !seen.insert(step.id.as_str()) {
            return Err(CloudError::InvalidPlan(format!(
                "duplicate step id {}",
                step.id
            )));
        }
    }

    Ok(())
}

/// Ordered step chain ready to be handed to the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<ProvisioningStep>,
}

impl Plan {
    pub fn new(steps: Vec<ProvisioningStep>) -> Result<Self> {
        validate_chain(&steps)?;
        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Get steps by verb
    pub fn steps_by_verb(&self, verb: StepVerb) -> Vec<&ProvisioningStep> {
        self.steps.iter().filter(|s| s.verb == verb).collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.steps_by_verb(StepVerb::Create).len(),
            update: self.steps_by_verb(StepVerb::Update).len(),
            delete: self.steps_by_verb(StepVerb::Delete).len(),
        }
    }
}

/// Summary of planned steps
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )
    }
}
