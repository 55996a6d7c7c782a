//! Scripted control plane used by the unit tests

use crate::action::DispatchRequest;
use crate::error::{CloudError, Result};
use crate::provider::{ControlPlane, PollStatus, ResumptionToken};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Scripted = std::result::Result<PollStatus, String>;

/// Fake control plane
///
/// Tokens are `token-<step id>`. Unscripted jobs succeed on their first poll
/// with a payload carrying `id-<entity name>` under every id path, unless the
/// plane was built with `never_finish`.
#[derive(Default)]
pub(crate) struct ScriptedControlPlane {
    inner: Mutex<Inner>,
    never_finish: bool,
}

#[derive(Default)]
struct Inner {
    requests: Vec<DispatchRequest>,
    calls: Vec<String>,
    polls: usize,
    rejections: HashMap<String, String>,
    scripts: HashMap<String, VecDeque<Scripted>>,
}

impl ScriptedControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn never_finish() -> Self {
        Self {
            never_finish: true,
            ..Self::default()
        }
    }

    pub fn reject_dispatch(self, step_id: &str, message: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .rejections
            .insert(step_id.to_string(), message.to_string());
        self
    }

    pub fn with_polls(self, step_id: &str, polls: Vec<Scripted>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .insert(step_id.to_string(), polls.into());
        self
    }

    /// Step ids in dispatch order
    pub fn dispatched(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|r| r.step_id.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.inner.lock().unwrap().polls
    }

    /// Every call as `dispatch:<step id>` or `poll:<step id>`, in order
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }
}

pub(crate) fn default_payload(step_id: &str) -> serde_json::Value {
    let name = step_id.rsplit(['/', ':']).next().unwrap_or(step_id);
    let id = format!("id-{name}");
    serde_json::json!({
        "AccountId": id,
        "EmailAddress": id,
        "Organization": {"Id": id},
        "OrganizationalUnit": {"Id": id},
        "Roots": [{"Id": id}],
        "ParentId": id,
        "ServicePrincipal": id,
    })
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<ResumptionToken> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(request.clone());
        inner.calls.push(format!("dispatch:{}", request.step_id));
        if let Some(message) = inner.rejections.get(&request.step_id) {
            return Err(CloudError::ApiError(message.clone()));
        }
        Ok(ResumptionToken::new(format!("token-{}", request.step_id)))
    }

    async fn poll(&self, token: &ResumptionToken) -> Result<PollStatus> {
        let mut inner = self.inner.lock().unwrap();
        inner.polls += 1;

        let step_id = token
            .as_str()
            .strip_prefix("token-")
            .unwrap_or(token.as_str())
            .to_string();
        inner.calls.push(format!("poll:{step_id}"));

        if let Some(next) = inner.scripts.get_mut(&step_id).and_then(|s| s.pop_front()) {
            return next.map_err(CloudError::ApiError);
        }

        if self.never_finish {
            Ok(PollStatus::pending())
        } else {
            Ok(PollStatus::succeeded(default_payload(&step_id)))
        }
    }
}
