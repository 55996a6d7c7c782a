//! Sequential execution of a provisioning chain

use crate::action::{
    ActionCall, DispatchRequest, ParamValue, ProvisioningStep, StepVerb, lookup_path,
    validate_chain,
};
use crate::error::{Result, StepError};
use crate::operation::{AsyncOperation, OperationState};
use crate::poller::CompletionPoller;
use crate::provider::{ControlPlane, OrchestratorConfig};
use crate::state::{ProvisioningResult, StepRecord, StepStatus};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Sink notified after every recorded transition
///
/// Lets a host persist progress so an interrupted invocation can resume from
/// the last recorded step.
#[async_trait]
pub trait Checkpoint: Send + Sync {
    async fn record(&self, result: &ProvisioningResult) -> Result<()>;
}

/// What to do for a step once its inputs are resolved
enum Prepared {
    Dispatch(DispatchRequest),
    NoOp,
}

/// Runs a step chain strictly in order against one control plane
pub struct TreeOrchestrator {
    plane: Arc<dyn ControlPlane>,
    config: OrchestratorConfig,
    checkpoint: Option<Arc<dyn Checkpoint>>,
}

impl TreeOrchestrator {
    pub fn new(plane: Arc<dyn ControlPlane>, config: OrchestratorConfig) -> Self {
        Self {
            plane,
            config,
            checkpoint: None,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn Checkpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Provision `steps`, resuming from `prior` when given
    ///
    /// Steps already Complete in `prior` are never dispatched again. Steps
    /// recorded Pending (or timed out) resume polling their recorded job. The
    /// first failure stops the run; every later step not already Complete is
    /// marked Skipped.
    pub async fn run(
        &self,
        steps: &[ProvisioningStep],
        prior: Option<ProvisioningResult>,
    ) -> Result<ProvisioningResult> {
        validate_chain(steps)?;

        let mut result = prior.unwrap_or_default();
        let known: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();
        result.steps.retain(|id, _| known.contains(id.as_str()));

        tracing::info!(
            plane = self.plane.name(),
            steps = steps.len(),
            completed = result.completed().len(),
            "Starting provisioning run"
        );

        for (index, step) in steps.iter().enumerate() {
            if result.is_complete(&step.id) {
                tracing::debug!(step = %step.id, "Already complete");
                continue;
            }

            let status = self.execute(index, step, &mut result).await?;
            self.checkpoint(&result).await?;

            if status != StepStatus::Complete {
                let mut skipped = 0;
                for (later_index, later) in steps.iter().enumerate().skip(index + 1) {
                    // completed work is kept so a rerun does not create it again
                    if result.is_complete(&later.id) {
                        continue;
                    }
                    result.set(
                        later.id.clone(),
                        StepRecord::skipped(later_index, later.target.key()),
                    );
                    skipped += 1;
                }
                self.checkpoint(&result).await?;

                tracing::warn!(step = %step.id, skipped, "Provisioning stopped");
                return Ok(result);
            }
        }

        tracing::info!(steps = steps.len(), "Provisioning complete");
        Ok(result)
    }

    /// Drive one step to a terminal state and record it
    async fn execute(
        &self,
        index: usize,
        step: &ProvisioningStep,
        result: &mut ProvisioningResult,
    ) -> Result<StepStatus> {
        let entity = step.target.key();
        let plane = self.plane.as_ref();
        let prior_id = step
            .prior_physical_id
            .clone()
            .or_else(|| result.entity_id_for(&entity).map(str::to_string));

        let resumable = result
            .get(&step.id)
            .and_then(|r| r.resumable_token())
            .cloned();

        let mut operation = match resumable {
            Some(token) => {
                tracing::info!(step = %step.id, token = %token, "Resuming recorded job");
                AsyncOperation::resume(step.id.clone(), token)
            }
            None => match self.prepare(step, prior_id.as_deref(), result) {
                Ok(Prepared::Dispatch(request)) => AsyncOperation::start(plane, &request).await,
                Ok(Prepared::NoOp) => {
                    AsyncOperation::completed(step.id.clone(), serde_json::Value::Null)
                }
                Err(error) => {
                    tracing::warn!(
                        step = %step.id,
                        error = %error,
                        "Step rejected before dispatch"
                    );
                    AsyncOperation::failed(step.id.clone(), error)
                }
            },
        };

        if let Some(token) = operation.token() {
            if !operation.state().is_terminal() {
                result.set(
                    step.id.clone(),
                    StepRecord::pending(index, entity.clone(), token.clone()),
                );
                self.checkpoint(result).await?;
            }
        }

        let poller = CompletionPoller::from_policy(self.config.policy_for(step.target.kind));
        let state = poller.wait_for_completion(&mut operation, plane).await;

        let record = match state {
            OperationState::Complete { payload } => {
                match extract_entity_id(step, &payload, prior_id) {
                    Ok(entity_id) => {
                        tracing::info!(step = %step.id, entity_id = ?entity_id, "Step complete");
                        StepRecord::complete(index, entity, entity_id)
                    }
                    Err(error) => StepRecord::failed(index, entity, error),
                }
            }
            OperationState::Failed { error } => {
                tracing::warn!(step = %step.id, error = %error, "Step failed");
                StepRecord::failed(index, entity, error)
            }
            OperationState::Pending => StepRecord::failed(
                index,
                entity,
                StepError::PollTimeout {
                    attempts: operation.attempts(),
                },
            ),
        }
        .with_token(operation.token().cloned())
        .with_attempts(operation.attempts());

        let status = record.status;
        result.set(step.id.clone(), record);
        Ok(status)
    }

    /// Resolve parameters and decide whether anything goes upstream
    fn prepare(
        &self,
        step: &ProvisioningStep,
        prior_id: Option<&str>,
        result: &ProvisioningResult,
    ) -> std::result::Result<Prepared, StepError> {
        let action = match step.action() {
            ActionCall::Invoke(action) => action,
            ActionCall::NoOp => return Ok(Prepared::NoOp),
            ActionCall::Unsupported => {
                return Err(StepError::Validation(format!(
                    "{} is not supported for {}",
                    step.verb, step.target.kind
                )));
            }
        };

        if step.verb == StepVerb::Delete && prior_id.is_none() {
            tracing::warn!(
                step = %step.id,
                "Entity was never created, not sending delete upstream"
            );
            return Ok(Prepared::NoOp);
        }

        let mut parameters = BTreeMap::new();
        for (name, value) in &step.parameters {
            let resolved = match value {
                ParamValue::Literal(literal) => literal.clone(),
                ParamValue::EntityId(source) => result
                    .entity_id(source)
                    .ok_or_else(|| {
                        StepError::Validation(format!(
                            "parameter {} needs the id produced by {}, which has not completed",
                            name, source
                        ))
                    })?
                    .to_string(),
            };
            parameters.insert(name.clone(), resolved);
        }

        Ok(Prepared::Dispatch(DispatchRequest {
            step_id: step.id.clone(),
            verb: step.verb,
            kind: step.target.kind,
            action: action.to_string(),
            region: self.config.region.clone(),
            parameters,
            prior_physical_id: prior_id.map(str::to_string),
        }))
    }

    async fn checkpoint(&self, result: &ProvisioningResult) -> Result<()> {
        if let Some(checkpoint) = &self.checkpoint {
            checkpoint.record(result).await?;
        }
        Ok(())
    }
}

/// Apply the per-kind extraction rule to a completed job's payload
fn extract_entity_id(
    step: &ProvisioningStep,
    payload: &serde_json::Value,
    prior_id: Option<String>,
) -> std::result::Result<Option<String>, StepError> {
    if step.verb == StepVerb::Delete {
        return Ok(prior_id);
    }

    let path = step.target.kind.id_path();
    lookup_path(payload, path)
        .map(Some)
        .ok_or_else(|| StepError::ExternalFailure(format!("response is missing {}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{EntityKind, EntityRef};
    use crate::provider::{PollPolicy, PollStatus};
    use crate::testing::{ScriptedControlPlane, default_payload};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn config() -> OrchestratorConfig {
        OrchestratorConfig::default().with_interval(Duration::ZERO)
    }

    fn orchestrator(plane: &Arc<ScriptedControlPlane>) -> TreeOrchestrator {
        TreeOrchestrator::new(plane.clone(), config())
    }

    /// SDLC, Account1, Account2, Prod, Account3 with parent references
    fn chain() -> Vec<ProvisioningStep> {
        let sdlc = ProvisioningStep::new(StepVerb::Create, EntityRef::new(EntityKind::Unit, "SDLC"))
            .with_param("Name", "SDLC")
            .with_param("ParentId", "r-root");
        let account1 = ProvisioningStep::new(
            StepVerb::Create,
            EntityRef::new(EntityKind::Account, "SDLC/Account1"),
        )
        .with_param("ParentId", ParamValue::EntityId(sdlc.id.clone()))
        .after(Some(sdlc.id.clone()));
        let account2 = ProvisioningStep::new(
            StepVerb::Create,
            EntityRef::new(EntityKind::Account, "SDLC/Account2"),
        )
        .with_param("ParentId", ParamValue::EntityId(sdlc.id.clone()))
        .after(Some(account1.id.clone()));
        let prod = ProvisioningStep::new(StepVerb::Create, EntityRef::new(EntityKind::Unit, "Prod"))
            .with_param("Name", "Prod")
            .with_param("ParentId", "r-root")
            .after(Some(account2.id.clone()));
        let account3 = ProvisioningStep::new(
            StepVerb::Create,
            EntityRef::new(EntityKind::Account, "Prod/Account3"),
        )
        .with_param("ParentId", ParamValue::EntityId(prod.id.clone()))
        .after(Some(prod.id.clone()));

        vec![sdlc, account1, account2, prod, account3]
    }

    fn ids(steps: &[ProvisioningStep]) -> Vec<String> {
        steps.iter().map(|s| s.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_run_completes_in_order() {
        let plane = Arc::new(ScriptedControlPlane::new());
        let steps = chain();

        let result = orchestrator(&plane).run(&steps, None).await.unwrap();

        assert!(result.is_success());
        assert_eq!(plane.dispatched(), ids(&steps));
        assert_eq!(result.entity_id("create-unit:SDLC"), Some("id-SDLC"));
        assert_eq!(
            result.entity_id("create-account:SDLC/Account1"),
            Some("id-Account1")
        );
    }

    #[tokio::test]
    async fn test_parent_reference_resolved_from_completed_step() {
        let plane = Arc::new(ScriptedControlPlane::new());

        orchestrator(&plane).run(&chain(), None).await.unwrap();

        let requests = plane.requests();
        assert_eq!(requests[1].param("ParentId"), Some("id-SDLC"));
        assert_eq!(requests[4].param("ParentId"), Some("id-Prod"));
        assert_eq!(requests[0].param("ParentId"), Some("r-root"));
        assert!(requests.iter().all(|r| r.region == "us-east-1"));
        assert_eq!(requests[1].action, "CreateAccount");
    }

    #[tokio::test]
    async fn test_failure_at_each_index_skips_the_rest() {
        let steps = chain();
        for k in 0..steps.len() {
            let plane = Arc::new(
                ScriptedControlPlane::new()
                    .with_polls(&steps[k].id, vec![Ok(PollStatus::failed("boom"))]),
            );

            let result = orchestrator(&plane).run(&steps, None).await.unwrap();

            for (i, step) in steps.iter().enumerate() {
                let expected = match i.cmp(&k) {
                    std::cmp::Ordering::Less => StepStatus::Complete,
                    std::cmp::Ordering::Equal => StepStatus::Failed,
                    std::cmp::Ordering::Greater => StepStatus::Skipped,
                };
                assert_eq!(result.status(&step.id), Some(expected), "k={k} i={i}");
            }
            assert_eq!(plane.dispatched(), ids(&steps[..=k]));
            assert_eq!(
                result.first_failure().unwrap().1.error,
                Some(StepError::ExternalFailure("boom".to_string()))
            );
            assert_eq!(result.skipped().len(), steps.len() - k - 1);
        }
    }

    #[tokio::test]
    async fn test_dispatch_rejection_halts_chain() {
        let steps = chain();
        let plane = Arc::new(
            ScriptedControlPlane::new().reject_dispatch(&steps[1].id, "ConstraintViolation"),
        );

        let result = orchestrator(&plane).run(&steps, None).await.unwrap();

        let record = result.get(&steps[1].id).unwrap();
        assert!(matches!(record.error, Some(StepError::Dispatch(_))));
        assert!(record.resumption_token.is_none());
        assert_eq!(plane.dispatched().len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_does_not_redispatch_complete_steps() {
        let steps = chain();
        let failing = Arc::new(
            ScriptedControlPlane::new().reject_dispatch(&steps[3].id, "TooManyRequests"),
        );
        let partial = orchestrator(&failing).run(&steps, None).await.unwrap();
        assert_eq!(partial.completed().len(), 3);

        let plane = Arc::new(ScriptedControlPlane::new());
        let result = orchestrator(&plane)
            .run(&steps, Some(partial.clone()))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(plane.dispatched(), ids(&steps[3..]));
        // earlier ids are still usable as parents
        assert_eq!(plane.requests()[1].param("ParentId"), Some("id-Prod"));

        // a third run has nothing left to do
        let idle = Arc::new(ScriptedControlPlane::new());
        orchestrator(&idle).run(&steps, Some(result)).await.unwrap();
        assert!(idle.dispatched().is_empty());
        assert_eq!(idle.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_poll_timeout_resumes_recorded_job() {
        let steps = chain();
        let slow = Arc::new(ScriptedControlPlane::never_finish());
        let config = config().with_policy(EntityKind::Unit, PollPolicy::new(Duration::ZERO, 2));

        let partial = TreeOrchestrator::new(slow.clone(), config)
            .run(&steps, None)
            .await
            .unwrap();
        let record = partial.get(&steps[0].id).unwrap();
        assert_eq!(record.error, Some(StepError::PollTimeout { attempts: 2 }));
        assert_eq!(slow.poll_count(), 2);

        let plane = Arc::new(ScriptedControlPlane::new());
        let result = orchestrator(&plane).run(&steps, Some(partial)).await.unwrap();

        assert!(result.is_success());
        // the unit job is polled, not dispatched a second time
        assert_eq!(plane.dispatched(), ids(&steps[1..]));
        assert_eq!(plane.calls()[0], format!("poll:{}", steps[0].id));
    }

    #[tokio::test]
    async fn test_transport_errors_poll_again_without_dispatch() {
        let steps = chain();
        let plane = Arc::new(ScriptedControlPlane::new().with_polls(
            &steps[0].id,
            vec![
                Err("Throttling".to_string()),
                Err("connection reset".to_string()),
                Ok(PollStatus::succeeded(default_payload(&steps[0].id))),
            ],
        ));

        let result = orchestrator(&plane).run(&steps[..2], None).await.unwrap();

        assert!(result.is_success());
        let unit = &steps[0].id;
        let account = &steps[1].id;
        assert_eq!(
            plane.calls(),
            vec![
                format!("dispatch:{unit}"),
                format!("poll:{unit}"),
                format!("poll:{unit}"),
                format!("poll:{unit}"),
                format!("dispatch:{account}"),
                format!("poll:{account}"),
            ]
        );
        assert_eq!(result.get(unit).unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn test_failure_keeps_later_completed_steps() {
        let steps = chain();
        let mut prior = ProvisioningResult::new();
        prior.set(
            steps[0].id.clone(),
            StepRecord::complete(0, steps[0].target.key(), Some("id-SDLC".to_string())),
        );
        prior.set(
            steps[2].id.clone(),
            StepRecord::complete(2, steps[2].target.key(), Some("id-Account2".to_string())),
        );

        let failing = Arc::new(
            ScriptedControlPlane::new().reject_dispatch(&steps[1].id, "TooManyRequests"),
        );
        let partial = orchestrator(&failing)
            .run(&steps, Some(prior))
            .await
            .unwrap();

        assert_eq!(partial.status(&steps[1].id), Some(StepStatus::Failed));
        assert_eq!(partial.status(&steps[2].id), Some(StepStatus::Complete));
        assert_eq!(partial.entity_id(&steps[2].id), Some("id-Account2"));
        assert_eq!(partial.skipped(), vec![steps[3].id.as_str(), steps[4].id.as_str()]);
        assert_eq!(failing.dispatched(), vec![steps[1].id.clone()]);

        let plane = Arc::new(ScriptedControlPlane::new());
        let result = orchestrator(&plane).run(&steps, Some(partial)).await.unwrap();

        assert!(result.is_success());
        assert_eq!(
            plane.dispatched(),
            vec![steps[1].id.clone(), steps[3].id.clone(), steps[4].id.clone()]
        );
        assert_eq!(result.entity_id(&steps[2].id), Some("id-Account2"));
    }

    #[tokio::test]
    async fn test_pending_record_resumes_without_dispatch() {
        let steps = chain();
        let mut prior = ProvisioningResult::new();
        prior.set(
            steps[0].id.clone(),
            StepRecord::pending(
                0,
                "unit:SDLC",
                crate::provider::ResumptionToken::new(format!("token-{}", steps[0].id)),
            ),
        );

        let plane = Arc::new(ScriptedControlPlane::new());
        let result = orchestrator(&plane).run(&steps, Some(prior)).await.unwrap();

        assert!(result.is_success());
        assert!(!plane.dispatched().contains(&steps[0].id));
    }

    #[tokio::test]
    async fn test_missing_id_in_payload_fails_step() {
        let steps = chain();
        let plane = Arc::new(ScriptedControlPlane::new().with_polls(
            &steps[0].id,
            vec![Ok(PollStatus::succeeded(json!({"Unexpected": true})))],
        ));

        let result = orchestrator(&plane).run(&steps, None).await.unwrap();

        assert_eq!(
            result.get(&steps[0].id).unwrap().error,
            Some(StepError::ExternalFailure(
                "response is missing OrganizationalUnit.Id".to_string()
            ))
        );
        assert_eq!(plane.dispatched().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_of_uncreated_entity_is_not_sent() {
        let step = ProvisioningStep::new(StepVerb::Delete, EntityRef::new(EntityKind::Unit, "Old"));
        let plane = Arc::new(ScriptedControlPlane::new());

        let result = orchestrator(&plane).run(&[step.clone()], None).await.unwrap();

        assert!(plane.dispatched().is_empty());
        assert_eq!(result.status(&step.id), Some(StepStatus::Complete));
        assert_eq!(result.entity_id(&step.id), None);
    }

    #[tokio::test]
    async fn test_delete_of_existing_entity_is_dispatched() {
        let step = ProvisioningStep::new(StepVerb::Delete, EntityRef::new(EntityKind::Unit, "Old"))
            .with_prior_physical_id("ou-old");
        let plane = Arc::new(ScriptedControlPlane::new());

        let result = orchestrator(&plane).run(&[step.clone()], None).await.unwrap();

        let requests = plane.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].action, "DeleteOrganizationalUnit");
        assert_eq!(requests[0].prior_physical_id.as_deref(), Some("ou-old"));
        assert_eq!(result.entity_id(&step.id), Some("ou-old"));
    }

    #[tokio::test]
    async fn test_account_delete_is_validation_error() {
        let step = ProvisioningStep::new(
            StepVerb::Delete,
            EntityRef::new(EntityKind::Account, "SDLC/Account1"),
        )
        .with_prior_physical_id("111122223333");
        let plane = Arc::new(ScriptedControlPlane::new());

        let result = orchestrator(&plane).run(&[step.clone()], None).await.unwrap();

        assert!(matches!(
            result.get(&step.id).unwrap().error,
            Some(StepError::Validation(_))
        ));
        assert!(plane.dispatched().is_empty());
    }

    #[tokio::test]
    async fn test_broken_chain_rejected_before_dispatch() {
        let mut steps = chain();
        steps[2].predecessor = None;
        let plane = Arc::new(ScriptedControlPlane::new());

        assert!(orchestrator(&plane).run(&steps, None).await.is_err());
        assert!(plane.dispatched().is_empty());
    }

    #[derive(Default)]
    struct RecordingCheckpoint {
        snapshots: Mutex<Vec<ProvisioningResult>>,
    }

    #[async_trait]
    impl Checkpoint for RecordingCheckpoint {
        async fn record(&self, result: &ProvisioningResult) -> Result<()> {
            self.snapshots.lock().unwrap().push(result.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_checkpoint_sees_pending_before_completion() {
        let steps = chain();
        let plane = Arc::new(ScriptedControlPlane::new());
        let checkpoint = Arc::new(RecordingCheckpoint::default());

        orchestrator(&plane)
            .with_checkpoint(checkpoint.clone())
            .run(&steps[..1], None)
            .await
            .unwrap();

        let snapshots = checkpoint.snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].status(&steps[0].id), Some(StepStatus::Pending));
        assert_eq!(snapshots[1].status(&steps[0].id), Some(StepStatus::Complete));
    }
}
