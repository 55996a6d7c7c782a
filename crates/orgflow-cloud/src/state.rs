//! Provisioning results and their persistence
//!
//! Manages the `.orgflow/state.json` file which records, per step, how far
//! provisioning got. A later invocation hands the loaded result back to the
//! orchestrator to resume.

use crate::error::{CloudError, Result, StepError};
use crate::orchestrator::Checkpoint;
use crate::provider::ResumptionToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".orgflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TEMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Status of a step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Dispatched, outcome not yet known
    Pending,
    /// Finished successfully; entity id available
    Complete,
    /// Finished with an error
    Failed,
    /// Never dispatched because an earlier step failed
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Complete => write!(f, "complete"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// What is known about one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position of the step in the chain
    pub index: usize,

    /// Entity key (kind:path) of the target
    pub entity: String,

    pub status: StepStatus,

    /// Physical id, set once the step is Complete
    pub entity_id: Option<String>,

    /// Token of the dispatched job, kept so a later run can resume polling
    pub resumption_token: Option<ResumptionToken>,

    /// Polls issued during the last invocation
    #[serde(default)]
    pub attempts: u32,

    pub error: Option<StepError>,

    pub updated_at: DateTime<Utc>,
}

impl StepRecord {
    fn new(index: usize, entity: impl Into<String>, status: StepStatus) -> Self {
        Self {
            index,
            entity: entity.into(),
            status,
            entity_id: None,
            resumption_token: None,
            attempts: 0,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn pending(index: usize, entity: impl Into<String>, token: ResumptionToken) -> Self {
        let mut record = Self::new(index, entity, StepStatus::Pending);
        record.resumption_token = Some(token);
        record
    }

    pub fn complete(index: usize, entity: impl Into<String>, entity_id: Option<String>) -> Self {
        let mut record = Self::new(index, entity, StepStatus::Complete);
        record.entity_id = entity_id;
        record
    }

    pub fn failed(index: usize, entity: impl Into<String>, error: StepError) -> Self {
        let mut record = Self::new(index, entity, StepStatus::Failed);
        record.error = Some(error);
        record
    }

    pub fn skipped(index: usize, entity: impl Into<String>) -> Self {
        Self::new(index, entity, StepStatus::Skipped)
    }

    pub fn with_token(mut self, token: Option<ResumptionToken>) -> Self {
        self.resumption_token = token;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Token to resume polling with instead of dispatching again
    pub fn resumable_token(&self) -> Option<&ResumptionToken> {
        let resumable = match self.status {
            StepStatus::Pending => true,
            StepStatus::Failed => self.error.as_ref().is_some_and(StepError::is_resumable),
            StepStatus::Complete | StepStatus::Skipped => false,
        };
        if resumable {
            self.resumption_token.as_ref()
        } else {
            None
        }
    }

    /// Caller-facing view of the record
    pub fn outcome(&self) -> StepOutcome {
        StepOutcome {
            complete: self.status == StepStatus::Complete,
            entity_id: self.entity_id.clone(),
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Per-step result handed to the surrounding infrastructure layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tree-wide provisioning result, keyed by step id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningResult {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    pub steps: BTreeMap<String, StepRecord>,
}

impl Default for ProvisioningResult {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            steps: BTreeMap::new(),
        }
    }
}

impl ProvisioningResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the record of a step
    pub fn set(&mut self, step_id: impl Into<String>, record: StepRecord) {
        self.steps.insert(step_id.into(), record);
        self.updated_at = Utc::now();
    }

    pub fn get(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.get(step_id)
    }

    pub fn status(&self, step_id: &str) -> Option<StepStatus> {
        self.get(step_id).map(|r| r.status)
    }

    pub fn is_complete(&self, step_id: &str) -> bool {
        self.status(step_id) == Some(StepStatus::Complete)
    }

    /// Entity id produced by a Complete step
    pub fn entity_id(&self, step_id: &str) -> Option<&str> {
        self.get(step_id)
            .filter(|r| r.status == StepStatus::Complete)
            .and_then(|r| r.entity_id.as_deref())
    }

    /// Entity id looked up by entity key (kind:path)
    pub fn entity_id_for(&self, entity: &str) -> Option<&str> {
        self.steps
            .values()
            .filter(|r| r.entity == entity && r.status == StepStatus::Complete)
            .max_by_key(|r| r.index)
            .and_then(|r| r.entity_id.as_deref())
    }

    /// Records in chain order
    pub fn ordered(&self) -> Vec<(&str, &StepRecord)> {
        let mut records: Vec<_> = self
            .steps
            .iter()
            .map(|(id, record)| (id.as_str(), record))
            .collect();
        records.sort_by_key(|(_, r)| r.index);
        records
    }

    /// The failure surfaced by the run, if any
    pub fn first_failure(&self) -> Option<(&str, &StepRecord)> {
        self.ordered()
            .into_iter()
            .find(|(_, r)| r.status == StepStatus::Failed)
    }

    /// Ids of steps that were never dispatched, in chain order
    pub fn skipped(&self) -> Vec<&str> {
        self.ids_with(StepStatus::Skipped)
    }

    pub fn completed(&self) -> Vec<&str> {
        self.ids_with(StepStatus::Complete)
    }

    fn ids_with(&self, status: StepStatus) -> Vec<&str> {
        self.ordered()
            .into_iter()
            .filter(|(_, r)| r.status == status)
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether every recorded step is Complete
    pub fn is_success(&self) -> bool {
        self.steps.values().all(|r| r.status == StepStatus::Complete)
    }

    /// Caller-facing outcomes keyed by step id
    pub fn outcomes(&self) -> BTreeMap<String, StepOutcome> {
        self.steps
            .iter()
            .map(|(id, record)| (id.clone(), record.outcome()))
            .collect()
    }
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the recorded result, or an empty one if nothing was saved yet
    ///
    /// Falls back to the backup when the state file is missing or unreadable.
    pub async fn load(&self) -> Result<ProvisioningResult> {
        let path = self.state_path();
        let backup = self.backup_path();

        let primary = if path.exists() {
            Some(read_result(&path).await)
        } else {
            None
        };

        let result = match primary {
            Some(Ok(result)) => result,
            Some(Err(error)) if backup.exists() => {
                tracing::warn!(error = %error, "State file unreadable, using backup");
                read_result(&backup).await?
            }
            Some(Err(error)) => return Err(error),
            None if backup.exists() => {
                tracing::warn!("State file missing, using backup");
                read_result(&backup).await?
            }
            None => {
                tracing::debug!("State file not found, returning empty result");
                return Ok(ProvisioningResult::new());
            }
        };

        if result.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                result.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} steps", result.steps.len());
        Ok(result)
    }

    /// Save the result, keeping the previous file as a backup
    ///
    /// The new content is written to a temporary file and renamed over the
    /// state file, so a reader sees either the old or the new result.
    pub async fn save(&self, result: &ProvisioningResult) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let temp = self.state_dir().join(STATE_TEMP);

        let content = serde_json::to_string_pretty(result)?;
        let mut file = fs::File::create(&temp).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!("Saved state with {} steps", result.steps.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    ///
    /// Only one run may own a tree's result at a time. The lock file is
    /// created exclusively; a lock older than an hour is taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&lock_info)?;

        match create_exclusive(&lock_path, &content).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let held = fs::read_to_string(&lock_path).await?;
                let Ok(existing) = serde_json::from_str::<LockInfo>(&held) else {
                    return Err(CloudError::LockError(format!(
                        "State is locked ({} is being written or is corrupt)",
                        lock_path.display()
                    )));
                };

                let age = Utc::now().signed_duration_since(existing.acquired_at);
                if age.num_hours() < 1 {
                    return Err(CloudError::LockError(format!(
                        "State is locked by {} since {}",
                        existing.holder, existing.acquired_at
                    )));
                }

                tracing::warn!("Removing stale lock from {}", existing.holder);
                match fs::remove_file(&lock_path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                create_exclusive(&lock_path, &content)
                    .await
                    .map_err(|e| match e.kind() {
                        ErrorKind::AlreadyExists => CloudError::LockError(
                            "State lock was taken over by another run".to_string(),
                        ),
                        _ => CloudError::Io(e),
                    })?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

async fn read_result(path: &Path) -> Result<ProvisioningResult> {
    let content = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Create `path` with `content`, failing if it already exists
async fn create_exclusive(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await
}

#[async_trait]
impl Checkpoint for StateManager {
    async fn record(&self, result: &ProvisioningResult) -> Result<()> {
        self.save(result).await
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
