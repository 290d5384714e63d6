//! Durable checkpoints for resume after interruption.

use crate::config::GenerationConfig;
use crate::errors::PlanError;
use crate::model::WeekPlan;
use crate::run::{GenerationRun, Phase};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A durable projection of a run, written at phase boundaries.
///
/// Checkpoints exist only for resume after a process restart; during an
/// active run the in-memory aggregate is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The run id this checkpoint belongs to.
    pub session_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Phase at the time of the snapshot.
    pub phase: Phase,
    /// Run configuration.
    pub config: GenerationConfig,
    /// Week plans accumulated so far.
    pub plan_snapshot: Vec<WeekPlan>,
    /// When the checkpoint was written.
    pub updated_at: DateTime<Utc>,
    /// Set by `mark_complete` after a successful save; completed
    /// checkpoints are never offered for resume.
    pub completed: bool,
}

impl Checkpoint {
    /// Projects a checkpoint from a run snapshot.
    #[must_use]
    pub fn from_run(run: &GenerationRun) -> Self {
        Self {
            session_id: run.id,
            user_id: run.user_id,
            phase: run.phase,
            config: run.config.clone(),
            plan_snapshot: run.weeks.clone(),
            updated_at: Utc::now(),
            completed: false,
        }
    }

    /// Reconstructs an in-memory run from this checkpoint.
    #[must_use]
    pub fn into_run(self) -> GenerationRun {
        GenerationRun {
            id: self.session_id,
            user_id: self.user_id,
            config: self.config,
            phase: self.phase,
            weeks: self.plan_snapshot,
            created_at: self.updated_at,
        }
    }
}

/// Keyed persistence for run checkpoints.
///
/// Writes are best-effort: callers log failures and continue, because the
/// in-memory pipeline is the source of truth while it is alive.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Writes or replaces the run's checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), PlanError>;

    /// Returns the most recent incomplete checkpoint for the user, if any.
    async fn load(&self, user_id: Uuid) -> Result<Option<Checkpoint>, PlanError>;

    /// Flags a checkpoint as finished without deleting it, so the plan can
    /// still be viewed after saving.
    async fn mark_complete(&self, session_id: Uuid) -> Result<(), PlanError>;

    /// Purges the checkpoint on discard.
    async fn delete(&self, session_id: Uuid) -> Result<(), PlanError>;
}

/// Concurrent in-memory checkpoint store.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    records: DashMap<Uuid, Checkpoint>,
}

impl InMemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), PlanError> {
        self.records.insert(checkpoint.session_id, checkpoint);
        Ok(())
    }

    async fn load(&self, user_id: Uuid) -> Result<Option<Checkpoint>, PlanError> {
        let newest = self
            .records
            .iter()
            .filter(|entry| entry.user_id == user_id && !entry.completed)
            .max_by_key(|entry| entry.updated_at)
            .map(|entry| entry.value().clone());
        Ok(newest)
    }

    async fn mark_complete(&self, session_id: Uuid) -> Result<(), PlanError> {
        if let Some(mut entry) = self.records.get_mut(&session_id) {
            entry.completed = true;
        }
        Ok(())
    }

    async fn delete(&self, session_id: Uuid) -> Result<(), PlanError> {
        self.records.remove(&session_id);
        Ok(())
    }
}
