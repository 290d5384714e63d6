//! The meal-plan generation pipeline.
//!
//! Drives one run end to end: sequential week streaming, concurrent per-meal
//! enrichment with tracked image tasks, bounded waits at the phase boundary,
//! checkpointing, save, discard, cancel, and resume.

use crate::cancellation::{CancellationToken, TaskSet};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::{EnrichmentPreferences, GenerationConfig, PipelineTimeouts};
use crate::enrich::EnrichmentCoordinator;
use crate::errors::PlanError;
use crate::events::{EventSink, NoOpEventSink, PlanEvent};
use crate::model::WeekPlan;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::run::{GenerationRun, Phase, RunHandle};
use crate::services::{
    ImageGenerationService, PlanRepository, PlanStreamService, RecipeDetailService,
    WeekStreamRequest,
};
use crate::stream::StreamIngestor;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The external collaborators a pipeline drives.
#[derive(Clone)]
pub struct PlanServices {
    /// Per-week generation stream.
    pub stream: Arc<dyn PlanStreamService>,
    /// Recipe-detail generation.
    pub recipes: Arc<dyn RecipeDetailService>,
    /// Recipe-image generation.
    pub images: Arc<dyn ImageGenerationService>,
    /// Final plan persistence.
    pub repository: Arc<dyn PlanRepository>,
}

impl PlanServices {
    /// Bundles the four collaborators.
    #[must_use]
    pub fn new(
        stream: Arc<dyn PlanStreamService>,
        recipes: Arc<dyn RecipeDetailService>,
        images: Arc<dyn ImageGenerationService>,
        repository: Arc<dyn PlanRepository>,
    ) -> Self {
        Self {
            stream,
            recipes,
            images,
            repository,
        }
    }
}

/// Orchestrates meal-plan generation for one user session.
///
/// At most one run is active at a time. All state lives behind interior
/// mutability so `cancel` can be called from another task while `start` is
/// awaiting a stream.
pub struct MealPlanPipeline {
    services: PlanServices,
    checkpoints: Arc<dyn CheckpointStore>,
    events: Arc<dyn EventSink>,
    timeouts: PipelineTimeouts,
    progress: Arc<ProgressTracker>,
    run: RunHandle,
    token: RwLock<Arc<CancellationToken>>,
    enrich_tasks: RwLock<Arc<TaskSet>>,
    image_tasks: RwLock<Arc<TaskSet>>,
}

impl MealPlanPipeline {
    /// Creates an idle pipeline in the configuration phase.
    #[must_use]
    pub fn new(services: PlanServices, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            services,
            checkpoints,
            events: Arc::new(NoOpEventSink),
            timeouts: PipelineTimeouts::default(),
            progress: Arc::new(ProgressTracker::new()),
            run: RunHandle::new(idle_run()),
            token: RwLock::new(CancellationToken::new()),
            enrich_tasks: RwLock::new(Arc::new(TaskSet::new())),
            image_tasks: RwLock::new(Arc::new(TaskSet::new())),
        }
    }

    /// Installs an event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Overrides the bounded-wait timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: PipelineTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Returns a snapshot of the current run.
    #[must_use]
    pub fn run(&self) -> GenerationRun {
        self.run.snapshot()
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.run.phase()
    }

    /// Returns the current progress snapshot.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot(self.run.phase())
    }

    /// Runs one generation attempt end to end.
    ///
    /// Streams weeks sequentially, fanning each merged day out to concurrent
    /// enrichment, then holds at the enrichment boundary until the bounded
    /// waits settle. Returns the run snapshot in `RecipeDetailsValidation`,
    /// ready for [`save`](Self::save) or [`discard`](Self::discard).
    ///
    /// A week stream failure (including quota exhaustion) drops the failed
    /// week, keeps completed weeks intact, and fails the run back to the
    /// configuration phase.
    pub async fn start(
        &self,
        user_id: Uuid,
        config: GenerationConfig,
        preferences: &EnrichmentPreferences,
    ) -> Result<GenerationRun, PlanError> {
        config.validate()?;
        let inventory_id = config.inventory_id.ok_or_else(|| {
            PlanError::invalid_configuration("a source inventory must be selected")
        })?;

        let phase = self.run.phase();
        if phase != Phase::Configuration && !phase.is_terminal() {
            return Err(PlanError::invalid_configuration(
                "a generation run is already active",
            ));
        }

        let run = GenerationRun::new(user_id, config.clone());
        let total_days = run.total_days();
        let total_meals = run.total_meals();
        info!(run_id = %run.id, weeks = config.week_count, "generation run started");
        self.run.replace(run);
        self.progress.reset(total_days, total_meals, total_meals);

        let token = CancellationToken::new();
        *self.token.write() = token.clone();
        let enrich_tasks = Arc::new(TaskSet::new());
        *self.enrich_tasks.write() = enrich_tasks.clone();
        let image_tasks = Arc::new(TaskSet::new());
        *self.image_tasks.write() = image_tasks.clone();

        self.transition(Phase::Generating).await;
        self.write_checkpoint().await;

        let coordinator = Arc::new(EnrichmentCoordinator::new(
            self.run.clone(),
            self.services.recipes.clone(),
            self.services.images.clone(),
            self.progress.clone(),
            self.events.clone(),
            token.clone(),
            image_tasks.clone(),
        ));
        let ingestor = StreamIngestor::new(
            self.run.clone(),
            self.progress.clone(),
            self.events.clone(),
        );

        for week_number in 1..=config.week_count {
            if token.is_cancelled() {
                return Err(PlanError::Cancelled(token.reason().unwrap_or_default()));
            }

            let week_start = config.week_start(week_number);
            self.run.push_week(WeekPlan::new(week_number, week_start));

            let request = WeekStreamRequest {
                user_id,
                week_number,
                start_date: week_start,
                inventory_id,
                batch_cooking: config.batch_cooking,
            };
            let stream = match self.services.stream.open_week_stream(&request).await {
                Ok(stream) => stream,
                Err(err) => return self.fail_streaming(week_number, err).await,
            };

            let result = ingestor
                .ingest_week(week_number, stream, &token, |day| {
                    let coordinator = coordinator.clone();
                    let preferences = preferences.clone();
                    enrich_tasks.spawn(async move {
                        coordinator.enrich_day(&day, &preferences).await;
                    });
                })
                .await;

            match result {
                Ok(()) => self.write_checkpoint().await,
                Err(err @ PlanError::Cancelled(_)) => return Err(err),
                Err(err) => return self.fail_streaming(week_number, err).await,
            }
        }

        self.transition(Phase::Validation).await;
        self.write_checkpoint().await;
        self.transition(Phase::RecipeDetailsGenerating).await;

        // Detail calls are required; wait until every spawned enrichment
        // settled (success or absorbed failure), then abort stragglers.
        let outcome = enrich_tasks.join_all(self.timeouts.recipe_wait).await;
        if !outcome.all_completed() {
            warn!(
                aborted = outcome.aborted,
                "recipe enrichment timed out, continuing with completed meals"
            );
        }

        // Images are best-effort: only enriched meals have an image call in
        // flight, and the wait is short. Timing out is advancement, not
        // cancellation.
        let enriched = self.progress.snapshot(Phase::RecipeDetailsGenerating);
        self.progress.set_total_images(enriched.meals_enriched);
        let images_done = self
            .progress
            .wait_until(
                |s| s.images_generated >= s.total_images,
                self.timeouts.image_wait,
            )
            .await;
        if !images_done {
            warn!("image generation timed out, some meals stay without images");
        }
        image_tasks.join_all(self.timeouts.cancel_grace).await;

        if token.is_cancelled() {
            return Err(PlanError::Cancelled(token.reason().unwrap_or_default()));
        }

        self.transition(Phase::RecipeDetailsValidation).await;
        self.write_checkpoint().await;
        Ok(self.run.snapshot())
    }

    /// Cancels the active run.
    ///
    /// All-or-nothing: after the bounded grace period the run is marked
    /// cancelled and every accumulated week plan is discarded, including
    /// already-enriched meals.
    pub async fn cancel(&self, reason: impl Into<String>) {
        let token = self.token.read().clone();
        token.cancel(reason);

        let enrich_tasks = self.enrich_tasks.read().clone();
        let image_tasks = self.image_tasks.read().clone();
        enrich_tasks.join_all(self.timeouts.cancel_grace).await;
        image_tasks.join_all(self.timeouts.cancel_grace).await;

        let session_id = self.run.id();
        self.run.set_phase(Phase::Cancelled);
        self.run.clear_weeks();
        if let Err(err) = self.checkpoints.delete(session_id).await {
            warn!(error = %err, "checkpoint delete failed on cancel");
        }

        info!(run_id = %session_id, "generation run cancelled");
        self.emit_phase(Phase::Cancelled).await;
    }

    /// Persists every accumulated week through the repository.
    ///
    /// Allowed only from a validation phase. Weeks are saved sequentially
    /// with no rollback: a failure surfaces a retryable
    /// [`PlanError::Persistence`] carrying how many weeks already landed,
    /// and leaves the in-memory run unchanged. On success the checkpoint is
    /// marked complete but the run stays viewable in the `Saved` phase.
    pub async fn save(&self, with_details: bool) -> Result<(), PlanError> {
        let snapshot = self.run.snapshot();
        if !snapshot.phase.is_validation() {
            return Err(PlanError::invalid_configuration(format!(
                "cannot save from the {} phase",
                snapshot.phase
            )));
        }

        let mut weeks_saved = 0u32;
        for week in &snapshot.weeks {
            self.services
                .repository
                .save_week(snapshot.user_id, week, with_details)
                .await
                .map_err(|err| PlanError::persistence(err.to_string(), weeks_saved))?;
            weeks_saved += 1;
        }

        if let Err(err) = self.checkpoints.mark_complete(snapshot.id).await {
            warn!(error = %err, "checkpoint completion flag failed");
        }

        self.run.set_phase(Phase::Saved);
        info!(run_id = %snapshot.id, weeks = weeks_saved, "generation run saved");
        self.events.emit(PlanEvent::RunSaved { weeks: weeks_saved }).await;
        Ok(())
    }

    /// Discards the accumulated plan and returns to configuration.
    ///
    /// Idempotent; deletes the checkpoint.
    pub async fn discard(&self) {
        let session_id = self.run.id();
        self.run.set_phase(Phase::Discarded);
        self.run.clear_weeks();
        if let Err(err) = self.checkpoints.delete(session_id).await {
            warn!(error = %err, "checkpoint delete failed on discard");
        }
        self.emit_phase(Phase::Discarded).await;

        self.run.set_phase(Phase::Configuration);
        self.emit_phase(Phase::Configuration).await;
    }

    /// Reconstructs the run from the user's most recent incomplete
    /// checkpoint.
    ///
    /// Restores the plan snapshot and progress counters; week streams are
    /// not reopened. Returns `None` when there is nothing to resume.
    pub async fn resume(&self, user_id: Uuid) -> Result<Option<GenerationRun>, PlanError> {
        let Some(checkpoint) = self.checkpoints.load(user_id).await? else {
            return Ok(None);
        };

        let run = checkpoint.into_run();
        let days = run.weeks.iter().map(|w| w.days.len()).sum::<usize>();
        let meals = run.enriched_count();
        let images = run.image_count();

        self.progress
            .reset(run.total_days(), run.total_meals(), run.total_meals());
        self.progress
            .restore(count(days), count(meals), count(images));
        *self.token.write() = CancellationToken::new();

        info!(run_id = %run.id, phase = %run.phase, "resumed run from checkpoint");
        self.run.replace(run.clone());
        Ok(Some(run))
    }

    /// Fails the run back to configuration after a week stream error.
    async fn fail_streaming(
        &self,
        week_number: u32,
        err: PlanError,
    ) -> Result<GenerationRun, PlanError> {
        warn!(week = week_number, error = %err, "week stream failed");
        if err.is_quota() {
            self.events
                .emit(PlanEvent::QuotaExhausted {
                    operation: "plan_stream".into(),
                })
                .await;
        }

        self.enrich_tasks.read().abort_all();
        self.image_tasks.read().abort_all();
        self.run.remove_week(week_number);

        self.run.set_phase(Phase::Failed);
        self.emit_phase(Phase::Failed).await;
        self.run.set_phase(Phase::Configuration);
        self.emit_phase(Phase::Configuration).await;
        Err(err)
    }

    async fn transition(&self, phase: Phase) {
        self.run.set_phase(phase);
        self.emit_phase(phase).await;
    }

    async fn emit_phase(&self, phase: Phase) {
        let snapshot = self.progress.snapshot(phase);
        self.events
            .emit(PlanEvent::PhaseChanged {
                phase,
                overall_percent: snapshot.overall_percent,
            })
            .await;
    }

    async fn write_checkpoint(&self) {
        let checkpoint = Checkpoint::from_run(&self.run.snapshot());
        if let Err(err) = self.checkpoints.save(checkpoint).await {
            warn!(error = %err, "checkpoint write failed, continuing");
        }
    }
}

impl std::fmt::Debug for MealPlanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MealPlanPipeline")
            .field("run", &self.run)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

fn idle_run() -> GenerationRun {
    let config = GenerationConfig {
        inventory_id: None,
        week_count: 0,
        batch_cooking: false,
        start_date: chrono::NaiveDate::default(),
    };
    GenerationRun::new(Uuid::nil(), config)
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
