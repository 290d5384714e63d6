//! Concurrent per-meal enrichment: recipe details plus image generation.

use crate::cancellation::{CancellationToken, TaskSet};
use crate::config::EnrichmentPreferences;
use crate::errors::PlanError;
use crate::events::{EventSink, PlanEvent};
use crate::model::{Day, DetailedRecipe, Meal};
use crate::progress::ProgressTracker;
use crate::run::RunHandle;
use crate::services::{
    image_signature, ImageGenerationService, ImageRequest, RecipeDetailRequest,
    RecipeDetailService,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fans out recipe-detail requests for each meal of a day, then launches a
/// tracked image-generation task for every successfully enriched meal.
///
/// Failure policy: a 402 surfaces as a distinguished quota event and leaves
/// the meal unenriched; any other per-meal failure is logged and absorbed
/// without failing the day. Results arriving after cancellation are dropped
/// before they touch the run.
pub struct EnrichmentCoordinator {
    run: RunHandle,
    recipes: Arc<dyn RecipeDetailService>,
    images: Arc<dyn ImageGenerationService>,
    progress: Arc<ProgressTracker>,
    events: Arc<dyn EventSink>,
    token: Arc<CancellationToken>,
    image_tasks: Arc<TaskSet>,
}

impl EnrichmentCoordinator {
    /// Creates a coordinator bound to one run.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run: RunHandle,
        recipes: Arc<dyn RecipeDetailService>,
        images: Arc<dyn ImageGenerationService>,
        progress: Arc<ProgressTracker>,
        events: Arc<dyn EventSink>,
        token: Arc<CancellationToken>,
        image_tasks: Arc<TaskSet>,
    ) -> Self {
        Self {
            run,
            recipes,
            images,
            progress,
            events,
            token,
            image_tasks,
        }
    }

    /// Enriches every unenriched meal of the day concurrently.
    ///
    /// Bounded by the day's meal count; weeks are processed sequentially
    /// upstream, so this is also the peak number of outstanding detail
    /// requests.
    pub async fn enrich_day(&self, day: &Day, preferences: &EnrichmentPreferences) {
        if self.token.is_cancelled() {
            return;
        }

        let pending: Vec<&Meal> = day.meals.iter().filter(|m| !m.recipe_generated).collect();
        futures::future::join_all(
            pending
                .into_iter()
                .map(|meal| self.enrich_meal(meal, preferences)),
        )
        .await;
    }

    async fn enrich_meal(&self, meal: &Meal, preferences: &EnrichmentPreferences) {
        if self.token.is_cancelled() {
            return;
        }

        let request = RecipeDetailRequest {
            user_id: self.run.snapshot().user_id,
            meal_id: meal.id,
            meal_title: meal.name.clone(),
            main_ingredients: meal.main_ingredients.clone(),
            preferences: preferences.clone(),
            meal_type: meal.meal_type,
            target_calories: preferences.target_calories.or(meal.calories),
        };

        match self.recipes.generate_recipe(&request).await {
            Ok(mut recipe) => {
                // Mutations are checked against the token before application,
                // so nothing lands after cancel() resolves.
                if self.token.is_cancelled() {
                    return;
                }
                if recipe.image_signature.is_empty() {
                    recipe.image_signature =
                        image_signature(&recipe.title, &recipe.ingredients);
                }

                if self.run.attach_recipe(meal.id, recipe.clone()) {
                    self.progress.record_meal();
                    self.events.try_emit(PlanEvent::MealEnriched { meal_id: meal.id });
                    self.events.try_emit(PlanEvent::ProgressUpdated(
                        self.progress.snapshot(self.run.phase()),
                    ));
                    self.spawn_image_task(meal.id, recipe);
                } else {
                    // The slot was replaced by a later stream emission; the
                    // stale result is dropped and the new meal's own
                    // enrichment will account for the slot.
                    debug!(meal_id = %meal.id, "stale enrichment result dropped");
                }
            }
            Err(err) if err.is_quota() => {
                warn!(meal_id = %meal.id, "recipe detail quota exhausted");
                self.events.try_emit(PlanEvent::QuotaExhausted {
                    operation: "recipe_detail".into(),
                });
            }
            Err(err) => {
                warn!(meal_id = %meal.id, error = %err, "recipe detail failed, meal left unenriched");
            }
        }
    }

    /// Launches image generation as a tracked background task.
    ///
    /// The task never blocks recipe completion. Failures still bump the
    /// image counter so the bounded image wait cannot hang on one bad call.
    fn spawn_image_task(&self, meal_id: uuid::Uuid, recipe: DetailedRecipe) {
        if self.token.is_cancelled() {
            return;
        }

        let run = self.run.clone();
        let images = self.images.clone();
        let progress = self.progress.clone();
        let events = self.events.clone();
        let token = self.token.clone();

        self.image_tasks.spawn(async move {
            let request = ImageRequest {
                recipe_id: recipe.id,
                recipe_title: recipe.title.clone(),
                image_signature: recipe.image_signature.clone(),
                user_id: run.snapshot().user_id,
            };

            match images.generate_image(&request).await {
                Ok(response) => {
                    if token.is_cancelled() {
                        return;
                    }
                    run.attach_image(meal_id, response.image_url);
                    progress.record_image();
                    events.try_emit(PlanEvent::ImageGenerated {
                        meal_id,
                        cache_hit: response.cache_hit,
                    });
                }
                Err(err) => {
                    if token.is_cancelled() {
                        return;
                    }
                    warn!(meal_id = %meal_id, error = %err, "image generation failed");
                    progress.record_image();
                    events.try_emit(PlanEvent::ImageFailed { meal_id });
                }
            }
            events.try_emit(PlanEvent::ProgressUpdated(
                progress.snapshot(run.phase()),
            ));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::events::CollectingEventSink;
    use crate::model::{MealSkeleton, MealType, WeekPlan};
    use crate::run::{GenerationRun, Phase};
    use crate::testing::{ScriptedImageService, ScriptedRecipeService};
    use chrono::NaiveDate;
    use std::time::Duration;
    use uuid::Uuid;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    struct Harness {
        run: RunHandle,
        recipes: Arc<ScriptedRecipeService>,
        images: Arc<ScriptedImageService>,
        progress: Arc<ProgressTracker>,
        sink: Arc<CollectingEventSink>,
        token: Arc<CancellationToken>,
        image_tasks: Arc<TaskSet>,
        day: Day,
    }

    impl Harness {
        fn new() -> Self {
            let config = GenerationConfig::new(Uuid::new_v4(), 1, start());
            let run = RunHandle::new(GenerationRun::new(Uuid::new_v4(), config));
            run.set_phase(Phase::RecipeDetailsGenerating);
            run.push_week(WeekPlan::new(1, start()));

            let skeletons: Vec<_> = MealType::ALL
                .iter()
                .map(|t| (*t, MealSkeleton::new(format!("{t} dish"))))
                .collect();
            let day = run.merge_day(1, start(), &skeletons).unwrap().day;

            let progress = Arc::new(ProgressTracker::new());
            progress.reset(7, 3, 3);

            Self {
                run,
                recipes: Arc::new(ScriptedRecipeService::new()),
                images: Arc::new(ScriptedImageService::new()),
                progress,
                sink: Arc::new(CollectingEventSink::new()),
                token: CancellationToken::new(),
                image_tasks: Arc::new(TaskSet::new()),
                day,
            }
        }

        fn coordinator(&self) -> EnrichmentCoordinator {
            EnrichmentCoordinator::new(
                self.run.clone(),
                self.recipes.clone(),
                self.images.clone(),
                self.progress.clone(),
                self.sink.clone(),
                self.token.clone(),
                self.image_tasks.clone(),
            )
        }
    }

    #[tokio::test]
    async fn test_enriches_all_meals() {
        let h = Harness::new();
        let prefs = EnrichmentPreferences::new();

        h.coordinator().enrich_day(&h.day, &prefs).await;
        h.image_tasks.join_all(Duration::from_secs(1)).await;

        let snapshot = h.run.snapshot();
        assert_eq!(snapshot.enriched_count(), 3);
        assert_eq!(snapshot.image_count(), 3);
        assert_eq!(h.progress.snapshot(Phase::Generating).meals_enriched, 3);
        assert_eq!(h.progress.snapshot(Phase::Generating).images_generated, 3);
        assert_eq!(h.sink.events_named("meal.enriched").len(), 3);
    }

    #[tokio::test]
    async fn test_quota_affects_only_its_meal() {
        let h = Harness::new();
        h.recipes.quota_for("breakfast dish");
        let prefs = EnrichmentPreferences::new();

        h.coordinator().enrich_day(&h.day, &prefs).await;
        h.image_tasks.join_all(Duration::from_secs(1)).await;

        let snapshot = h.run.snapshot();
        assert_eq!(snapshot.enriched_count(), 2);
        assert_eq!(h.sink.events_named("quota.exhausted").len(), 1);

        // Breakfast is still loading, siblings proceeded.
        let week = &snapshot.weeks[0];
        let breakfast = &week.days[0].meals[0];
        assert!(!breakfast.recipe_generated);
    }

    #[tokio::test]
    async fn test_failed_meal_is_absorbed() {
        let h = Harness::new();
        h.recipes.fail_for("lunch dish");
        let prefs = EnrichmentPreferences::new();

        h.coordinator().enrich_day(&h.day, &prefs).await;
        h.image_tasks.join_all(Duration::from_secs(1)).await;

        assert_eq!(h.run.snapshot().enriched_count(), 2);
        assert!(h.sink.events_named("quota.exhausted").is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_still_counts() {
        let h = Harness::new();
        h.images.fail_for("dinner dish");
        let prefs = EnrichmentPreferences::new();

        h.coordinator().enrich_day(&h.day, &prefs).await;
        h.image_tasks.join_all(Duration::from_secs(1)).await;

        let snapshot = h.run.snapshot();
        assert_eq!(snapshot.enriched_count(), 3);
        assert_eq!(snapshot.image_count(), 2);
        // All three image calls are accounted for.
        assert_eq!(h.progress.snapshot(Phase::Generating).images_generated, 3);
        assert_eq!(h.sink.events_named("image.failed").len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_admits_no_work() {
        let h = Harness::new();
        h.token.cancel("user abort");
        let prefs = EnrichmentPreferences::new();

        h.coordinator().enrich_day(&h.day, &prefs).await;

        assert_eq!(h.recipes.call_count(), 0);
        assert_eq!(h.run.snapshot().enriched_count(), 0);
    }

    #[tokio::test]
    async fn test_result_after_cancel_is_dropped() {
        let h = Harness::new();
        h.recipes.with_delay(Duration::from_millis(50));
        let prefs = EnrichmentPreferences::new();

        let coordinator = Arc::new(h.coordinator());
        let day = h.day.clone();
        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator.enrich_day(&day, &prefs).await;
            })
        };

        // Cancel while the detail calls are in flight.
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.token.cancel("user abort");
        task.await.unwrap();

        assert_eq!(h.run.snapshot().enriched_count(), 0);
        assert_eq!(h.progress.snapshot(Phase::Generating).meals_enriched, 0);
    }

    #[tokio::test]
    async fn test_already_enriched_meals_skipped() {
        let h = Harness::new();
        let meal_id = h.day.meals[0].id;
        h.run
            .attach_recipe(meal_id, DetailedRecipe::new("done"));
        let day = h.run.snapshot().weeks[0].days[0].clone();
        let prefs = EnrichmentPreferences::new();

        h.coordinator().enrich_day(&day, &prefs).await;
        h.image_tasks.join_all(Duration::from_secs(1)).await;

        // Only the two unenriched meals hit the service.
        assert_eq!(h.recipes.call_count(), 2);
    }
}
