//! Scripted mock services.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::errors::PlanError;
use crate::model::{DetailedRecipe, WeekPlan};
use crate::services::{
    EventStream, ImageGenerationService, ImageRequest, ImageResponse, PlanRepository,
    PlanStreamService, RecipeDetailRequest, RecipeDetailService, WeekStreamRequest,
};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

/// A stream service that replays scripted events per week.
#[derive(Default)]
pub struct ScriptedStreamService {
    scripts: Mutex<HashMap<u32, Vec<StreamEvent>>>,
    event_delay: Mutex<Option<Duration>>,
    open_count: Mutex<usize>,
    fail_week: Mutex<Option<(u32, u16)>>,
}

impl ScriptedStreamService {
    /// Creates a service with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the events for one week.
    pub fn script_week(&self, week_number: u32, events: Vec<StreamEvent>) {
        self.scripts.lock().insert(week_number, events);
    }

    /// Delays each scripted event by the given duration.
    pub fn with_event_delay(&self, delay: Duration) {
        *self.event_delay.lock() = Some(delay);
    }

    /// Makes `open_week_stream` fail for the given week with an HTTP-style
    /// status code.
    pub fn fail_open(&self, week_number: u32, status: u16) {
        *self.fail_week.lock() = Some((week_number, status));
    }

    /// Number of streams opened.
    #[must_use]
    pub fn open_count(&self) -> usize {
        *self.open_count.lock()
    }
}

#[async_trait]
impl PlanStreamService for ScriptedStreamService {
    async fn open_week_stream(
        &self,
        request: &WeekStreamRequest,
    ) -> Result<EventStream, PlanError> {
        *self.open_count.lock() += 1;

        if let Some((week, status)) = *self.fail_week.lock() {
            if week == request.week_number {
                if status == 402 {
                    return Err(PlanError::quota_exceeded("plan_stream"));
                }
                return Err(PlanError::stream(week, format!("http status {status}")));
            }
        }

        let events = self
            .scripts
            .lock()
            .get(&request.week_number)
            .cloned()
            .unwrap_or_default();
        let delay = *self.event_delay.lock();

        let stream = futures::stream::iter(events).then(move |event| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            event
        });
        Ok(stream.boxed())
    }
}

/// A recipe-detail service that succeeds by default and can be scripted to
/// fail, quota-exhaust, or delay per meal title.
#[derive(Default)]
pub struct ScriptedRecipeService {
    quota_titles: Mutex<HashSet<String>>,
    failing_titles: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRecipeService {
    /// Creates a service that enriches everything successfully.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes requests for the given meal title fail with quota exhaustion.
    pub fn quota_for(&self, title: impl Into<String>) {
        self.quota_titles.lock().insert(title.into());
    }

    /// Makes requests for the given meal title fail generically.
    pub fn fail_for(&self, title: impl Into<String>) {
        self.failing_titles.lock().insert(title.into());
    }

    /// Delays every response.
    pub fn with_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of requests received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Meal titles requested, in arrival order.
    #[must_use]
    pub fn requested_titles(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RecipeDetailService for ScriptedRecipeService {
    async fn generate_recipe(
        &self,
        request: &RecipeDetailRequest,
    ) -> Result<DetailedRecipe, PlanError> {
        self.calls.lock().push(request.meal_title.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.quota_titles.lock().contains(&request.meal_title) {
            return Err(PlanError::quota_exceeded("recipe_detail"));
        }
        if self.failing_titles.lock().contains(&request.meal_title) {
            return Err(PlanError::enrichment(
                request.meal_id,
                format!("scripted failure for {}", request.meal_title),
            ));
        }

        Ok(DetailedRecipe::new(format!("{}, detailed", request.meal_title))
            .with_ingredients(request.main_ingredients.clone())
            .with_instructions(vec!["Prep".into(), "Cook".into(), "Serve".into()])
            .with_timings(10, 20)
            .with_servings(2))
    }
}

/// An image service returning deterministic URLs, with per-title failure
/// injection and optional delay.
#[derive(Default)]
pub struct ScriptedImageService {
    failing_titles: Mutex<HashSet<String>>,
    slow_titles: Mutex<Vec<(String, Duration)>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<usize>,
}

impl ScriptedImageService {
    /// Creates a service that generates every image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes requests whose recipe title starts with the given meal title
    /// fail.
    pub fn fail_for(&self, title: impl Into<String>) {
        self.failing_titles.lock().insert(title.into());
    }

    /// Delays requests whose recipe title starts with the given meal title.
    pub fn slow_for(&self, title: impl Into<String>, delay: Duration) {
        self.slow_titles.lock().push((title.into(), delay));
    }

    /// Delays every response.
    pub fn with_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of requests received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ImageGenerationService for ScriptedImageService {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, PlanError> {
        *self.calls.lock() += 1;

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let slow = self
            .slow_titles
            .lock()
            .iter()
            .find(|(title, _)| request.recipe_title.starts_with(title.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = slow {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing_titles
            .lock()
            .iter()
            .any(|title| request.recipe_title.starts_with(title.as_str()));
        if failing {
            return Err(PlanError::enrichment(
                request.recipe_id,
                "scripted image failure",
            ));
        }

        Ok(ImageResponse {
            image_url: format!("https://img.test/{}.png", request.image_signature),
            cache_hit: false,
            cost: 0.01,
        })
    }
}

/// A repository that records saves and can fail from the nth week onward.
#[derive(Default)]
pub struct RecordingRepository {
    saved: Mutex<Vec<(u32, bool)>>,
    fail_from: Mutex<Option<usize>>,
}

impl RecordingRepository {
    /// Creates a repository that accepts every save.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every save starting with the nth call (zero-based).
    pub fn fail_from(&self, call_index: usize) {
        *self.fail_from.lock() = Some(call_index);
    }

    /// Returns `(week_number, with_details)` pairs in save order.
    #[must_use]
    pub fn saved(&self) -> Vec<(u32, bool)> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl PlanRepository for RecordingRepository {
    async fn save_week(
        &self,
        _user_id: Uuid,
        week: &WeekPlan,
        with_details: bool,
    ) -> Result<(), PlanError> {
        let call_index = self.saved.lock().len();
        if let Some(fail_from) = *self.fail_from.lock() {
            if call_index >= fail_from {
                return Err(PlanError::persistence(
                    format!("scripted write failure for week {}", week.week_number),
                    0,
                ));
            }
        }
        self.saved.lock().push((week.week_number, with_details));
        Ok(())
    }
}

/// A checkpoint store whose every operation fails.
///
/// Checkpoint writes are best-effort, so a broken store must never abort
/// the run it belongs to.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCheckpointStore;

impl FailingCheckpointStore {
    /// Creates a store that rejects everything.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn unavailable() -> PlanError {
        PlanError::persistence("checkpoint store unavailable", 0)
    }
}

#[async_trait]
impl CheckpointStore for FailingCheckpointStore {
    async fn save(&self, _checkpoint: Checkpoint) -> Result<(), PlanError> {
        Err(Self::unavailable())
    }

    async fn load(&self, _user_id: Uuid) -> Result<Option<Checkpoint>, PlanError> {
        Err(Self::unavailable())
    }

    async fn mark_complete(&self, _session_id: Uuid) -> Result<(), PlanError> {
        Err(Self::unavailable())
    }

    async fn delete(&self, _session_id: Uuid) -> Result<(), PlanError> {
        Err(Self::unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{test_config, week_script};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_scripted_stream_replays_events() {
        let service = ScriptedStreamService::new();
        let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        service.script_week(1, week_script(start, 2, true));

        let request = WeekStreamRequest {
            user_id: Uuid::new_v4(),
            week_number: 1,
            start_date: start,
            inventory_id: Uuid::new_v4(),
            batch_cooking: false,
        };
        let stream = service.open_week_stream(&request).await.unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 3);
        assert_eq!(service.open_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_recipe_quota() {
        let service = ScriptedRecipeService::new();
        service.quota_for("Oats");

        let request = RecipeDetailRequest {
            user_id: Uuid::new_v4(),
            meal_id: Uuid::new_v4(),
            meal_title: "Oats".into(),
            main_ingredients: vec![],
            preferences: crate::config::EnrichmentPreferences::new(),
            meal_type: crate::model::MealType::Breakfast,
            target_calories: None,
        };
        let err = service.generate_recipe(&request).await.unwrap_err();
        assert!(err.is_quota());
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn test_recording_repository_fail_from() {
        let repo = RecordingRepository::new();
        repo.fail_from(1);
        let config = test_config(2);
        let week1 = WeekPlan::new(1, config.start_date);
        let week2 = WeekPlan::new(2, config.week_start(2));
        let user = Uuid::new_v4();

        assert!(repo.save_week(user, &week1, true).await.is_ok());
        assert!(repo.save_week(user, &week2, true).await.is_err());
        assert_eq!(repo.saved(), vec![(1, true)]);
    }
}
