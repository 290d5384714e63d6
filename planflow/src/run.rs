//! The generation run aggregate and its phase machine.

use crate::config::GenerationConfig;
use crate::model::{DetailedRecipe, MealSkeleton, MealType, WeekPlan, DAYS_PER_WEEK, MEALS_PER_DAY};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A named stage of the pipeline state machine.
///
/// Transitions are one-directional except discard/cancel, which return to
/// `Configuration` from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Awaiting user configuration; no run in flight.
    Configuration,
    /// Week streams are being consumed.
    Generating,
    /// All weeks streamed; plan skeleton complete.
    Validation,
    /// Recipe details and images are being generated.
    RecipeDetailsGenerating,
    /// Enrichment settled; plan ready for review.
    RecipeDetailsValidation,
    /// Run persisted.
    Saved,
    /// Run discarded by the user.
    Discarded,
    /// Run cancelled mid-flight.
    Cancelled,
    /// Run failed fatally.
    Failed,
}

/// A fixed percentage band owned by a phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressBand {
    /// Percentage at phase entry.
    pub start: f64,
    /// Percentage at phase completion.
    pub end: f64,
}

impl ProgressBand {
    /// Interpolates within the band by a 0..=1 fraction.
    #[must_use]
    pub fn at(&self, fraction: f64) -> f64 {
        self.start + fraction.clamp(0.0, 1.0) * (self.end - self.start)
    }
}

impl Phase {
    /// Returns the fixed progress band this phase owns.
    ///
    /// Recipe completion is weighted ahead of image completion within the
    /// enrichment band: recipes are required, images are best-effort.
    #[must_use]
    pub fn band(self) -> ProgressBand {
        let (start, end) = match self {
            Self::Configuration => (0.0, 10.0),
            Self::Generating => (10.0, 75.0),
            Self::Validation => (75.0, 75.0),
            Self::RecipeDetailsGenerating => (75.0, 95.0),
            Self::RecipeDetailsValidation | Self::Saved => (100.0, 100.0),
            Self::Discarded | Self::Cancelled | Self::Failed => (0.0, 0.0),
        };
        ProgressBand { start, end }
    }

    /// The sub-band for recipe-detail completion within enrichment.
    #[must_use]
    pub fn recipe_band() -> ProgressBand {
        ProgressBand {
            start: 75.0,
            end: 90.0,
        }
    }

    /// The sub-band for image completion within enrichment.
    #[must_use]
    pub fn image_band() -> ProgressBand {
        ProgressBand {
            start: 90.0,
            end: 95.0,
        }
    }

    /// Returns true for terminal phases.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Saved | Self::Discarded | Self::Cancelled | Self::Failed
        )
    }

    /// Returns true for phases from which the plan may be saved.
    #[must_use]
    pub fn is_validation(self) -> bool {
        matches!(self, Self::Validation | Self::RecipeDetailsValidation)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Generating => "generating",
            Self::Validation => "validation",
            Self::RecipeDetailsGenerating => "recipe_details_generating",
            Self::RecipeDetailsValidation => "recipe_details_validation",
            Self::Saved => "saved",
            Self::Discarded => "discarded",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// One end-to-end meal-plan generation attempt for one user.
///
/// At most one active run exists per session. The aggregate is mutated only
/// through [`RunHandle`] methods; external observers read cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRun {
    /// Run identity (doubles as the checkpoint session id).
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Configuration the run was started with.
    pub config: GenerationConfig,
    /// Current phase.
    pub phase: Phase,
    /// Week plans populated incrementally.
    pub weeks: Vec<WeekPlan>,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
}

impl GenerationRun {
    /// Allocates a new run in the configuration phase.
    #[must_use]
    pub fn new(user_id: Uuid, config: GenerationConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            config,
            phase: Phase::Configuration,
            weeks: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Total day slots the run will receive.
    #[must_use]
    pub fn total_days(&self) -> u32 {
        self.config.week_count * DAYS_PER_WEEK
    }

    /// Total meal slots the run will receive.
    #[must_use]
    pub fn total_meals(&self) -> u32 {
        self.total_days() * MEALS_PER_DAY
    }

    /// Returns the week with the given number, if present.
    #[must_use]
    pub fn week(&self, week_number: u32) -> Option<&WeekPlan> {
        self.weeks.iter().find(|w| w.week_number == week_number)
    }

    /// Meals enriched across all weeks.
    #[must_use]
    pub fn enriched_count(&self) -> usize {
        self.weeks.iter().map(WeekPlan::enriched_count).sum()
    }

    /// Meals carrying an image URL across all weeks.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.weeks.iter().map(WeekPlan::image_count).sum()
    }
}

/// Shared handle funnelling every mutation of the run aggregate.
///
/// Each mutation takes the write lock, applies a pure transformation of the
/// prior state, and releases, so external observers never see partial
/// intermediate states.
#[derive(Clone)]
pub struct RunHandle {
    inner: Arc<RwLock<GenerationRun>>,
}

impl RunHandle {
    /// Wraps a run in a handle.
    #[must_use]
    pub fn new(run: GenerationRun) -> Self {
        Self {
            inner: Arc::new(RwLock::new(run)),
        }
    }

    /// Replaces the run wholesale (start of a new attempt, or resume).
    pub fn replace(&self, run: GenerationRun) {
        *self.inner.write() = run;
    }

    /// Returns a full snapshot of the run.
    #[must_use]
    pub fn snapshot(&self) -> GenerationRun {
        self.inner.read().clone()
    }

    /// Returns the run id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.read().id
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.read().phase
    }

    /// Transitions to a new phase.
    pub fn set_phase(&self, phase: Phase) {
        self.inner.write().phase = phase;
    }

    /// Appends an empty week plan.
    pub fn push_week(&self, week: WeekPlan) {
        self.inner.write().weeks.push(week);
    }

    /// Merges a `day` emission into the given week.
    ///
    /// Returns the merge outcome, or `None` when the week does not exist or
    /// the date falls outside its range.
    pub fn merge_day(
        &self,
        week_number: u32,
        date: NaiveDate,
        skeletons: &[(MealType, MealSkeleton)],
    ) -> Option<crate::model::DayMerge> {
        let mut run = self.inner.write();
        run.weeks
            .iter_mut()
            .find(|w| w.week_number == week_number)?
            .merge_day(date, skeletons)
    }

    /// Marks a week ready with its summary.
    pub fn complete_week(&self, week_number: u32, summary: Option<String>) {
        let mut run = self.inner.write();
        if let Some(week) = run.weeks.iter_mut().find(|w| w.week_number == week_number) {
            week.complete(summary);
        }
    }

    /// Attaches a recipe to the meal with the given id.
    ///
    /// Returns false when the meal no longer exists (e.g. the run was
    /// cleared while the detail call was in flight).
    pub fn attach_recipe(&self, meal_id: Uuid, recipe: DetailedRecipe) -> bool {
        let mut run = self.inner.write();
        for week in &mut run.weeks {
            if let Some(meal) = week.meal_mut(meal_id) {
                meal.attach_recipe(recipe);
                return true;
            }
        }
        false
    }

    /// Attaches an image URL to the meal's recipe.
    pub fn attach_image(&self, meal_id: Uuid, image_url: impl Into<String>) -> bool {
        let mut run = self.inner.write();
        for week in &mut run.weeks {
            if let Some(meal) = week.meal_mut(meal_id) {
                if let Some(recipe) = meal.recipe.as_mut() {
                    recipe.image_url = Some(image_url.into());
                    return true;
                }
                return false;
            }
        }
        false
    }

    /// Removes one week plan (a failed week; completed weeks stay intact).
    pub fn remove_week(&self, week_number: u32) {
        self.inner
            .write()
            .weeks
            .retain(|w| w.week_number != week_number);
    }

    /// Clears all week plans (discard/cancel).
    pub fn clear_weeks(&self) {
        self.inner.write().weeks.clear();
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let run = self.inner.read();
        f.debug_struct("RunHandle")
            .field("id", &run.id)
            .field("phase", &run.phase)
            .field("weeks", &run.weeks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_run() -> GenerationRun {
        let config = GenerationConfig::new(
            Uuid::new_v4(),
            1,
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        );
        GenerationRun::new(Uuid::new_v4(), config)
    }

    fn skeletons() -> Vec<(MealType, MealSkeleton)> {
        MealType::ALL
            .iter()
            .map(|t| (*t, MealSkeleton::new(format!("{t} dish"))))
            .collect()
    }

    #[test]
    fn test_phase_bands_cover_contract() {
        assert_eq!(Phase::Configuration.band().start, 0.0);
        assert_eq!(Phase::Generating.band(), ProgressBand { start: 10.0, end: 75.0 });
        assert_eq!(Phase::RecipeDetailsValidation.band().end, 100.0);
        assert_eq!(Phase::recipe_band().end, Phase::image_band().start);
    }

    #[test]
    fn test_band_interpolation_clamps() {
        let band = Phase::Generating.band();
        assert_eq!(band.at(0.0), 10.0);
        assert_eq!(band.at(1.0), 75.0);
        assert_eq!(band.at(2.0), 75.0);
    }

    #[test]
    fn test_phase_terminality() {
        assert!(Phase::Cancelled.is_terminal());
        assert!(Phase::Saved.is_terminal());
        assert!(!Phase::RecipeDetailsValidation.is_terminal());
        assert!(Phase::RecipeDetailsValidation.is_validation());
    }

    #[test]
    fn test_run_totals() {
        let run = test_run();
        assert_eq!(run.total_days(), 7);
        assert_eq!(run.total_meals(), 21);
    }

    #[test]
    fn test_handle_merge_and_attach() {
        let handle = RunHandle::new(test_run());
        let start = handle.snapshot().config.start_date;
        handle.push_week(WeekPlan::new(1, start));

        let merge = handle.merge_day(1, start, &skeletons()).unwrap();
        assert!(merge.inserted);

        let meal_id = merge.day.meals[0].id;
        assert!(handle.attach_recipe(meal_id, DetailedRecipe::new("Detailed")));
        assert!(handle.attach_image(meal_id, "https://img.test/1.png"));

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.enriched_count(), 1);
        assert_eq!(snapshot.image_count(), 1);
    }

    #[test]
    fn test_attach_to_missing_meal_is_noop() {
        let handle = RunHandle::new(test_run());
        assert!(!handle.attach_recipe(Uuid::new_v4(), DetailedRecipe::new("x")));
        assert!(!handle.attach_image(Uuid::new_v4(), "url"));
    }

    #[test]
    fn test_attach_image_requires_recipe() {
        let handle = RunHandle::new(test_run());
        let start = handle.snapshot().config.start_date;
        handle.push_week(WeekPlan::new(1, start));
        let merge = handle.merge_day(1, start, &skeletons()).unwrap();
        let meal_id = merge.day.meals[0].id;

        // No recipe attached yet, so the image has nowhere to go.
        assert!(!handle.attach_image(meal_id, "url"));
    }
}
