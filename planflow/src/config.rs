//! Run configuration and pipeline tuning.

use crate::errors::PlanError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// User-facing configuration for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// The source inventory the plan draws from. Required.
    pub inventory_id: Option<Uuid>,
    /// Number of weeks to generate.
    pub week_count: u32,
    /// Whether the plan should favor batch-cooking.
    pub batch_cooking: bool,
    /// First day of the first week.
    pub start_date: NaiveDate,
}

impl GenerationConfig {
    /// Creates a configuration for the given inventory and week count.
    #[must_use]
    pub fn new(inventory_id: Uuid, week_count: u32, start_date: NaiveDate) -> Self {
        Self {
            inventory_id: Some(inventory_id),
            week_count,
            batch_cooking: false,
            start_date,
        }
    }

    /// Enables batch cooking.
    #[must_use]
    pub fn with_batch_cooking(mut self, enabled: bool) -> Self {
        self.batch_cooking = enabled;
        self
    }

    /// Validates the configuration before a run is allocated.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.inventory_id.is_none() {
            return Err(PlanError::invalid_configuration(
                "a source inventory must be selected",
            ));
        }
        if self.week_count == 0 {
            return Err(PlanError::invalid_configuration(
                "week_count must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the start date of the given 1-based week.
    #[must_use]
    pub fn week_start(&self, week_number: u32) -> NaiveDate {
        self.start_date + chrono::Days::new(u64::from(week_number - 1) * 7)
    }
}

/// Dietary preferences forwarded to the recipe-detail service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentPreferences {
    /// Dietary restrictions (e.g. "vegetarian").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dietary: Vec<String>,
    /// Ingredients to avoid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_ingredients: Vec<String>,
    /// Per-meal calorie target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_calories: Option<u32>,
}

impl EnrichmentPreferences {
    /// Creates empty preferences.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dietary restriction.
    #[must_use]
    pub fn with_dietary(mut self, restriction: impl Into<String>) -> Self {
        self.dietary.push(restriction.into());
        self
    }

    /// Excludes an ingredient.
    #[must_use]
    pub fn with_excluded(mut self, ingredient: impl Into<String>) -> Self {
        self.excluded_ingredients.push(ingredient.into());
        self
    }

    /// Sets the per-meal calorie target.
    #[must_use]
    pub fn with_target_calories(mut self, calories: u32) -> Self {
        self.target_calories = Some(calories);
        self
    }
}

/// Tiered timeouts for the pipeline's bounded waits.
///
/// Recipes are required so their wait is long; images are best-effort so
/// their wait is short. The cancel grace period bounds how long `cancel()`
/// waits for in-flight handlers to observe the token.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTimeouts {
    /// Maximum wait for all recipe-detail calls to complete.
    pub recipe_wait: Duration,
    /// Maximum wait for all image-generation calls to complete.
    pub image_wait: Duration,
    /// Grace period after cancellation before state is torn down.
    pub cancel_grace: Duration,
}

impl Default for PipelineTimeouts {
    fn default() -> Self {
        Self {
            recipe_wait: Duration::from_secs(120),
            image_wait: Duration::from_secs(30),
            cancel_grace: Duration::from_millis(500),
        }
    }
}

impl PipelineTimeouts {
    /// Creates timeouts with the default tiers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recipe wait.
    #[must_use]
    pub fn with_recipe_wait(mut self, wait: Duration) -> Self {
        self.recipe_wait = wait;
        self
    }

    /// Sets the image wait.
    #[must_use]
    pub fn with_image_wait(mut self, wait: Duration) -> Self {
        self.image_wait = wait;
        self
    }

    /// Sets the cancel grace period.
    #[must_use]
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }
}
