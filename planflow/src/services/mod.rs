//! External collaborators consumed as opaque request/response services.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpImageClient, HttpPlanStreamClient, HttpRecipeDetailClient, ServiceEndpoints};

use crate::config::EnrichmentPreferences;
use crate::errors::PlanError;
use crate::model::{DetailedRecipe, MealType, WeekPlan};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An abortable stream of typed week events.
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Request to open one week's generation stream.
#[derive(Debug, Clone, Serialize)]
pub struct WeekStreamRequest {
    /// The requesting user.
    pub user_id: Uuid,
    /// 1-based week number within the run.
    pub week_number: u32,
    /// First day of the week.
    pub start_date: NaiveDate,
    /// The source inventory the plan draws from.
    pub inventory_id: Uuid,
    /// Whether to favor batch-cooking.
    pub batch_cooking: bool,
}

/// Per-week plan-generation stream service.
#[async_trait]
pub trait PlanStreamService: Send + Sync {
    /// Opens the event stream for one week.
    ///
    /// A non-2xx response with status 402 must surface as
    /// [`PlanError::QuotaExceeded`]; other HTTP failures as a week-scoped
    /// [`PlanError::Stream`].
    async fn open_week_stream(&self, request: &WeekStreamRequest)
        -> Result<EventStream, PlanError>;
}

/// Request for one meal's detailed recipe.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetailRequest {
    /// The requesting user.
    pub user_id: Uuid,
    /// The meal slot the recipe is for.
    pub meal_id: Uuid,
    /// Meal name from the skeleton.
    pub meal_title: String,
    /// Main ingredients from the skeleton.
    pub main_ingredients: Vec<String>,
    /// Dietary preferences forwarded verbatim.
    pub preferences: EnrichmentPreferences,
    /// The slot this meal occupies.
    pub meal_type: MealType,
    /// Calorie target, when one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_calories: Option<u32>,
}

/// Recipe-detail generation service.
#[async_trait]
pub trait RecipeDetailService: Send + Sync {
    /// Generates a detailed recipe for one meal skeleton.
    async fn generate_recipe(
        &self,
        request: &RecipeDetailRequest,
    ) -> Result<DetailedRecipe, PlanError>;
}

/// Request for one recipe's image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    /// The recipe the image is for.
    pub recipe_id: Uuid,
    /// Recipe title, used as the generation prompt.
    pub recipe_title: String,
    /// Opaque cache key for the image service.
    pub image_signature: String,
    /// The requesting user.
    pub user_id: Uuid,
}

/// Response from the image-generation service.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageResponse {
    /// Where the generated image was stored.
    pub image_url: String,
    /// Whether the image came from the signature cache.
    #[serde(default)]
    pub cache_hit: bool,
    /// Generation cost reported by the service.
    #[serde(default)]
    pub cost: f64,
}

/// Image-generation service. Best-effort relative to recipe completion.
#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Generates (or fetches from cache) the image for a recipe.
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, PlanError>;
}

/// Final plan persistence, one week at a time.
///
/// Saves are at-least-once per week: a later week's failure does not roll
/// back an earlier week's successful insert.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Persists one week plan.
    async fn save_week(
        &self,
        user_id: Uuid,
        week: &WeekPlan,
        with_details: bool,
    ) -> Result<(), PlanError>;
}

/// Derives an opaque image signature for a recipe.
///
/// Used when the detail service does not supply one, so the image service
/// can still key its cache consistently.
#[must_use]
pub fn image_signature(title: &str, ingredients: &[String]) -> String {
    let mut hasher = Md5::new();
    hasher.update(title.as_bytes());
    for ingredient in ingredients {
        hasher.update(b"\n");
        hasher.update(ingredient.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_signature_is_stable() {
        let a = image_signature("Dal", &["lentils".into(), "onion".into()]);
        let b = image_signature("Dal", &["lentils".into(), "onion".into()]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_image_signature_varies_with_content() {
        let a = image_signature("Dal", &["lentils".into()]);
        let b = image_signature("Dal", &["rice".into()]);
        assert_ne!(a, b);
    }
}
