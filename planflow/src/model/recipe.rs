//! Detailed recipes attached to meals by enrichment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nutrition facts per serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    /// Calories per serving.
    pub calories: u32,
    /// Protein in grams.
    pub protein_g: f32,
    /// Carbohydrates in grams.
    pub carbs_g: f32,
    /// Fat in grams.
    pub fat_g: f32,
}

/// The full recipe produced by the detail service.
///
/// The image URL is populated asynchronously and independently of recipe
/// completion; a recipe may be ready with no image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRecipe {
    /// Recipe identity from the detail service.
    pub id: Uuid,
    /// Recipe title.
    pub title: String,
    /// Ingredient lines.
    pub ingredients: Vec<String>,
    /// Ordered instruction steps.
    pub instructions: Vec<String>,
    /// Preparation time.
    pub prep_time_minutes: u32,
    /// Cooking time.
    pub cook_time_minutes: u32,
    /// Servings the recipe yields.
    pub servings: u32,
    /// Per-serving nutrition, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionFacts>,
    /// Opaque signature used to key image generation.
    pub image_signature: String,
    /// Generated image URL, populated out of band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl DetailedRecipe {
    /// Creates a recipe with the required fields.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            prep_time_minutes: 0,
            cook_time_minutes: 0,
            servings: 1,
            nutrition: None,
            image_signature: String::new(),
            image_url: None,
        }
    }

    /// Sets the ingredient lines.
    #[must_use]
    pub fn with_ingredients(mut self, ingredients: Vec<String>) -> Self {
        self.ingredients = ingredients;
        self
    }

    /// Sets the instruction steps.
    #[must_use]
    pub fn with_instructions(mut self, instructions: Vec<String>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Sets the timings.
    #[must_use]
    pub fn with_timings(mut self, prep_minutes: u32, cook_minutes: u32) -> Self {
        self.prep_time_minutes = prep_minutes;
        self.cook_time_minutes = cook_minutes;
        self
    }

    /// Sets the servings.
    #[must_use]
    pub fn with_servings(mut self, servings: u32) -> Self {
        self.servings = servings;
        self
    }

    /// Sets the nutrition facts.
    #[must_use]
    pub fn with_nutrition(mut self, nutrition: NutritionFacts) -> Self {
        self.nutrition = Some(nutrition);
        self
    }

    /// Sets the image signature.
    #[must_use]
    pub fn with_image_signature(mut self, signature: impl Into<String>) -> Self {
        self.image_signature = signature.into();
        self
    }

    /// Total prep plus cook time.
    #[must_use]
    pub fn total_time_minutes(&self) -> u32 {
        self.prep_time_minutes + self.cook_time_minutes
    }
}
