//! Meal slots and their skeleton payloads.

use super::DetailedRecipe;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The slot a meal occupies within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    /// First meal of the day.
    Breakfast,
    /// Midday meal.
    Lunch,
    /// Evening meal.
    Dinner,
}

impl MealType {
    /// All slots in day order.
    pub const ALL: [Self; 3] = [Self::Breakfast, Self::Lunch, Self::Dinner];

    /// Returns the slot's position within the day.
    #[must_use]
    pub fn slot_index(self) -> usize {
        match self {
            Self::Breakfast => 0,
            Self::Lunch => 1,
            Self::Dinner => 2,
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Breakfast => write!(f, "breakfast"),
            Self::Lunch => write!(f, "lunch"),
            Self::Dinner => write!(f, "dinner"),
        }
    }
}

/// The skeleton a `day` stream event carries for one meal slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealSkeleton {
    /// Display name of the meal.
    pub name: String,
    /// Main ingredients from the plan generator.
    #[serde(default)]
    pub main_ingredients: Vec<String>,
    /// Estimated preparation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_time_minutes: Option<u32>,
    /// Estimated calories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
}

impl MealSkeleton {
    /// Creates a skeleton with just a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            main_ingredients: Vec::new(),
            prep_time_minutes: None,
            calories: None,
        }
    }

    /// Sets the main ingredients.
    #[must_use]
    pub fn with_ingredients(mut self, ingredients: Vec<String>) -> Self {
        self.main_ingredients = ingredients;
        self
    }

    /// Sets the estimated calories.
    #[must_use]
    pub fn with_calories(mut self, calories: u32) -> Self {
        self.calories = Some(calories);
        self
    }
}

/// One meal slot in a day.
///
/// The id is assigned once when the meal is first created from a skeleton
/// and is preserved across stream re-merges; concurrent enrichment work is
/// keyed by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Stable identity, assigned once.
    pub id: Uuid,
    /// The slot this meal occupies.
    pub meal_type: MealType,
    /// Display name from the skeleton.
    pub name: String,
    /// Main ingredients from the skeleton.
    pub main_ingredients: Vec<String>,
    /// Estimated preparation time from the skeleton.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_time_minutes: Option<u32>,
    /// Estimated calories from the skeleton.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    /// Whether a detailed recipe has been attached.
    pub recipe_generated: bool,
    /// The detailed recipe, once enrichment completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<DetailedRecipe>,
}

impl Meal {
    /// Creates a fresh meal from a skeleton with a new id.
    #[must_use]
    pub fn from_skeleton(meal_type: MealType, skeleton: &MealSkeleton) -> Self {
        Self {
            id: Uuid::new_v4(),
            meal_type,
            name: skeleton.name.clone(),
            main_ingredients: skeleton.main_ingredients.clone(),
            prep_time_minutes: skeleton.prep_time_minutes,
            calories: skeleton.calories,
            recipe_generated: false,
            recipe: None,
        }
    }

    /// Attaches a detailed recipe and marks the meal enriched.
    pub fn attach_recipe(&mut self, recipe: DetailedRecipe) {
        self.recipe = Some(recipe);
        self.recipe_generated = true;
    }

    /// Returns true if the meal carries an image URL.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.recipe
            .as_ref()
            .is_some_and(|r| r.image_url.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_type_slot_order() {
        assert_eq!(MealType::Breakfast.slot_index(), 0);
        assert_eq!(MealType::Lunch.slot_index(), 1);
        assert_eq!(MealType::Dinner.slot_index(), 2);
    }

    #[test]
    fn test_meal_type_serializes_snake_case() {
        let json = serde_json::to_string(&MealType::Breakfast).unwrap();
        assert_eq!(json, r#""breakfast""#);
    }

    #[test]
    fn test_meal_from_skeleton() {
        let skeleton = MealSkeleton::new("Shakshuka")
            .with_ingredients(vec!["eggs".into(), "tomatoes".into()])
            .with_calories(450);
        let meal = Meal::from_skeleton(MealType::Breakfast, &skeleton);

        assert_eq!(meal.name, "Shakshuka");
        assert_eq!(meal.calories, Some(450));
        assert!(!meal.recipe_generated);
        assert!(meal.recipe.is_none());
    }

    #[test]
    fn test_fresh_meals_get_distinct_ids() {
        let skeleton = MealSkeleton::new("Soup");
        let a = Meal::from_skeleton(MealType::Lunch, &skeleton);
        let b = Meal::from_skeleton(MealType::Lunch, &skeleton);
        assert_ne!(a.id, b.id);
    }
}
