//! Days and the stream re-merge algorithm.

use super::{Meal, MealSkeleton, MealType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One calendar day in a week plan.
///
/// A day's identity is its zero-based index within the week, never a
/// generated id, so overlapping stream emissions always target the same slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    /// Calendar date.
    pub date: NaiveDate,
    /// Zero-based index within the week.
    pub index: usize,
    /// Meal slots in day order.
    pub meals: Vec<Meal>,
}

impl Day {
    /// Builds a fresh day from skeletons, assigning new meal ids.
    #[must_use]
    pub fn from_skeletons(
        date: NaiveDate,
        index: usize,
        skeletons: &[(MealType, MealSkeleton)],
    ) -> Self {
        let meals = skeletons
            .iter()
            .map(|(meal_type, skeleton)| Meal::from_skeleton(*meal_type, skeleton))
            .collect();
        Self { date, index, meals }
    }

    /// Merges a fresh stream emission into this day.
    ///
    /// For each incoming slot: if the existing meal is already enriched it is
    /// kept unchanged, otherwise it is replaced by a freshly parsed meal with
    /// a new id. Slots absent from the incoming payload are left alone. This
    /// guarantees enrichment work keyed by earlier meal ids is never orphaned
    /// by a later, overlapping emission for the same day.
    pub fn merge_skeletons(&mut self, skeletons: &[(MealType, MealSkeleton)]) {
        for (meal_type, skeleton) in skeletons {
            match self.meals.iter_mut().find(|m| m.meal_type == *meal_type) {
                Some(existing) if existing.recipe_generated => {}
                Some(existing) => *existing = Meal::from_skeleton(*meal_type, skeleton),
                None => {
                    self.meals.push(Meal::from_skeleton(*meal_type, skeleton));
                    self.meals
                        .sort_by_key(|m| m.meal_type.slot_index());
                }
            }
        }
    }

    /// Returns the meal with the given id, if present.
    #[must_use]
    pub fn meal(&self, id: uuid::Uuid) -> Option<&Meal> {
        self.meals.iter().find(|m| m.id == id)
    }

    /// Returns a mutable reference to the meal with the given id.
    pub fn meal_mut(&mut self, id: uuid::Uuid) -> Option<&mut Meal> {
        self.meals.iter_mut().find(|m| m.id == id)
    }

    /// Number of enriched meals in this day.
    #[must_use]
    pub fn enriched_count(&self) -> usize {
        self.meals.iter().filter(|m| m.recipe_generated).count()
    }
}
