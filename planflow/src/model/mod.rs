//! Plan data model: weeks, days, meals, and detailed recipes.

mod day;
mod meal;
mod recipe;
mod week;

pub use day::Day;
pub use meal::{Meal, MealSkeleton, MealType};
pub use recipe::{DetailedRecipe, NutritionFacts};
pub use week::{DayMerge, WeekPlan, WeekStatus};

/// Meal slots per day (breakfast, lunch, dinner).
pub const MEALS_PER_DAY: u32 = 3;

/// Days in a generated week.
pub const DAYS_PER_WEEK: u32 = 7;
