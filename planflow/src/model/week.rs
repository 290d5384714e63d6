//! Week plans populated incrementally by stream ingestion.

use super::{Day, Meal, MealSkeleton, MealType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Readiness of a week plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStatus {
    /// The week's stream has not completed yet.
    Loading,
    /// The stream reported `complete`.
    Ready,
}

impl fmt::Display for WeekStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// The outcome of merging one `day` stream event.
#[derive(Debug, Clone)]
pub struct DayMerge {
    /// Whether a new day was inserted (first emission for the index).
    pub inserted: bool,
    /// Snapshot of the day after the merge.
    pub day: Day,
}

/// One plan unit per requested week, owned by the generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekPlan {
    /// 1-based week number.
    pub week_number: u32,
    /// First day of the week.
    pub start_date: NaiveDate,
    /// Last day of the week.
    pub end_date: NaiveDate,
    /// Days merged so far, ordered by index.
    pub days: Vec<Day>,
    /// Readiness status.
    pub status: WeekStatus,
    /// Weekly summary attached on `complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl WeekPlan {
    /// Creates an empty week starting on the given date.
    #[must_use]
    pub fn new(week_number: u32, start_date: NaiveDate) -> Self {
        Self {
            week_number,
            start_date,
            end_date: start_date + chrono::Days::new(6),
            days: Vec::new(),
            status: WeekStatus::Loading,
            summary: None,
        }
    }

    /// Merges a `day` emission into the slot for the given date.
    ///
    /// The day index is derived from the date's offset within the week.
    /// Returns `None` when the date falls outside the week's range.
    pub fn merge_day(
        &mut self,
        date: NaiveDate,
        skeletons: &[(MealType, MealSkeleton)],
    ) -> Option<DayMerge> {
        let offset = (date - self.start_date).num_days();
        if !(0..7).contains(&offset) {
            return None;
        }
        let index = usize::try_from(offset).ok()?;

        if let Some(day) = self.days.iter_mut().find(|d| d.index == index) {
            day.merge_skeletons(skeletons);
            return Some(DayMerge {
                inserted: false,
                day: day.clone(),
            });
        }

        let day = Day::from_skeletons(date, index, skeletons);
        self.days.push(day.clone());
        self.days.sort_by_key(|d| d.index);
        Some(DayMerge {
            inserted: true,
            day,
        })
    }

    /// Marks the week ready and attaches its summary.
    pub fn complete(&mut self, summary: Option<String>) {
        self.status = WeekStatus::Ready;
        self.summary = summary;
    }

    /// Returns the meal with the given id, if present.
    #[must_use]
    pub fn meal(&self, id: Uuid) -> Option<&Meal> {
        self.days.iter().find_map(|d| d.meal(id))
    }

    /// Returns a mutable reference to the meal with the given id.
    pub fn meal_mut(&mut self, id: Uuid) -> Option<&mut Meal> {
        self.days.iter_mut().find_map(|d| d.meal_mut(id))
    }

    /// Total meal slots across all days.
    #[must_use]
    pub fn meal_count(&self) -> usize {
        self.days.iter().map(|d| d.meals.len()).sum()
    }

    /// Meals with a recipe attached.
    #[must_use]
    pub fn enriched_count(&self) -> usize {
        self.days.iter().map(Day::enriched_count).sum()
    }

    /// Meals carrying an image URL.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.days
            .iter()
            .flat_map(|d| d.meals.iter())
            .filter(|m| m.has_image())
            .count()
    }
}
