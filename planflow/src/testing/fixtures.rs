//! Fixture builders for pipeline tests.

use crate::config::{EnrichmentPreferences, GenerationConfig};
use crate::model::MealSkeleton;
use crate::stream::{CompleteEvent, DayEvent, StreamEvent};
use chrono::NaiveDate;
use uuid::Uuid;

/// A valid configuration starting Monday 2025-06-02.
#[must_use]
pub fn test_config(week_count: u32) -> GenerationConfig {
    GenerationConfig::new(
        Uuid::new_v4(),
        week_count,
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
    )
}

/// Preferences with one restriction and a calorie target.
#[must_use]
pub fn test_preferences() -> EnrichmentPreferences {
    EnrichmentPreferences::new()
        .with_dietary("vegetarian")
        .with_target_calories(650)
}

/// A `day` event with three named meal skeletons for the given date.
#[must_use]
pub fn day_event(date: NaiveDate) -> StreamEvent {
    StreamEvent::Day(DayEvent {
        date,
        breakfast: Some(
            MealSkeleton::new(format!("Breakfast {date}"))
                .with_ingredients(vec!["oats".into(), "berries".into()])
                .with_calories(420),
        ),
        lunch: Some(
            MealSkeleton::new(format!("Lunch {date}"))
                .with_ingredients(vec!["chickpeas".into(), "spinach".into()])
                .with_calories(580),
        ),
        dinner: Some(
            MealSkeleton::new(format!("Dinner {date}"))
                .with_ingredients(vec!["lentils".into(), "rice".into()])
                .with_calories(650),
        ),
    })
}

/// A full week script: one `day` event per day, optionally terminated by
/// `complete`.
#[must_use]
pub fn week_script(start_date: NaiveDate, days: u64, complete: bool) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = (0..days)
        .map(|offset| day_event(start_date + chrono::Days::new(offset)))
        .collect();
    if complete {
        events.push(StreamEvent::Complete(CompleteEvent {
            summary: Some("A balanced week".into()),
        }));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_script_shape() {
        let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let script = week_script(start, 7, true);
        assert_eq!(script.len(), 8);
        assert!(matches!(script[0], StreamEvent::Day(_)));
        assert!(matches!(script[7], StreamEvent::Complete(_)));
    }

    #[test]
    fn test_config_is_valid() {
        assert!(test_config(1).validate().is_ok());
    }
}
