//! Typed events carried by a week's generation stream.

use crate::model::{MealSkeleton, MealType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Free-text progress from the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Human-readable progress text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Backend-reported percentage, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

/// One day's skeleton: a date plus up to three named meal slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayEvent {
    /// The calendar date this day belongs to.
    pub date: NaiveDate,
    /// Breakfast slot, when populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakfast: Option<MealSkeleton>,
    /// Lunch slot, when populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch: Option<MealSkeleton>,
    /// Dinner slot, when populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dinner: Option<MealSkeleton>,
}

impl DayEvent {
    /// Returns the populated meal slots in day order.
    #[must_use]
    pub fn skeletons(&self) -> Vec<(MealType, MealSkeleton)> {
        [
            (MealType::Breakfast, &self.breakfast),
            (MealType::Lunch, &self.lunch),
            (MealType::Dinner, &self.dinner),
        ]
        .into_iter()
        .filter_map(|(meal_type, slot)| slot.as_ref().map(|s| (meal_type, s.clone())))
        .collect()
    }
}

/// Terminal event carrying the weekly summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteEvent {
    /// Weekly summary text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Stream-reported failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Description of the failure.
    pub message: String,
    /// HTTP-style status code; 402 signals quota exhaustion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

/// An event on a week's generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Free-text backend progress.
    Progress(ProgressEvent),
    /// Keep-alive; carries nothing.
    Heartbeat,
    /// One day's meal skeletons.
    Day(DayEvent),
    /// Terminal success for the week.
    Complete(CompleteEvent),
    /// Terminal failure for the week.
    Error(ErrorEvent),
}

impl StreamEvent {
    /// Parses a named SSE frame into a typed event.
    ///
    /// Returns `Ok(None)` for event names this pipeline does not consume.
    /// Malformed payloads surface as `Err` so callers can log and skip them
    /// without tearing the stream down.
    pub fn from_frame(event: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        let parsed = match event {
            "progress" => Some(Self::Progress(serde_json::from_str(data)?)),
            "heartbeat" => Some(Self::Heartbeat),
            "day" => Some(Self::Day(serde_json::from_str(data)?)),
            "complete" => {
                if data.trim().is_empty() {
                    Some(Self::Complete(CompleteEvent { summary: None }))
                } else {
                    Some(Self::Complete(serde_json::from_str(data)?))
                }
            }
            "error" => Some(Self::Error(serde_json::from_str(data)?)),
            _ => None,
        };
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_day_frame_parses_named_slots() {
        let data = r#"{
            "date": "2025-06-02",
            "breakfast": {"name": "Oats", "main_ingredients": ["oats"]},
            "dinner": {"name": "Curry", "calories": 600}
        }"#;
        let event = StreamEvent::from_frame("day", data).unwrap().unwrap();

        let StreamEvent::Day(day) = event else {
            panic!("expected day event");
        };
        let skeletons = day.skeletons();
        assert_eq!(skeletons.len(), 2);
        assert_eq!(skeletons[0].0, MealType::Breakfast);
        assert_eq!(skeletons[1].1.name, "Curry");
    }

    #[test]
    fn test_complete_frame_with_empty_data() {
        let event = StreamEvent::from_frame("complete", "").unwrap().unwrap();
        assert_eq!(
            event,
            StreamEvent::Complete(CompleteEvent { summary: None })
        );
    }

    #[test]
    fn test_error_frame_carries_code() {
        let event = StreamEvent::from_frame("error", r#"{"message": "quota", "code": 402}"#)
            .unwrap()
            .unwrap();
        let StreamEvent::Error(err) = event else {
            panic!("expected error event");
        };
        assert_eq!(err.code, Some(402));
    }

    #[test]
    fn test_unknown_event_name_is_skipped() {
        assert!(StreamEvent::from_frame("telemetry", "{}").unwrap().is_none());
    }

    #[test]
    fn test_malformed_payload_is_err() {
        assert!(StreamEvent::from_frame("day", "{not json").is_err());
    }
}
