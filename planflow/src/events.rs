//! Callback-style notifications of phase and progress changes.

use crate::progress::ProgressSnapshot;
use crate::run::Phase;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// A notification emitted by the pipeline for the user-facing surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    /// The pipeline transitioned to a new phase.
    PhaseChanged {
        phase: Phase,
        overall_percent: f64,
    },
    /// A counter changed; carries the full derived snapshot.
    ProgressUpdated(ProgressSnapshot),
    /// A week's stream reported `complete`.
    WeekReady { week_number: u32 },
    /// A meal received its detailed recipe.
    MealEnriched { meal_id: Uuid },
    /// A meal received its image URL.
    ImageGenerated { meal_id: Uuid, cache_hit: bool },
    /// An image call failed; the meal stays without an image.
    ImageFailed { meal_id: Uuid },
    /// The user's quota was exhausted; actionable billing UX expected.
    QuotaExhausted { operation: String },
    /// The run was persisted.
    RunSaved { weeks: u32 },
}

impl PlanEvent {
    /// Returns a stable name for filtering and logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "phase.changed",
            Self::ProgressUpdated(_) => "progress.updated",
            Self::WeekReady { .. } => "week.ready",
            Self::MealEnriched { .. } => "meal.enriched",
            Self::ImageGenerated { .. } => "image.generated",
            Self::ImageFailed { .. } => "image.failed",
            Self::QuotaExhausted { .. } => "quota.exhausted",
            Self::RunSaved { .. } => "run.saved",
        }
    }
}

/// Trait for sinks that receive pipeline notifications.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: PlanEvent);

    /// Emits an event without awaiting. Must never panic; errors are
    /// logged and suppressed.
    fn try_emit(&self, event: PlanEvent);
}

/// A no-op sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: PlanEvent) {}

    fn try_emit(&self, _event: PlanEvent) {}
}

/// A sink that logs events through the tracing framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    /// Creates a new logging sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn log_event(event: &PlanEvent) {
        match event {
            PlanEvent::QuotaExhausted { operation } => {
                warn!(event = event.name(), operation = %operation, "quota exhausted");
            }
            other => {
                info!(event = other.name(), data = ?other, "pipeline event");
            }
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: PlanEvent) {
        Self::log_event(&event);
    }

    fn try_emit(&self, event: PlanEvent) {
        Self::log_event(&event);
    }
}

/// A collecting sink for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<PlanEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PlanEvent> {
        self.events.read().clone()
    }

    /// Returns events with the given name.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<PlanEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.name() == name)
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: PlanEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: PlanEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(PlanEvent::WeekReady { week_number: 1 }).await;
        sink.try_emit(PlanEvent::WeekReady { week_number: 2 });
    }

    #[tokio::test]
    async fn test_collecting_sink_filters_by_name() {
        let sink = CollectingEventSink::new();
        sink.emit(PlanEvent::WeekReady { week_number: 1 }).await;
        sink.try_emit(PlanEvent::MealEnriched {
            meal_id: Uuid::new_v4(),
        });
        sink.try_emit(PlanEvent::WeekReady { week_number: 2 });

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_named("week.ready").len(), 2);
        assert_eq!(sink.events_named("meal.enriched").len(), 1);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_string(&PlanEvent::WeekReady { week_number: 1 }).unwrap();
        assert!(json.contains(r#""type":"week_ready""#));
    }
}
