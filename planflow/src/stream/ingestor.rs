//! Drains one week's event stream into the run aggregate.

use super::StreamEvent;
use crate::cancellation::CancellationToken;
use crate::errors::PlanError;
use crate::events::{EventSink, PlanEvent};
use crate::model::Day;
use crate::progress::ProgressTracker;
use crate::run::RunHandle;
use crate::services::EventStream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Consumes one server-sent-event stream per week and translates typed
/// events into day merges on the run aggregate.
pub struct StreamIngestor {
    run: RunHandle,
    progress: Arc<ProgressTracker>,
    events: Arc<dyn EventSink>,
}

impl StreamIngestor {
    /// Creates an ingestor bound to a run.
    #[must_use]
    pub fn new(run: RunHandle, progress: Arc<ProgressTracker>, events: Arc<dyn EventSink>) -> Self {
        Self {
            run,
            progress,
            events,
        }
    }

    /// Drains the stream for one week until `complete`, an error event, or
    /// cancellation.
    ///
    /// `on_day` is invoked with a snapshot of each merged day so the caller
    /// can fan out enrichment while the stream keeps flowing. Day events
    /// whose date falls outside the week are logged and skipped; the stream
    /// continues.
    pub async fn ingest_week<F>(
        &self,
        week_number: u32,
        mut stream: EventStream,
        token: &Arc<CancellationToken>,
        mut on_day: F,
    ) -> Result<(), PlanError>
    where
        F: FnMut(Day),
    {
        loop {
            let event = tokio::select! {
                () = token.cancelled() => {
                    return Err(PlanError::Cancelled(
                        token.reason().unwrap_or_default(),
                    ));
                }
                event = stream.next() => event,
            };

            match event {
                Some(StreamEvent::Progress(progress)) => {
                    debug!(week = week_number, ?progress, "stream progress");
                }
                Some(StreamEvent::Heartbeat) => {
                    debug!(week = week_number, "stream heartbeat");
                }
                Some(StreamEvent::Day(day_event)) => {
                    let skeletons = day_event.skeletons();
                    let Some(merge) =
                        self.run
                            .merge_day(week_number, day_event.date, &skeletons)
                    else {
                        warn!(
                            week = week_number,
                            date = %day_event.date,
                            "day event outside week range, skipped"
                        );
                        continue;
                    };

                    if merge.inserted {
                        self.progress.record_day();
                        self.events.try_emit(PlanEvent::ProgressUpdated(
                            self.progress.snapshot(self.run.phase()),
                        ));
                    }
                    on_day(merge.day);
                }
                Some(StreamEvent::Complete(complete)) => {
                    self.run.complete_week(week_number, complete.summary);
                    self.events
                        .try_emit(PlanEvent::WeekReady { week_number });
                    return Ok(());
                }
                Some(StreamEvent::Error(error)) => {
                    if error.code == Some(402) {
                        return Err(PlanError::quota_exceeded("plan_stream"));
                    }
                    return Err(PlanError::stream(week_number, error.message));
                }
                None => {
                    return Err(PlanError::stream(
                        week_number,
                        "stream ended before complete",
                    ));
                }
            }
        }
    }
}
