//! Streaming ingestion of week-plan events.

mod events;
mod ingestor;
mod sse;

pub use events::{CompleteEvent, DayEvent, ErrorEvent, ProgressEvent, StreamEvent};
pub use ingestor::StreamIngestor;
pub use sse::{SseFrame, SseParser};
