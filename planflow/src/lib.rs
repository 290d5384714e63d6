//! # Planflow
//!
//! An orchestration pipeline for multi-week meal-plan generation.
//!
//! Planflow drives one generation run end to end:
//!
//! - **Phase state machine**: configuration, streaming, enrichment, and
//!   validation phases with fixed progress bands
//! - **Streaming ingestion**: one server-sent-event stream per week, merged
//!   incrementally into the plan with enriched meals preserved
//! - **Concurrent enrichment**: per-meal recipe details fanned out, image
//!   generation as tracked background tasks
//! - **Progress accounting**: monotonic counters with a phase-weighted,
//!   never-regressing overall percentage
//! - **Cooperative cancellation**: one shared token, bounded grace period,
//!   all-or-nothing teardown
//! - **Checkpoint and resume**: durable snapshots at phase boundaries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use planflow::prelude::*;
//!
//! let services = PlanServices::new(stream, recipes, images, repository);
//! let pipeline = MealPlanPipeline::new(services, checkpoints)
//!     .with_event_sink(Arc::new(LoggingEventSink::new()));
//!
//! let run = pipeline.start(user_id, config, &preferences).await?;
//! pipeline.save(true).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod checkpoint;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod events;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod run;
pub mod services;
pub mod stream;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, JoinOutcome, TaskSet};
    pub use crate::checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
    pub use crate::config::{EnrichmentPreferences, GenerationConfig, PipelineTimeouts};
    pub use crate::enrich::EnrichmentCoordinator;
    pub use crate::errors::PlanError;
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PlanEvent,
    };
    pub use crate::model::{
        Day, DetailedRecipe, Meal, MealSkeleton, MealType, NutritionFacts, WeekPlan, WeekStatus,
    };
    pub use crate::pipeline::{MealPlanPipeline, PlanServices};
    pub use crate::progress::{ProgressSnapshot, ProgressTracker};
    pub use crate::run::{GenerationRun, Phase, ProgressBand, RunHandle};
    pub use crate::services::{
        ImageGenerationService, ImageRequest, ImageResponse, PlanRepository, PlanStreamService,
        RecipeDetailRequest, RecipeDetailService, WeekStreamRequest,
    };
    pub use crate::stream::{SseParser, StreamEvent, StreamIngestor};

    #[cfg(feature = "http")]
    pub use crate::services::{
        HttpImageClient, HttpPlanStreamClient, HttpRecipeDetailClient, ServiceEndpoints,
    };
}
