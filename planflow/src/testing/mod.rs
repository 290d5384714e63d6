//! Test doubles and fixtures for pipeline tests.
//!
//! Scripted mocks for the external services plus fixture builders for
//! configs and week scripts. Available to downstream crates for their own
//! pipeline tests.

mod fixtures;
mod mocks;

pub use fixtures::{day_event, test_config, test_preferences, week_script};
pub use mocks::{
    FailingCheckpointStore, RecordingRepository, ScriptedImageService, ScriptedRecipeService,
    ScriptedStreamService,
};
