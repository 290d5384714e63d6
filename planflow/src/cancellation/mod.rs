//! Cooperative cancellation shared by all in-flight operations of one run.

mod task_set;
mod token;

pub use task_set::{JoinOutcome, TaskSet};
pub use token::{CancelCallback, CancellationToken};
