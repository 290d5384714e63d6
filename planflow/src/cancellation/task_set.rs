//! Tracked background task set joined before phase advancement.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Outcome of joining a task set with a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Tasks that completed (or panicked) before the deadline.
    pub completed: usize,
    /// Tasks still running at the deadline; these are aborted.
    pub aborted: usize,
}

impl JoinOutcome {
    /// Returns true if every task finished in time.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.aborted == 0
    }
}

/// A set of tracked background tasks.
///
/// Replaces untracked fire-and-forget spawns: every task is recorded so the
/// pipeline can join the whole set (with a timeout) at a phase boundary and
/// abort whatever is left, instead of leaving dangling operations behind.
#[derive(Default)]
pub struct TaskSet {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskSet {
    /// Creates an empty task set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a task into the set.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.lock().push(tokio::spawn(task));
    }

    /// Returns the number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns true if no tasks are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Aborts every tracked task without waiting.
    pub fn abort_all(&self) {
        for handle in self.handles.lock().iter() {
            handle.abort();
        }
    }

    /// Waits up to `timeout` for all tracked tasks, aborting leftovers.
    ///
    /// Task panics count as completed: the task is accounted for and will
    /// not be waited on again.
    pub async fn join_all(&self, timeout: Duration) -> JoinOutcome {
        let handles: Vec<_> = {
            let mut lock = self.handles.lock();
            std::mem::take(&mut *lock)
        };
        if handles.is_empty() {
            return JoinOutcome {
                completed: 0,
                aborted: 0,
            };
        }

        let total = handles.len();
        let abort_handles: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(_) => JoinOutcome {
                completed: total,
                aborted: 0,
            },
            Err(_) => {
                let mut aborted = 0;
                for handle in &abort_handles {
                    if !handle.is_finished() {
                        handle.abort();
                        aborted += 1;
                    }
                }
                JoinOutcome {
                    completed: total - aborted,
                    aborted,
                }
            }
        }
    }
}

impl std::fmt::Debug for TaskSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSet")
            .field("tracked", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_join_all_empty() {
        let set = TaskSet::new();
        let outcome = set.join_all(Duration::from_millis(10)).await;
        assert_eq!(outcome.completed, 0);
        assert!(outcome.all_completed());
    }

    #[tokio::test]
    async fn test_join_all_completes() {
        let set = TaskSet::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            set.spawn(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        let outcome = set.join_all(Duration::from_secs(1)).await;
        assert_eq!(outcome.completed, 3);
        assert!(outcome.all_completed());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_join_all_aborts_stragglers() {
        let set = TaskSet::new();

        set.spawn(async {});
        set.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        // Give the quick task a chance to finish first.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let outcome = set.join_all(Duration::from_millis(20)).await;
        assert_eq!(outcome.aborted, 1);
        assert_eq!(outcome.completed, 1);
    }

    #[tokio::test]
    async fn test_abort_all() {
        let set = TaskSet::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = counter.clone();
        set.spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        set.abort_all();
        let _ = set.join_all(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
