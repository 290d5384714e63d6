//! Progress accounting with phase-weighted percentage derivation.

use crate::run::Phase;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A derived, point-in-time view of run progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Days merged so far.
    pub days_received: u32,
    /// Total day slots expected.
    pub total_days: u32,
    /// Meals with a recipe attached.
    pub meals_enriched: u32,
    /// Total meal slots expected.
    pub total_meals: u32,
    /// Image calls accounted for (success or failure).
    pub images_generated: u32,
    /// Total image calls expected.
    pub total_images: u32,
    /// Phase-weighted overall percentage, never regressing.
    pub overall_percent: f64,
}

/// Monotonic counters for days, meals, and images.
///
/// Counters only ever increase within a run; the derived percentage is
/// clamped against a high-water mark so it never regresses regardless of
/// the order results arrive in. Waiters are woken through a `Notify` rather
/// than a polling loop.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    days_received: AtomicU32,
    meals_enriched: AtomicU32,
    images_generated: AtomicU32,
    total_days: AtomicU32,
    total_meals: AtomicU32,
    total_images: AtomicU32,
    high_water: Mutex<f64>,
    notify: Notify,
}

impl ProgressTracker {
    /// Creates a tracker with zeroed counters and totals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets counters and installs the totals for a new run.
    pub fn reset(&self, total_days: u32, total_meals: u32, total_images: u32) {
        self.days_received.store(0, Ordering::SeqCst);
        self.meals_enriched.store(0, Ordering::SeqCst);
        self.images_generated.store(0, Ordering::SeqCst);
        self.total_days.store(total_days, Ordering::SeqCst);
        self.total_meals.store(total_meals, Ordering::SeqCst);
        self.total_images.store(total_images, Ordering::SeqCst);
        *self.high_water.lock() = 0.0;
        self.notify.notify_waiters();
    }

    /// Installs the final image total once the enriched-meal count is known.
    ///
    /// Only successfully enriched meals get an image call, so the image
    /// target shrinks when meals fail enrichment.
    pub fn set_total_images(&self, total: u32) {
        self.total_images.store(total, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Restores counters from a checkpoint snapshot on resume.
    pub fn restore(&self, days: u32, meals: u32, images: u32) {
        self.days_received.store(days, Ordering::SeqCst);
        self.meals_enriched.store(meals, Ordering::SeqCst);
        self.images_generated.store(images, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Records one merged day.
    pub fn record_day(&self) {
        self.days_received.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Records one enriched meal.
    pub fn record_meal(&self) {
        self.meals_enriched.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Records one image call as accounted for.
    ///
    /// Failed image calls are recorded too, so bounded waits cannot hang on
    /// a single failed image.
    pub fn record_image(&self) {
        self.images_generated.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Returns a snapshot with the percentage derived for the given phase.
    #[must_use]
    pub fn snapshot(&self, phase: Phase) -> ProgressSnapshot {
        let days_received = self.days_received.load(Ordering::SeqCst);
        let total_days = self.total_days.load(Ordering::SeqCst);
        let meals_enriched = self.meals_enriched.load(Ordering::SeqCst);
        let total_meals = self.total_meals.load(Ordering::SeqCst);
        let images_generated = self.images_generated.load(Ordering::SeqCst);
        let total_images = self.total_images.load(Ordering::SeqCst);

        let raw = match phase {
            Phase::Configuration => 0.0,
            Phase::Generating => Phase::Generating
                .band()
                .at(fraction(days_received, total_days)),
            Phase::Validation => Phase::Validation.band().start,
            Phase::RecipeDetailsGenerating => {
                let recipes = Phase::recipe_band().at(fraction(meals_enriched, total_meals));
                let images = Phase::image_band().at(fraction(images_generated, total_images))
                    - Phase::image_band().start;
                recipes + images
            }
            Phase::RecipeDetailsValidation | Phase::Saved => 100.0,
            Phase::Discarded | Phase::Cancelled | Phase::Failed => 0.0,
        };

        let overall_percent = if phase.is_terminal() && raw == 0.0 {
            // Torn-down runs report the high-water mark rather than snapping
            // back to zero mid-notification.
            *self.high_water.lock()
        } else {
            let mut high_water = self.high_water.lock();
            if raw > *high_water {
                *high_water = raw;
            }
            *high_water
        };

        ProgressSnapshot {
            days_received,
            total_days,
            meals_enriched,
            total_meals,
            images_generated,
            total_images,
            overall_percent,
        }
    }

    /// Waits until `target` is satisfied or the timeout elapses.
    ///
    /// Returns true if the target was reached in time. The check re-runs on
    /// every counter change; there is no polling interval.
    pub async fn wait_until<F>(&self, target: F, timeout: Duration) -> bool
    where
        F: Fn(&ProgressSnapshot) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut notified = std::pin::pin!(self.notify.notified());
        loop {
            notified.as_mut().enable();
            // Phase does not matter for counter targets; Generating gives a
            // fully populated snapshot.
            if target(&self.snapshot(Phase::Generating)) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified.as_mut())
                .await
                .is_err()
            {
                return target(&self.snapshot(Phase::Generating));
            }
            notified.set(self.notify.notified());
        }
    }
}

fn fraction(count: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(count) / f64::from(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tracker(days: u32, meals: u32, images: u32) -> ProgressTracker {
        let t = ProgressTracker::new();
        t.reset(days, meals, images);
        t
    }

    #[test]
    fn test_generating_band_interpolation() {
        let t = tracker(7, 21, 21);
        assert_eq!(t.snapshot(Phase::Generating).overall_percent, 10.0);

        for _ in 0..7 {
            t.record_day();
        }
        assert_eq!(t.snapshot(Phase::Generating).overall_percent, 75.0);
    }

    #[test]
    fn test_enrichment_weighs_recipes_before_images() {
        let t = tracker(7, 21, 21);
        for _ in 0..7 {
            t.record_day();
        }

        for _ in 0..21 {
            t.record_meal();
        }
        let recipes_done = t.snapshot(Phase::RecipeDetailsGenerating).overall_percent;
        assert_eq!(recipes_done, 90.0);

        for _ in 0..21 {
            t.record_image();
        }
        let all_done = t.snapshot(Phase::RecipeDetailsGenerating).overall_percent;
        assert_eq!(all_done, 95.0);
    }

    #[test]
    fn test_percentage_is_monotonic_across_phases() {
        let t = tracker(7, 21, 21);
        let mut last = 0.0;
        let mut check = |phase| {
            let p = t.snapshot(phase).overall_percent;
            assert!(p >= last, "{p} regressed below {last} in {phase}");
            last = p;
        };

        check(Phase::Configuration);
        t.record_day();
        check(Phase::Generating);
        t.record_meal();
        // Out-of-band meal completion while still generating must not
        // bounce the percentage around.
        check(Phase::Generating);
        for _ in 0..6 {
            t.record_day();
        }
        check(Phase::Generating);
        check(Phase::RecipeDetailsGenerating);
        for _ in 0..20 {
            t.record_meal();
        }
        t.record_image();
        check(Phase::RecipeDetailsGenerating);
        check(Phase::RecipeDetailsValidation);
    }

    #[test]
    fn test_terminal_phase_reports_high_water() {
        let t = tracker(7, 21, 21);
        for _ in 0..3 {
            t.record_day();
        }
        let mid = t.snapshot(Phase::Generating).overall_percent;
        assert!(mid > 10.0);
        assert_eq!(t.snapshot(Phase::Cancelled).overall_percent, mid);
    }

    #[test]
    fn test_zero_totals_do_not_divide() {
        let t = tracker(0, 0, 0);
        assert_eq!(t.snapshot(Phase::Generating).overall_percent, 10.0);
    }

    #[tokio::test]
    async fn test_wait_until_target_reached() {
        let t = Arc::new(tracker(7, 21, 21));

        let waiter = t.clone();
        let handle = tokio::spawn(async move {
            waiter
                .wait_until(|s| s.meals_enriched >= 2, Duration::from_secs(5))
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        t.record_meal();
        t.record_meal();

        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let t = tracker(7, 21, 21);
        let reached = t
            .wait_until(|s| s.meals_enriched >= 1, Duration::from_millis(20))
            .await;
        assert!(!reached);
    }

    #[tokio::test]
    async fn test_wait_until_immediate() {
        let t = tracker(7, 21, 21);
        t.record_day();
        let reached = t
            .wait_until(|s| s.days_received >= 1, Duration::from_millis(5))
            .await;
        assert!(reached);
    }
}
