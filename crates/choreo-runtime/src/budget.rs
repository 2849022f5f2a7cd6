#![forbid(unsafe_code)]

//! Adaptive frame budget: the feedback loop behind the scheduler.
//!
//! [`FrameBudget`] holds the per-frame time threshold and a 60-slot ring of
//! observed inter-frame durations. Each time the ring completes a fresh
//! 60-sample window, the threshold adapts:
//!
//! - window average below 12 ms (comfortably fast) → relax the threshold
//!   upward by 0.5 ms, toward the 16.67 ms frame interval;
//! - window average above 15 ms, or any single sample above 20 ms → tighten
//!   by 1.0 ms, toward the 8 ms floor.
//!
//! On top of the windowed loop sits the *bad citizen penalty*: when a single
//! job overruns 5 ms of wall clock, the scheduler calls
//! [`penalize`](FrameBudget::penalize) to tighten immediately by 1 ms. The
//! loop is self-healing — sustained clean frames relax the threshold back up.
//!
//! # Invariants
//!
//! 1. `threshold_ms` stays within `[MIN_THRESHOLD_MS, MAX_THRESHOLD_MS]`
//!    after any observation sequence.
//! 2. Windowed adaptation happens only on a complete 60-sample window, in
//!    bounded steps; penalties are the only other mutation path.
//! 3. Owned exclusively by the scheduler; nothing else mutates it.

use choreo_core::ring::FixedRing;

/// Lower clamp for the threshold (half a 60 fps frame, roughly).
pub const MIN_THRESHOLD_MS: f64 = 8.0;

/// Upper clamp for the threshold (one full 60 fps frame interval).
pub const MAX_THRESHOLD_MS: f64 = 16.67;

/// Samples per adaptation window.
const WINDOW_SIZE: usize = 60;

/// Window average below this is "comfortably fast".
const FAST_AVG_MS: f64 = 12.0;

/// Window average above this is "slow".
const SLOW_AVG_MS: f64 = 15.0;

/// Any single frame above this forces tightening regardless of the average.
const SPIKE_MS: f64 = 20.0;

/// Upward step when relaxing.
const RELAX_STEP_MS: f64 = 0.5;

/// Downward step when tightening.
const TIGHTEN_STEP_MS: f64 = 1.0;

/// Adaptive per-frame time budget.
#[derive(Debug)]
pub struct FrameBudget {
    threshold_ms: f64,
    durations: FixedRing<f64>,
    /// Samples accumulated toward the next adaptation window.
    window_fill: usize,
    adaptations: u64,
    penalties: u64,
}

impl FrameBudget {
    /// Create a budget starting at the maximum threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold_ms: MAX_THRESHOLD_MS,
            durations: FixedRing::new(WINDOW_SIZE),
            window_fill: 0,
            adaptations: 0,
            penalties: 0,
        }
    }

    /// Current threshold in milliseconds.
    #[must_use]
    pub fn threshold_ms(&self) -> f64 {
        self.threshold_ms
    }

    /// Record one inter-frame duration; adapts when a window completes.
    pub fn record_frame(&mut self, delta_ms: f64) {
        if !delta_ms.is_finite() || delta_ms < 0.0 {
            return;
        }
        self.durations.push(delta_ms);
        self.window_fill += 1;
        if self.window_fill >= WINDOW_SIZE {
            self.window_fill = 0;
            self.adapt();
        }
    }

    /// Immediate tightening applied when one job overruns its expected
    /// execution time.
    pub fn penalize(&mut self, amount_ms: f64) {
        let before = self.threshold_ms;
        self.threshold_ms = (self.threshold_ms - amount_ms).max(MIN_THRESHOLD_MS);
        self.penalties += 1;
        tracing::debug!(before, after = self.threshold_ms, "bad citizen penalty");
    }

    /// Mean of the retained frame durations (0.0 before any frame).
    #[must_use]
    pub fn average_frame_ms(&self) -> f64 {
        self.durations.mean()
    }

    /// Number of windowed adaptations performed.
    #[must_use]
    pub fn adaptations(&self) -> u64 {
        self.adaptations
    }

    /// Number of bad-citizen penalties applied.
    #[must_use]
    pub fn penalties(&self) -> u64 {
        self.penalties
    }

    fn adapt(&mut self) {
        let avg = self.durations.mean();
        let spike = self.durations.max();
        let before = self.threshold_ms;

        if avg > SLOW_AVG_MS || spike > SPIKE_MS {
            self.threshold_ms = (self.threshold_ms - TIGHTEN_STEP_MS).max(MIN_THRESHOLD_MS);
        } else if avg < FAST_AVG_MS {
            self.threshold_ms = (self.threshold_ms + RELAX_STEP_MS).min(MAX_THRESHOLD_MS);
        }

        if (self.threshold_ms - before).abs() > f64::EPSILON {
            self.adaptations += 1;
            tracing::trace!(avg, spike, before, after = self.threshold_ms, "threshold adapted");
        }
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(budget: &mut FrameBudget, delta_ms: f64, count: usize) {
        for _ in 0..count {
            budget.record_frame(delta_ms);
        }
    }

    // =========================================================================
    // Windowed adaptation
    // =========================================================================

    #[test]
    fn starts_at_max_threshold() {
        let budget = FrameBudget::new();
        assert!((budget.threshold_ms() - MAX_THRESHOLD_MS).abs() < f64::EPSILON);
    }

    #[test]
    fn no_adaptation_before_window_completes() {
        let mut budget = FrameBudget::new();
        feed(&mut budget, 30.0, 59);
        assert!((budget.threshold_ms() - MAX_THRESHOLD_MS).abs() < f64::EPSILON);
    }

    #[test]
    fn slow_window_tightens() {
        let mut budget = FrameBudget::new();
        feed(&mut budget, 16.0, 60);
        assert!((budget.threshold_ms() - (MAX_THRESHOLD_MS - 1.0)).abs() < 1e-9);
        assert_eq!(budget.adaptations(), 1);
    }

    #[test]
    fn single_spike_tightens_even_with_fast_average() {
        let mut budget = FrameBudget::new();
        feed(&mut budget, 8.0, 59);
        budget.record_frame(25.0);
        assert!(budget.threshold_ms() < MAX_THRESHOLD_MS);
    }

    #[test]
    fn fast_window_relaxes_after_penalty() {
        let mut budget = FrameBudget::new();
        budget.penalize(2.0);
        let tightened = budget.threshold_ms();
        feed(&mut budget, 8.0, 60);
        assert!((budget.threshold_ms() - (tightened + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn middling_window_leaves_threshold_alone() {
        let mut budget = FrameBudget::new();
        budget.penalize(1.0);
        let held = budget.threshold_ms();
        feed(&mut budget, 13.0, 60);
        assert!((budget.threshold_ms() - held).abs() < f64::EPSILON);
        assert_eq!(budget.adaptations(), 0);
    }

    #[test]
    fn relax_never_exceeds_max() {
        let mut budget = FrameBudget::new();
        for _ in 0..10 {
            feed(&mut budget, 8.0, 60);
        }
        assert!(budget.threshold_ms() <= MAX_THRESHOLD_MS);
    }

    #[test]
    fn tighten_never_drops_below_min() {
        let mut budget = FrameBudget::new();
        for _ in 0..30 {
            feed(&mut budget, 30.0, 60);
        }
        assert!((budget.threshold_ms() - MIN_THRESHOLD_MS).abs() < f64::EPSILON);
    }

    // =========================================================================
    // Penalties
    // =========================================================================

    #[test]
    fn penalty_tightens_immediately() {
        let mut budget = FrameBudget::new();
        budget.penalize(1.0);
        assert!((budget.threshold_ms() - (MAX_THRESHOLD_MS - 1.0)).abs() < 1e-9);
        assert_eq!(budget.penalties(), 1);
    }

    #[test]
    fn penalty_floors_at_min() {
        let mut budget = FrameBudget::new();
        for _ in 0..20 {
            budget.penalize(1.0);
        }
        assert!((budget.threshold_ms() - MIN_THRESHOLD_MS).abs() < f64::EPSILON);
    }

    // =========================================================================
    // Input hygiene
    // =========================================================================

    #[test]
    fn rejects_non_finite_and_negative_samples() {
        let mut budget = FrameBudget::new();
        budget.record_frame(f64::NAN);
        budget.record_frame(f64::INFINITY);
        budget.record_frame(-5.0);
        assert_eq!(budget.average_frame_ms(), 0.0);
    }
}
