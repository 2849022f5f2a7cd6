#![forbid(unsafe_code)]

//! Exponentially-weighted scroll velocity smoothing.
//!
//! Raw wheel deltas arrive in noisy bursts. [`VelocityWindow`] converts them
//! into one smoothed scalar (pixels per millisecond) over a fixed 5-sample
//! sliding window, weighting recent samples more heavily:
//!
//! ```text
//! weight(sample i of n, oldest-first) = smoothing ^ (n - 1 - i)
//! smoothed = Σ weight·magnitude / Σ weight
//! ```
//!
//! With smoothing 0.3 the newest sample carries weight 1.0, the previous one
//! 0.3, then 0.09, and so on. A constant input therefore yields exactly that
//! input back, and a burst decays within a couple of samples once it stops.
//!
//! Raw samples are discarded as they fall out of the window; the only retained
//! history is an optional diagnostics ring capped at 100 entries, used for
//! profiling overlays and never for classification.

use web_time::Instant;

use crate::ring::FixedRing;

/// Sliding window size for velocity smoothing.
pub const VELOCITY_WINDOW: usize = 5;

/// Exponential smoothing base for sample weights.
pub const VELOCITY_SMOOTHING: f64 = 0.3;

/// Capacity of the optional diagnostics buffer.
pub const DIAGNOSTICS_CAPACITY: usize = 100;

/// One velocity observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    /// Scroll speed in pixels per millisecond. Always >= 0.
    pub magnitude: f64,
    /// When the sample was taken.
    pub at: Instant,
}

/// Fixed-size sliding window producing a smoothed velocity scalar.
#[derive(Debug)]
pub struct VelocityWindow {
    samples: FixedRing<VelocitySample>,
    diagnostics: Option<FixedRing<VelocitySample>>,
}

impl VelocityWindow {
    /// Create a window with no diagnostics retention.
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: FixedRing::new(VELOCITY_WINDOW),
            diagnostics: None,
        }
    }

    /// Create a window that additionally retains up to
    /// [`DIAGNOSTICS_CAPACITY`] recent samples for profiling.
    #[must_use]
    pub fn with_diagnostics() -> Self {
        Self {
            samples: FixedRing::new(VELOCITY_WINDOW),
            diagnostics: Some(FixedRing::new(DIAGNOSTICS_CAPACITY)),
        }
    }

    /// Record a raw delta observed over `elapsed_ms`.
    ///
    /// Negative deltas are folded into magnitude; direction is tracked by the
    /// classifier's accumulator, not here. An `elapsed_ms` of zero (two events
    /// in the same millisecond) is clamped to one millisecond rather than
    /// producing an infinite velocity.
    pub fn record(&mut self, delta_px: f64, elapsed_ms: f64, now: Instant) {
        let elapsed = elapsed_ms.max(1.0);
        self.push_sample(delta_px.abs() / elapsed, now);
    }

    /// Push an already-computed magnitude sample.
    pub fn push_sample(&mut self, magnitude: f64, now: Instant) {
        let sample = VelocitySample {
            magnitude: magnitude.max(0.0),
            at: now,
        };
        self.samples.push(sample);
        if let Some(diag) = &mut self.diagnostics {
            diag.push(sample);
        }
    }

    /// Smoothed velocity over the current window, in pixels per millisecond.
    ///
    /// Returns 0.0 for an empty window.
    #[must_use]
    pub fn smoothed(&self) -> f64 {
        let n = self.samples.len();
        if n == 0 {
            return 0.0;
        }
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (i, sample) in self.samples.iter().enumerate() {
            let weight = VELOCITY_SMOOTHING.powi((n - 1 - i) as i32);
            weighted += weight * sample.magnitude;
            total += weight;
        }
        weighted / total
    }

    /// Number of samples currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples have been recorded since the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop the window contents (diagnostics history is retained).
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Iterate retained diagnostics samples, oldest → newest.
    ///
    /// Empty iterator unless constructed via [`with_diagnostics`].
    ///
    /// [`with_diagnostics`]: VelocityWindow::with_diagnostics
    pub fn diagnostics(&self) -> impl Iterator<Item = &VelocitySample> {
        self.diagnostics.iter().flat_map(|ring| ring.iter())
    }
}

impl Default for VelocityWindow {
    fn default() -> Self {
        Self::new()
    }
}
