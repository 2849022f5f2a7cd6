#![forbid(unsafe_code)]

//! Gesture classification: raw wheel/touch/key events into navigation intents.
//!
//! [`GestureClassifier`] is a stateful processor that converts noisy, bursty
//! input streams into discrete [`Intent`]s ("one gesture, one section") and
//! decides when native scrolling must be suppressed.
//!
//! # State Machine
//!
//! The classifier tracks several concurrent detectors:
//!
//! - **Wheel accumulator**: sums deltas of one continuous gesture; a gap of
//!   more than the configured gesture gap (default 150 ms) starts a new
//!   gesture. Settlement is *polled* — the owner asks via
//!   [`poll_wheel_settle`](GestureClassifier::poll_wheel_settle) once the
//!   debounce window (default 100 ms) has elapsed, so all timing authority can
//!   live with the frame scheduler.
//! - **Velocity detector** (optional, [`WheelMode::Velocity`]): an
//!   exponentially-weighted 5-sample window; an intent fires immediately when
//!   the smoothed velocity crosses the threshold, trading determinism for
//!   latency.
//! - **Swipe detector**: touch-start/touch-end pairs; a swipe longer than
//!   50 px completed within 300 ms emits one intent.
//! - **Key mapper**: ArrowDown/PageDown/Space advance, ArrowUp/PageUp
//!   retreat, Home/End jump absolutely (bypassing wheel/touch throttling).
//!
//! # Invariants
//!
//! 1. At most one intent is emitted per processed event or settle poll.
//! 2. No wheel or touch intent is emitted while the navigator reports
//!    `snapping` — events are still consumed (and suppressed) to keep native
//!    scroll from competing with the programmatic transition.
//! 3. Suppression is exempted inside the first section so its in-page
//!    scrolling and entry animations stay native. Intents are still emitted
//!    there; only the suppression flag differs.
//! 4. After [`reset`](GestureClassifier::reset), all detectors return to
//!    their initial idle state.
//!
//! # Failure Modes
//!
//! - A touch-end without a matching touch-start is ignored (input anomaly).
//! - A settle poll while mid-transition clears the accumulator and emits
//!   nothing, so a stale gesture cannot fire after the transition ends.

use web_time::{Duration, Instant};

use crate::event::{InputEvent, Intent, KeyCode};
use crate::velocity::VelocityWindow;

/// Nominal inter-event spacing assumed for the first sample of a wheel
/// gesture, when there is no previous event to measure against.
const NOMINAL_WHEEL_SPACING_MS: f64 = 16.7;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which wheel classification path is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelMode {
    /// Accumulate deltas, emit after a quiet debounce window. Deterministic.
    Debounced,
    /// Emit as soon as the smoothed velocity crosses the threshold. Lower
    /// latency, used by the performance-tuned variant.
    Velocity,
}

/// Thresholds and timeouts for gesture classification.
#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Wheel sensitivity. The accumulated-delta threshold in pixels is
    /// `wheel_sensitivity * 1000.0` (default: 0.05, i.e. 50 px).
    pub wheel_sensitivity: f64,
    /// Quiet window after the last wheel event before the accumulator is
    /// evaluated (default: 100 ms).
    pub wheel_debounce: Duration,
    /// Gap between wheel events beyond which the accumulator restarts as a
    /// new gesture (default: 150 ms).
    pub wheel_gesture_gap: Duration,
    /// Active wheel path (default: [`WheelMode::Debounced`]).
    pub wheel_mode: WheelMode,
    /// Smoothed-velocity threshold in px/ms for [`WheelMode::Velocity`]
    /// (default: 0.8).
    pub velocity_threshold: f64,
    /// Minimum vertical travel for a swipe, in pixels (default: 50.0).
    pub touch_min_distance: f64,
    /// Maximum duration of a swipe (default: 300 ms).
    pub touch_max_duration: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            wheel_sensitivity: 0.05,
            wheel_debounce: Duration::from_millis(100),
            wheel_gesture_gap: Duration::from_millis(150),
            wheel_mode: WheelMode::Debounced,
            velocity_threshold: 0.8,
            touch_min_distance: 50.0,
            touch_max_duration: Duration::from_millis(300),
        }
    }
}

impl GestureConfig {
    /// Accumulated-delta threshold in pixels.
    #[must_use]
    pub fn wheel_threshold_px(&self) -> f64 {
        self.wheel_sensitivity * 1000.0
    }
}

// ---------------------------------------------------------------------------
// Context and output
// ---------------------------------------------------------------------------

/// Snapshot of navigator state the classifier needs per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavContext {
    /// Current section index.
    pub current_index: usize,
    /// Number of registered sections.
    pub section_count: usize,
    /// True while a snap transition is in flight.
    pub snapping: bool,
}

impl NavContext {
    /// True inside the first section, where native-scroll suppression is
    /// exempted.
    #[must_use]
    pub fn in_first_section(&self) -> bool {
        self.current_index == 0
    }
}

/// Result of classifying one input event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Intents produced by this event (at most one).
    pub intents: Vec<Intent>,
    /// Whether the host should suppress the event's native effect.
    pub suppress_native: bool,
}

impl Classification {
    fn suppressed(suppress: bool) -> Self {
        Self {
            intents: Vec::new(),
            suppress_native: suppress,
        }
    }

    fn with_intent(intent: Option<Intent>, suppress: bool) -> Self {
        Self {
            intents: intent.into_iter().collect(),
            suppress_native: suppress,
        }
    }
}

// ---------------------------------------------------------------------------
// GestureClassifier
// ---------------------------------------------------------------------------

/// Stateful classifier turning raw events into rate-limited intents.
///
/// Call [`process`](GestureClassifier::process) for each incoming event. In
/// [`WheelMode::Debounced`], also call
/// [`poll_wheel_settle`](GestureClassifier::poll_wheel_settle) once
/// [`wheel_settle_due`](GestureClassifier::wheel_settle_due) has passed.
#[derive(Debug)]
pub struct GestureClassifier {
    config: GestureConfig,

    // Wheel tracking
    wheel_accum: f64,
    last_wheel_at: Option<Instant>,
    velocity: VelocityWindow,

    // Touch tracking
    touch_start: Option<(f64, Instant)>,
}

impl GestureClassifier {
    /// Create a classifier with the given configuration.
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            wheel_accum: 0.0,
            last_wheel_at: None,
            velocity: VelocityWindow::new(),
            touch_start: None,
        }
    }

    /// Create a classifier with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(GestureConfig::default())
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Process one raw event against the current navigation context.
    pub fn process(&mut self, event: &InputEvent, ctx: NavContext, now: Instant) -> Classification {
        match event {
            InputEvent::Wheel(wheel) => self.on_wheel(wheel.delta_y, ctx, now),
            InputEvent::TouchStart(touch) => {
                self.touch_start = Some((touch.y, now));
                Classification::suppressed(self.suppress_for(ctx))
            }
            InputEvent::TouchEnd(touch) => self.on_touch_end(touch.y, ctx, now),
            InputEvent::Key(code) => self.on_key(*code, ctx),
            // Raw scroll observations belong to the navigator; nothing to
            // classify and nothing to suppress.
            InputEvent::Scroll(_) => Classification::default(),
        }
    }

    /// Evaluate the wheel accumulator once the debounce window has elapsed.
    ///
    /// Returns the settled intent, if the accumulated magnitude cleared the
    /// threshold. Clears the accumulator either way. Calling before the
    /// window has elapsed is a no-op returning `None`.
    pub fn poll_wheel_settle(&mut self, ctx: NavContext, now: Instant) -> Option<Intent> {
        let last = self.last_wheel_at?;
        if now.duration_since(last) < self.config.wheel_debounce {
            return None;
        }

        let accumulated = self.wheel_accum;
        self.wheel_accum = 0.0;
        self.last_wheel_at = None;
        self.velocity.clear();

        // Mid-transition gestures are captured but never settle into intents.
        if ctx.snapping {
            return None;
        }

        if accumulated.abs() > self.config.wheel_threshold_px() {
            let intent = if accumulated > 0.0 {
                Intent::Advance
            } else {
                Intent::Retreat
            };
            tracing::trace!(accumulated, ?intent, "wheel gesture settled");
            Some(intent)
        } else {
            None
        }
    }

    /// Earliest instant at which a settle poll can produce an intent, or
    /// `None` when no wheel gesture is pending.
    #[must_use]
    pub fn wheel_settle_due(&self) -> Option<Instant> {
        self.last_wheel_at
            .map(|at| at + self.config.wheel_debounce)
    }

    /// True while wheel deltas are accumulated toward a pending settle.
    #[must_use]
    pub fn wheel_pending(&self) -> bool {
        self.last_wheel_at.is_some()
    }

    /// Return all detectors to their initial idle state.
    pub fn reset(&mut self) {
        self.wheel_accum = 0.0;
        self.last_wheel_at = None;
        self.velocity.clear();
        self.touch_start = None;
    }

    // -----------------------------------------------------------------------
    // Per-path handlers
    // -----------------------------------------------------------------------

    fn on_wheel(&mut self, delta_y: f64, ctx: NavContext, now: Instant) -> Classification {
        let elapsed_ms = match self.last_wheel_at {
            Some(prev) => {
                let elapsed = now.duration_since(prev);
                if elapsed > self.config.wheel_gesture_gap {
                    // Long gap: this delta starts a new gesture.
                    self.wheel_accum = delta_y;
                } else {
                    self.wheel_accum += delta_y;
                }
                elapsed.as_secs_f64() * 1000.0
            }
            None => {
                self.wheel_accum = delta_y;
                NOMINAL_WHEEL_SPACING_MS
            }
        };
        self.last_wheel_at = Some(now);
        self.velocity.record(delta_y, elapsed_ms, now);

        let suppress = self.suppress_for(ctx);

        if self.config.wheel_mode == WheelMode::Velocity
            && !ctx.snapping
            && self.velocity.smoothed() > self.config.velocity_threshold
        {
            let intent = if self.wheel_accum >= 0.0 {
                Intent::Advance
            } else {
                Intent::Retreat
            };
            tracing::trace!(
                velocity = self.velocity.smoothed(),
                ?intent,
                "velocity threshold crossed"
            );
            self.wheel_accum = 0.0;
            self.velocity.clear();
            return Classification::with_intent(Some(intent), suppress);
        }

        Classification::suppressed(suppress)
    }

    fn on_touch_end(&mut self, end_y: f64, ctx: NavContext, now: Instant) -> Classification {
        let suppress = self.suppress_for(ctx);
        let Some((start_y, started)) = self.touch_start.take() else {
            // Touch end without a start: input anomaly, ignore.
            return Classification::suppressed(suppress);
        };

        let travel = start_y - end_y; // positive: finger moved up (advance)
        let elapsed = now.duration_since(started);

        if ctx.snapping
            || travel.abs() <= self.config.touch_min_distance
            || elapsed >= self.config.touch_max_duration
        {
            return Classification::suppressed(suppress);
        }

        let intent = if travel > 0.0 {
            Intent::Advance
        } else {
            Intent::Retreat
        };
        tracing::trace!(travel, elapsed_ms = elapsed.as_millis() as u64, ?intent, "swipe");
        Classification::with_intent(Some(intent), suppress)
    }

    fn on_key(&mut self, code: KeyCode, ctx: NavContext) -> Classification {
        // Home/End bypass throttling entirely; the navigator's snapping mutex
        // still applies at dispatch.
        let jump = match code {
            KeyCode::Home => Some(Intent::JumpTo(0)),
            KeyCode::End => ctx.section_count.checked_sub(1).map(Intent::JumpTo),
            _ => None,
        };
        if let Some(intent) = jump {
            return Classification::with_intent(Some(intent), self.suppress_for(ctx));
        }

        let intent = match code {
            KeyCode::ArrowDown | KeyCode::PageDown | KeyCode::Space => Some(Intent::Advance),
            KeyCode::ArrowUp | KeyCode::PageUp => Some(Intent::Retreat),
            _ => return Classification::default(),
        };
        if ctx.snapping {
            return Classification::suppressed(self.suppress_for(ctx));
        }
        Classification::with_intent(intent, self.suppress_for(ctx))
    }

    /// Native suppression rule: suppress everywhere except inside the first
    /// section, and always while a transition is in flight.
    fn suppress_for(&self, ctx: NavContext) -> bool {
        ctx.snapping || !ctx.in_first_section()
    }
}
