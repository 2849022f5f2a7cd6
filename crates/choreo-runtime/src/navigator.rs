#![forbid(unsafe_code)]

//! Section-snap navigation state machine.
//!
//! [`Navigator`] owns the ordered registry of section elements and the
//! current-section index. It has exactly two states:
//!
//! ```text
//! Idle ── valid intent ──► Snapping ── complete | 500ms timeout ──► Idle
//!   ▲                        │
//!   └── any intent ignored ──┘
//! ```
//!
//! # Invariants
//!
//! 1. At most one transition is in flight: while `Snapping`, every new intent
//!    is ignored. This is the system's principal ordering guarantee — the
//!    phase flag is the only mutex in the program.
//! 2. `current_index` changes only through an accepted transition (updated
//!    optimistically at dispatch) or a raw-scroll recompute while `Idle` —
//!    never speculatively from input.
//! 3. The 500 ms timeout forcibly returns to `Idle` if the host never signals
//!    completion (interrupted smooth scroll, tab blur), trading a possibly
//!    stale index for liveness.
//! 4. Reduced motion is applied here, at the single scroll-invocation
//!    boundary, so every path (wheel, touch, keyboard) honors it uniformly.
//!
//! # Section registry
//!
//! Sections register by mount index; indices are stable for the page's
//! lifetime. Unregistering marks the slot vacant without remapping the
//! indices of later sections; a vacant slot simply cannot be navigated to.
//! If the current section's slot is vacated, `current_index` is clamped to
//! the nearest registered section so the machine never points into a hole.

use web_time::{Duration, Instant};

use choreo_core::event::Intent;
use choreo_core::gesture::NavContext;

use crate::host::{Host, ScrollBehavior};

/// Fallback that forces `Snapping → Idle` when completion never arrives.
pub const DEFAULT_SNAP_TIMEOUT: Duration = Duration::from_millis(500);

/// Navigation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPhase {
    Idle,
    /// A transition is in flight; new intents are ignored.
    Snapping,
}

/// Viewport geometry of a registered section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionMetrics {
    /// Document-relative top offset in pixels.
    pub top: f64,
    /// Section height in pixels.
    pub height: f64,
}

#[derive(Debug)]
struct Section<E> {
    elem: E,
    metrics: SectionMetrics,
}

/// Navigator tuning.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Scroll behavior for transitions when motion is allowed.
    pub behavior: ScrollBehavior,
    /// Stall timeout forcing a return to `Idle`.
    pub snap_timeout: Duration,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            behavior: ScrollBehavior::Smooth,
            snap_timeout: DEFAULT_SNAP_TIMEOUT,
        }
    }
}

/// Lifetime counters, developer-visible only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavStats {
    pub transitions: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub ignored_intents: u64,
    pub scroll_recomputes: u64,
}

/// The section-snap state machine. Generic over the host's element handle.
#[derive(Debug)]
pub struct Navigator<E> {
    config: NavigatorConfig,
    sections: Vec<Option<Section<E>>>,
    current: usize,
    phase: NavPhase,
    /// Position within the current section, `[0, 1]`. Feeds visual effects;
    /// never consulted by the snap logic itself.
    progress: f64,
    snap_started: Option<Instant>,
    stats: NavStats,
}

impl<E> Navigator<E> {
    /// Create an empty navigator.
    #[must_use]
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            config,
            sections: Vec::new(),
            current: 0,
            phase: NavPhase::Idle,
            progress: 0.0,
            snap_started: None,
            stats: NavStats::default(),
        }
    }

    /// Create a navigator with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(NavigatorConfig::default())
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register (or re-register) the section at `index`.
    ///
    /// Idempotent: re-registering replaces the handle and metrics, which is
    /// how hosts push updated geometry after a resize.
    pub fn register_section(&mut self, index: usize, elem: E, metrics: SectionMetrics) {
        if index >= self.sections.len() {
            self.sections.resize_with(index + 1, || None);
        }
        self.sections[index] = Some(Section { elem, metrics });
    }

    /// Vacate the slot at `index`. Returns whether a section was removed.
    ///
    /// Later sections keep their indices; `current_index` is clamped to the
    /// nearest registered section if its own slot was vacated.
    pub fn unregister_section(&mut self, index: usize) -> bool {
        let Some(slot) = self.sections.get_mut(index) else {
            return false;
        };
        if slot.take().is_none() {
            return false;
        }
        while self.sections.last().is_some_and(Option::is_none) {
            self.sections.pop();
        }
        if self.section(self.current).is_none() {
            self.current = self.nearest_registered(self.current).unwrap_or(0);
            self.progress = 0.0;
        }
        true
    }

    /// Number of section slots (including transiently vacant ones).
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Registered metrics for `index`, if any.
    #[must_use]
    pub fn section_metrics(&self, index: usize) -> Option<SectionMetrics> {
        self.section(index).map(|s| s.metrics)
    }

    // -----------------------------------------------------------------------
    // State exposure (read-only for effect consumers)
    // -----------------------------------------------------------------------

    /// Current section index.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// True while a transition is in flight.
    #[must_use]
    pub fn is_snapping(&self) -> bool {
        self.phase == NavPhase::Snapping
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> NavPhase {
        self.phase
    }

    /// Position within the current section, `[0, 1]`.
    #[must_use]
    pub fn section_progress(&self) -> f64 {
        self.progress
    }

    /// Snapshot for the gesture classifier.
    #[must_use]
    pub fn context(&self) -> NavContext {
        NavContext {
            current_index: self.current,
            section_count: self.sections.len(),
            snapping: self.is_snapping(),
        }
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> NavStats {
        self.stats
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    /// Dispatch an intent. Returns `true` when a transition began.
    ///
    /// Ignored while `Snapping`, when the target leaves the valid range, or
    /// when the target slot is unregistered.
    pub fn handle_intent<H>(&mut self, intent: Intent, now: Instant, host: &mut H) -> bool
    where
        H: Host<Elem = E>,
    {
        if self.phase == NavPhase::Snapping {
            self.stats.ignored_intents += 1;
            tracing::trace!(?intent, "intent ignored: transition in flight");
            return false;
        }

        let Some(target) = intent.target(self.current, self.sections.len()) else {
            self.stats.ignored_intents += 1;
            return false;
        };
        let Some(section) = self.section(target) else {
            self.stats.ignored_intents += 1;
            return false;
        };

        let behavior = if host.prefers_reduced_motion() {
            ScrollBehavior::Instant
        } else {
            self.config.behavior
        };

        host.set_pointer_interactions(false);
        host.scroll_into_view(&section.elem, behavior);

        tracing::debug!(from = self.current, to = target, ?behavior, "snap started");
        self.phase = NavPhase::Snapping;
        self.snap_started = Some(now);
        // Optimistic: committed at dispatch, corrected only by a later raw
        // scroll recompute if the transition is interrupted.
        self.current = target;
        self.progress = 0.0;
        self.stats.transitions += 1;
        true
    }

    /// Host signal that the programmatic scroll finished.
    ///
    /// Returns the transition duration for diagnostics, or `None` when no
    /// transition was in flight.
    pub fn complete_transition<H>(&mut self, now: Instant, host: &mut H) -> Option<Duration>
    where
        H: Host<Elem = E>,
    {
        if self.phase != NavPhase::Snapping {
            return None;
        }
        let duration = self
            .snap_started
            .map(|started| now.duration_since(started))
            .unwrap_or_default();
        self.finish(host);
        self.stats.completed += 1;
        Some(duration)
    }

    /// Per-frame stall check. Returns `true` when the timeout fired.
    ///
    /// A transition whose completion never arrives (interrupted smooth
    /// scroll, tab blur) is force-committed after `snap_timeout`.
    pub fn tick<H>(&mut self, now: Instant, host: &mut H) -> bool
    where
        H: Host<Elem = E>,
    {
        let NavPhase::Snapping = self.phase else {
            return false;
        };
        let stalled = self
            .snap_started
            .is_some_and(|started| now.duration_since(started) >= self.config.snap_timeout);
        if stalled {
            tracing::debug!(index = self.current, "transition stalled; forcing idle");
            self.finish(host);
            self.stats.timed_out += 1;
        }
        stalled
    }

    /// Reconcile with a raw scroll observation (resize reflow, native scroll
    /// inside the first section). Only acts while `Idle` — scroll events
    /// caused by an in-flight snap are the transition's own.
    pub fn observe_scroll(&mut self, offset_y: f64, _now: Instant) {
        if self.phase == NavPhase::Snapping {
            return;
        }

        let registered: Vec<(usize, SectionMetrics)> = self
            .sections
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i, s.metrics)))
            .collect();
        if registered.is_empty() {
            return;
        }

        // Binary search over section tops: the last section whose top is at
        // or above the offset is the one the viewport sits in.
        let pos = registered.partition_point(|(_, m)| m.top <= offset_y);
        let (index, metrics) = if pos == 0 {
            registered[0]
        } else {
            registered[pos - 1]
        };

        self.current = index;
        self.progress = if metrics.height > 0.0 {
            ((offset_y - metrics.top) / metrics.height).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.stats.scroll_recomputes += 1;
    }

    fn finish<H>(&mut self, host: &mut H)
    where
        H: Host<Elem = E>,
    {
        self.phase = NavPhase::Idle;
        self.snap_started = None;
        host.set_pointer_interactions(true);
    }

    fn section(&self, index: usize) -> Option<&Section<E>> {
        self.sections.get(index).and_then(Option::as_ref)
    }

    fn nearest_registered(&self, from: usize) -> Option<usize> {
        // `from` may point past the end after trailing vacant slots are
        // trimmed.
        let from = from.min(self.sections.len());
        // Prefer earlier sections, then later ones.
        self.sections[..from]
            .iter()
            .rposition(Option::is_some)
            .or_else(|| {
                self.sections
                    .iter()
                    .skip(from)
                    .position(Option::is_some)
                    .map(|off| from + off)
            })
    }
}
