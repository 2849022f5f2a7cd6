#![forbid(unsafe_code)]

//! Engine: composition root for classifier, scheduler, navigator, and host.
//!
//! The embedding hands the engine raw [`InputEvent`]s from its event handlers
//! and calls [`run_frame`](Engine::run_frame) from its per-frame callback.
//! Everything in between — debounce settling, snap dispatch, raw-scroll
//! reconciliation, stall timeouts — runs as jobs on the frame scheduler, so
//! a single component holds all timing authority.
//!
//! # Data flow
//!
//! ```text
//! events ─► GestureClassifier ─► Intent ─► "snap" job (Immediate)
//!                │                              │
//!                └─ pending wheel ─► "wheel-settle" job (Normal, not_before)
//!                                               ▼
//!                                          Navigator ─► Host scroll
//!                                               │
//! run_frame ─► FrameScheduler drain ─► FrameBudget feedback
//!        └─► Navigator stall tick      └─► PerfMonitor (observational)
//! ```
//!
//! # Job ids
//!
//! - `"snap"`: dispatches the latest intent. Re-scheduling replaces, so a
//!   burst of events yields one dispatch of the newest intent per frame.
//! - `"wheel-settle"`: evaluates the wheel accumulator. Every wheel event
//!   refreshes its `not_before`, which *is* the debounce window.
//! - `"scroll-sync"`: reconciles the navigator with the latest raw scroll
//!   offset at `Low` priority; replacement coalesces scroll storms.

use web_time::Instant;

use choreo_core::event::{InputEvent, Intent};
use choreo_core::gesture::{GestureClassifier, GestureConfig, WheelMode};

use crate::clock::Clock;
use crate::diagnostics::{PerfMonitor, PerfReport};
use crate::host::Host;
use crate::navigator::{Navigator, NavigatorConfig, SectionMetrics};
use crate::scheduler::{FrameOutcome, FrameScheduler, JobPriority, JobResult};

const SNAP_JOB: &str = "snap";
const WHEEL_SETTLE_JOB: &str = "wheel-settle";
const SCROLL_SYNC_JOB: &str = "scroll-sync";

/// Engine tuning, forwarded to the classifier and navigator.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub gesture: GestureConfig,
    pub navigator: NavigatorConfig,
}

/// What the embedding should do with the event it just delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDisposition {
    /// True when the event's native effect (scroll, key navigation) must be
    /// suppressed so it cannot compete with the programmatic transition.
    pub suppress_native: bool,
}

/// Mutable state handed to every scheduled job: the navigator, classifier,
/// monitor, and host, owned together so job closures can reach all of them.
pub struct World<H: Host> {
    host: H,
    navigator: Navigator<H::Elem>,
    classifier: GestureClassifier,
    monitor: PerfMonitor,
}

impl<H: Host> World<H> {
    /// The navigator's read-only state (for effect consumers).
    #[must_use]
    pub fn navigator(&self) -> &Navigator<H::Elem> {
        &self.navigator
    }

    /// The embedding host.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access for custom jobs.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Frame diagnostics.
    #[must_use]
    pub fn monitor(&self) -> &PerfMonitor {
        &self.monitor
    }

    fn dispatch_intent(&mut self, intent: Intent, now: Instant) {
        self.navigator.handle_intent(intent, now, &mut self.host);
    }

    fn tick(&mut self, now: Instant) -> bool {
        self.navigator.tick(now, &mut self.host)
    }

    fn complete_transition(&mut self, now: Instant) {
        if let Some(duration) = self.navigator.complete_transition(now, &mut self.host) {
            self.monitor.record_transition(duration);
        }
    }
}

/// The scroll choreography engine.
pub struct Engine<H: Host> {
    scheduler: FrameScheduler<World<H>>,
    world: World<H>,
    last_frame_at: Option<Instant>,
}

impl<H: Host> Engine<H> {
    /// Create an engine on the real monotonic clock.
    #[must_use]
    pub fn new(host: H, config: EngineConfig) -> Self {
        Self::assemble(host, config, FrameScheduler::with_defaults())
    }

    /// Create an engine measuring in-frame time through `clock`. Used by
    /// tests and virtual-time hosts.
    #[must_use]
    pub fn with_clock(host: H, config: EngineConfig, clock: Box<dyn Clock>) -> Self {
        Self::assemble(host, config, FrameScheduler::new(clock))
    }

    fn assemble(host: H, config: EngineConfig, scheduler: FrameScheduler<World<H>>) -> Self {
        Self {
            scheduler,
            world: World {
                host,
                navigator: Navigator::new(config.navigator),
                classifier: GestureClassifier::new(config.gesture),
                monitor: PerfMonitor::new(),
            },
            last_frame_at: None,
        }
    }

    // -----------------------------------------------------------------------
    // Event entry points
    // -----------------------------------------------------------------------

    /// Feed one raw input event.
    ///
    /// Returns whether the embedding must suppress the event's native effect.
    pub fn handle_event(&mut self, event: &InputEvent, now: Instant) -> EventDisposition {
        let ctx = self.world.navigator.context();
        let classification = self.world.classifier.process(event, ctx, now);

        let mut needs_frame = false;

        for intent in classification.intents.iter().copied() {
            needs_frame |= self.scheduler.schedule(
                SNAP_JOB,
                JobPriority::Immediate,
                move |world: &mut World<H>, now| {
                    world.dispatch_intent(intent, now);
                    Ok(())
                },
            );
        }

        if matches!(event, InputEvent::Wheel(_))
            && self.world.classifier.config().wheel_mode == WheelMode::Debounced
            && let Some(due) = self.world.classifier.wheel_settle_due()
        {
            // Replacing the job on every wheel event pushes `not_before`
            // forward: the replacement itself is the debounce.
            needs_frame |= self.scheduler.schedule_with(
                WHEEL_SETTLE_JOB,
                JobPriority::Normal,
                None,
                Some(due),
                |world: &mut World<H>, now| {
                    let ctx = world.navigator.context();
                    if let Some(intent) = world.classifier.poll_wheel_settle(ctx, now) {
                        world.dispatch_intent(intent, now);
                    }
                    Ok(())
                },
            );
        }

        if let InputEvent::Scroll(scroll) = event {
            let offset_y = scroll.offset_y;
            needs_frame |= self.scheduler.schedule(
                SCROLL_SYNC_JOB,
                JobPriority::Low,
                move |world: &mut World<H>, now| {
                    world.navigator.observe_scroll(offset_y, now);
                    Ok(())
                },
            );
        }

        if needs_frame {
            self.world.host.request_frame();
        }

        EventDisposition {
            suppress_native: classification.suppress_native,
        }
    }

    /// Host signal that the programmatic scroll finished.
    pub fn transition_complete(&mut self, now: Instant) {
        self.world.complete_transition(now);
    }

    // -----------------------------------------------------------------------
    // Frame loop
    // -----------------------------------------------------------------------

    /// Run one frame. Call from the host's per-frame callback.
    pub fn run_frame(&mut self, now: Instant) -> FrameOutcome {
        if let Some(prev) = self.last_frame_at {
            let delta_ms = now.duration_since(prev).as_secs_f64() * 1000.0;
            self.world.monitor.record_frame(delta_ms);
        }
        self.last_frame_at = Some(now);

        // Stall check before the drain so a timed-out navigator can accept
        // an intent dispatched in this same frame.
        self.world.tick(now);

        let outcome = self.scheduler.run_frame(now, &mut self.world);

        // Keep frames coming while work is queued or a transition needs its
        // stall timer serviced.
        if outcome.needs_frame || self.world.navigator.is_snapping() {
            self.world.host.request_frame();
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Registry and state passthroughs
    // -----------------------------------------------------------------------

    /// Register (or refresh) the section at `index`. Called by views on
    /// mount and after geometry changes.
    pub fn register_section(&mut self, index: usize, elem: H::Elem, metrics: SectionMetrics) {
        self.world.navigator.register_section(index, elem, metrics);
    }

    /// Vacate the section slot at `index`. Called by views on unmount.
    pub fn unregister_section(&mut self, index: usize) -> bool {
        self.world.navigator.unregister_section(index)
    }

    /// Current section index.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.world.navigator.current_index()
    }

    /// True while a transition is in flight.
    #[must_use]
    pub fn is_snapping(&self) -> bool {
        self.world.navigator.is_snapping()
    }

    /// Section-local scroll progress, `[0, 1]`.
    #[must_use]
    pub fn section_progress(&self) -> f64 {
        self.world.navigator.section_progress()
    }

    /// Frame-health snapshot.
    #[must_use]
    pub fn perf_report(&self) -> PerfReport {
        self.world.monitor.report()
    }

    /// Shared world state (navigator registry, host, diagnostics).
    #[must_use]
    pub fn world(&self) -> &World<H> {
        &self.world
    }

    /// The scheduler, for budget queries (`has_budget`) and stats.
    #[must_use]
    pub fn scheduler(&self) -> &FrameScheduler<World<H>> {
        &self.scheduler
    }

    /// Schedule a custom job on the shared frame loop.
    pub fn schedule_job(
        &mut self,
        id: impl Into<String>,
        priority: JobPriority,
        action: impl FnOnce(&mut World<H>, Instant) -> JobResult + 'static,
    ) {
        if self.scheduler.schedule(id, priority, action) {
            self.world.host.request_frame();
        }
    }

    /// Cancel a pending custom job.
    pub fn cancel_job(&mut self, id: &str) -> bool {
        self.scheduler.cancel(id)
    }
}
