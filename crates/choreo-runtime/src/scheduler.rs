#![forbid(unsafe_code)]

//! Frame-budgeted priority scheduler.
//!
//! [`FrameScheduler`] executes deferred closures inside the host's per-frame
//! callback while respecting the adaptive [`FrameBudget`]. It is the single
//! timing authority of the system: snap transitions, wheel-settle checks, and
//! raw-scroll synchronization all run as jobs here.
//!
//! # Queue Discipline
//!
//! Jobs are held in a priority-ordered queue: a new job is inserted before
//! the first strictly-lower-priority job, so equal-priority jobs drain in
//! submission order (FIFO within a band) and `Immediate` always sits at the
//! head. Scheduling under an id already in the queue *replaces* the pending
//! job — at most one job per id is ever queued.
//!
//! # Per-Frame Algorithm
//!
//! 1. Record the inter-frame delta into the budget's 60-slot ring (windowed
//!    threshold adaptation lives in [`FrameBudget`]).
//! 2. Drain the queue head-first:
//!    - a job whose `not_before` has not arrived is deferred to a later
//!      frame without executing;
//!    - if remaining budget is under 2 ms and the head is not `Immediate`,
//!      yield to the next frame;
//!    - a job whose deadline has passed is dropped silently;
//!    - a failing action is logged and isolated — the drain continues;
//!    - a job that takes more than 5 ms of wall clock triggers the bad
//!      citizen penalty (threshold −1 ms, floor 8 ms) and ends the frame.
//! 3. Report whether another frame is needed.
//!
//! # Invariants
//!
//! 1. At most one pending job per id.
//! 2. `Immediate` jobs execute strictly before `High`, `High` before
//!    `Normal`, and so on; FIFO within each band.
//! 3. A failing or expired job never prevents later jobs from running.
//!
//! # Failure Modes
//!
//! | Condition | Behavior | Rationale |
//! |-----------|----------|-----------|
//! | Action returns `Err` | Log at `warn`, continue | Isolation (no retry) |
//! | Deadline passed | Drop silently | Best-effort scheduling |
//! | Job overruns 5 ms | Penalize budget, end frame | Protect later frames |
//! | Budget exhausted | Yield, resume next frame | Keep paint at 60 fps |

use std::collections::VecDeque;

use ahash::AHashSet;
use thiserror::Error;
use web_time::Instant;

use crate::budget::FrameBudget;
use crate::clock::{Clock, MonotonicClock};

/// Remaining-budget floor below which non-`Immediate` work yields.
const YIELD_FLOOR_MS: f64 = 2.0;

/// Single-job wall-clock limit before the bad citizen penalty applies.
const BAD_CITIZEN_MS: f64 = 5.0;

/// Threshold reduction applied by the bad citizen penalty.
const BAD_CITIZEN_PENALTY_MS: f64 = 1.0;

/// Priority band of a scheduled job, in ascending urgency.
///
/// `Immediate` always drains first and is exempt from the end-of-frame yield
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    Idle,
    Low,
    Normal,
    High,
    Immediate,
}

/// Error returned by a failing job action. Logged and swallowed by the
/// scheduler; never propagated.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct JobError(pub String);

impl JobError {
    /// Convenience constructor.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type for job actions.
pub type JobResult = Result<(), JobError>;

type JobAction<Ctx> = Box<dyn FnOnce(&mut Ctx, Instant) -> JobResult>;

/// One unit of deferred work. Created on schedule, consumed on execution or
/// expiry, never mutated in place.
struct ScheduledJob<Ctx> {
    id: String,
    priority: JobPriority,
    action: JobAction<Ctx>,
    /// If passed, the job is silently dropped instead of executed.
    deadline: Option<Instant>,
    /// Earliest frame timestamp at which the job may run (debounce support).
    not_before: Option<Instant>,
    enqueued_at: Instant,
}

impl<Ctx> std::fmt::Debug for ScheduledJob<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("deadline", &self.deadline)
            .field("not_before", &self.not_before)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}

/// What one frame accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Jobs whose action ran successfully.
    pub executed: usize,
    /// Jobs whose action returned an error (logged, not retried).
    pub failed: usize,
    /// Jobs dropped because their deadline had passed.
    pub dropped_expired: usize,
    /// Jobs pushed to a later frame by `not_before`.
    pub deferred: usize,
    /// True when the drain stopped early because the budget ran out.
    pub yielded: bool,
    /// True when a job overran the single-job limit this frame.
    pub penalized: bool,
    /// True when the queue still holds work and another frame is required.
    pub needs_frame: bool,
}

/// Counters over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub scheduled: u64,
    pub replaced: u64,
    pub cancelled: u64,
    pub executed: u64,
    pub failed: u64,
    pub dropped_expired: u64,
    pub frames: u64,
    pub yields: u64,
}

/// Priority work queue drained inside per-frame callbacks.
///
/// `Ctx` is the mutable world handed to every job action (the engine passes
/// its [`World`](crate::engine::World); unit tests pass whatever they like).
pub struct FrameScheduler<Ctx> {
    queue: VecDeque<ScheduledJob<Ctx>>,
    /// Ids currently queued; mirrors `queue` exactly.
    ids: AHashSet<String>,
    budget: FrameBudget,
    clock: Box<dyn Clock>,
    last_frame_start: Option<Instant>,
    /// True while a frame-processing loop is considered active.
    active: bool,
    stats: SchedulerStats,
}

impl<Ctx> std::fmt::Debug for FrameScheduler<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("pending", &self.queue.len())
            .field("active", &self.active)
            .field("threshold_ms", &self.budget.threshold_ms())
            .finish()
    }
}

impl<Ctx> FrameScheduler<Ctx> {
    /// Create a scheduler measuring time through the given clock.
    #[must_use]
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            queue: VecDeque::new(),
            ids: AHashSet::new(),
            budget: FrameBudget::new(),
            clock,
            last_frame_start: None,
            active: false,
            stats: SchedulerStats::default(),
        }
    }

    /// Create a scheduler on the real monotonic clock.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Box::new(MonotonicClock))
    }

    /// Insert or replace the job for `id`.
    ///
    /// Returns `true` when no frame loop was active — the caller must request
    /// a frame from the host to start one.
    pub fn schedule(
        &mut self,
        id: impl Into<String>,
        priority: JobPriority,
        action: impl FnOnce(&mut Ctx, Instant) -> JobResult + 'static,
    ) -> bool {
        self.schedule_with(id, priority, None, None, action)
    }

    /// Insert or replace the job for `id`, with optional deadline and
    /// earliest-run constraints.
    pub fn schedule_with(
        &mut self,
        id: impl Into<String>,
        priority: JobPriority,
        deadline: Option<Instant>,
        not_before: Option<Instant>,
        action: impl FnOnce(&mut Ctx, Instant) -> JobResult + 'static,
    ) -> bool {
        let id = id.into();

        if self.ids.contains(&id) {
            self.queue.retain(|job| job.id != id);
            self.stats.replaced += 1;
        } else {
            self.ids.insert(id.clone());
        }

        let job = ScheduledJob {
            id,
            priority,
            action: Box::new(action),
            deadline,
            not_before,
            enqueued_at: self.clock.now(),
        };

        // Stable insertion: before the first strictly-lower-priority job,
        // after every job of equal or higher priority.
        let position = self
            .queue
            .iter()
            .position(|existing| existing.priority < job.priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(position, job);
        self.stats.scheduled += 1;

        let needs_start = !self.active;
        self.active = true;
        needs_start
    }

    /// Remove a pending job. Returns whether anything was removed. Has no
    /// effect on a job already executing.
    pub fn cancel(&mut self, id: &str) -> bool {
        if !self.ids.remove(id) {
            return false;
        }
        self.queue.retain(|job| job.id != id);
        self.stats.cancelled += 1;
        true
    }

    /// True iff the time remaining in the current frame exceeds `estimate_ms`.
    ///
    /// Before the first frame, compares against the full threshold.
    #[must_use]
    pub fn has_budget(&self, estimate_ms: f64) -> bool {
        self.remaining_ms() > estimate_ms
    }

    /// Jobs currently queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// True when a job is queued under `id`.
    #[must_use]
    pub fn is_scheduled(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// The adaptive budget (read-only).
    #[must_use]
    pub fn budget(&self) -> &FrameBudget {
        &self.budget
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Run one frame's worth of work.
    ///
    /// `now` is the frame timestamp supplied by the host's frame callback;
    /// in-frame elapsed time is measured against the scheduler's clock.
    pub fn run_frame(&mut self, now: Instant, ctx: &mut Ctx) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();

        if let Some(prev) = self.last_frame_start {
            let delta_ms = now.duration_since(prev).as_secs_f64() * 1000.0;
            self.budget.record_frame(delta_ms);
        }
        self.last_frame_start = Some(now);
        self.stats.frames += 1;

        let mut deferred: Vec<ScheduledJob<Ctx>> = Vec::new();
        let mut scanned = 0usize;
        let queued_at_start = self.queue.len();

        while let Some(head) = self.queue.front() {
            // A single pass over what was queued at frame start; jobs we
            // defer must not be revisited this frame.
            if scanned >= queued_at_start {
                break;
            }

            if head.not_before.is_some_and(|at| now < at) {
                let job = self.queue.pop_front().expect("front checked");
                deferred.push(job);
                scanned += 1;
                outcome.deferred += 1;
                continue;
            }

            if self.remaining_ms() < YIELD_FLOOR_MS && head.priority != JobPriority::Immediate {
                outcome.yielded = true;
                self.stats.yields += 1;
                break;
            }

            let job = self.queue.pop_front().expect("front checked");
            scanned += 1;
            self.ids.remove(&job.id);

            if job.deadline.is_some_and(|deadline| now >= deadline) {
                outcome.dropped_expired += 1;
                self.stats.dropped_expired += 1;
                tracing::trace!(id = %job.id, "job expired before execution");
                continue;
            }

            let started = self.clock.now();
            let result = (job.action)(ctx, now);
            let took_ms = self.clock.now().duration_since(started).as_secs_f64() * 1000.0;

            match result {
                Ok(()) => {
                    outcome.executed += 1;
                    self.stats.executed += 1;
                }
                Err(error) => {
                    outcome.failed += 1;
                    self.stats.failed += 1;
                    tracing::warn!(id = %job.id, %error, "scheduled action failed");
                }
            }

            if took_ms > BAD_CITIZEN_MS {
                self.budget.penalize(BAD_CITIZEN_PENALTY_MS);
                outcome.penalized = true;
                tracing::debug!(id = %job.id, took_ms, "job overran single-job limit");
                break;
            }
        }

        // Deferred jobs return to the head in their original relative order.
        for job in deferred.into_iter().rev() {
            self.queue.push_front(job);
        }

        outcome.needs_frame = !self.queue.is_empty();
        if !outcome.needs_frame {
            self.active = false;
        }
        outcome
    }

    fn remaining_ms(&self) -> f64 {
        match self.last_frame_start {
            Some(start) => {
                let elapsed = self.clock.now().duration_since(start).as_secs_f64() * 1000.0;
                self.budget.threshold_ms() - elapsed
            }
            None => self.budget.threshold_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use web_time::Duration;

    type Log = Vec<&'static str>;

    fn scheduler() -> (FrameScheduler<Log>, ManualClock) {
        let clock = ManualClock::new(Instant::now());
        (FrameScheduler::new(Box::new(clock.clone())), clock)
    }

    fn mark(name: &'static str) -> impl FnOnce(&mut Log, Instant) -> JobResult {
        move |log, _| {
            log.push(name);
            Ok(())
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    // =========================================================================
    // Priority ordering
    // =========================================================================

    #[test]
    fn immediate_drains_before_lower_bands() {
        let (mut s, clock) = scheduler();
        s.schedule("a", JobPriority::Low, mark("low"));
        s.schedule("b", JobPriority::Immediate, mark("immediate"));
        s.schedule("c", JobPriority::Normal, mark("normal"));
        s.schedule("d", JobPriority::High, mark("high"));
        s.schedule("e", JobPriority::Idle, mark("idle"));

        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["immediate", "high", "normal", "low", "idle"]);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let (mut s, clock) = scheduler();
        s.schedule("a", JobPriority::Normal, mark("first"));
        s.schedule("b", JobPriority::Normal, mark("second"));
        s.schedule("c", JobPriority::Normal, mark("third"));

        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["first", "second", "third"]);
    }

    // =========================================================================
    // Deduplication
    // =========================================================================

    #[test]
    fn same_id_replaces_pending_job() {
        let (mut s, clock) = scheduler();
        s.schedule("snap", JobPriority::Immediate, mark("job_a"));
        s.schedule("snap", JobPriority::Immediate, mark("job_b"));
        assert_eq!(s.pending(), 1);

        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["job_b"]);
        assert_eq!(s.stats().replaced, 1);
    }

    #[test]
    fn replacement_can_change_priority() {
        let (mut s, clock) = scheduler();
        s.schedule("x", JobPriority::Idle, mark("old"));
        s.schedule("other", JobPriority::Normal, mark("other"));
        s.schedule("x", JobPriority::Immediate, mark("new"));

        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["new", "other"]);
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    #[test]
    fn cancel_removes_pending() {
        let (mut s, clock) = scheduler();
        s.schedule("a", JobPriority::Normal, mark("a"));
        assert!(s.cancel("a"));
        assert!(!s.cancel("a"));
        assert!(!s.is_scheduled("a"));

        let mut log = Log::new();
        let outcome = s.run_frame(clock.now(), &mut log);
        assert!(log.is_empty());
        assert!(!outcome.needs_frame);
    }

    // =========================================================================
    // Deadlines
    // =========================================================================

    #[test]
    fn expired_job_is_dropped_silently() {
        let (mut s, clock) = scheduler();
        let deadline = clock.now() + ms(10);
        s.schedule_with("late", JobPriority::Normal, Some(deadline), None, mark("late"));
        s.schedule("ok", JobPriority::Normal, mark("ok"));

        clock.advance(ms(20));
        let mut log = Log::new();
        let outcome = s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["ok"]);
        assert_eq!(outcome.dropped_expired, 1);
    }

    // =========================================================================
    // not_before (debounce support)
    // =========================================================================

    #[test]
    fn not_yet_due_job_is_deferred_not_executed() {
        let (mut s, clock) = scheduler();
        let due = clock.now() + ms(100);
        s.schedule_with("settle", JobPriority::Normal, None, Some(due), mark("settle"));

        let mut log = Log::new();
        let outcome = s.run_frame(clock.now(), &mut log);
        assert!(log.is_empty());
        assert_eq!(outcome.deferred, 1);
        assert!(outcome.needs_frame);

        clock.advance(ms(100));
        let outcome = s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["settle"]);
        assert!(!outcome.needs_frame);
    }

    #[test]
    fn deferred_job_does_not_block_due_work() {
        let (mut s, clock) = scheduler();
        let due = clock.now() + ms(100);
        s.schedule_with("later", JobPriority::High, None, Some(due), mark("later"));
        s.schedule("now", JobPriority::Normal, mark("now"));

        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["now"]);
        assert!(s.is_scheduled("later"));
    }

    // =========================================================================
    // Error isolation
    // =========================================================================

    #[test]
    fn failing_action_does_not_stop_the_drain() {
        let (mut s, clock) = scheduler();
        s.schedule("bad", JobPriority::High, |_log: &mut Log, _| {
            Err(JobError::new("boom"))
        });
        s.schedule("good", JobPriority::Normal, mark("good"));

        let mut log = Log::new();
        let outcome = s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["good"]);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.executed, 1);
    }

    // =========================================================================
    // Budget: yield and bad citizen
    // =========================================================================

    #[test]
    fn yields_when_budget_exhausted() {
        let (mut s, clock) = scheduler();
        // First frame to anchor frame start; then burn the whole budget.
        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);

        let burner = clock.clone();
        s.schedule("burn", JobPriority::Normal, move |log: &mut Log, _| {
            burner.advance(ms(16));
            log.push("burn");
            Ok(())
        });
        s.schedule("starved", JobPriority::Normal, mark("starved"));

        let outcome = s.run_frame(clock.now(), &mut log);
        // "burn" took 16ms of wall clock: it both exhausts the budget and
        // trips the bad-citizen limit, so "starved" waits for the next frame.
        assert_eq!(log, vec!["burn"]);
        assert!(outcome.penalized);
        assert!(outcome.needs_frame);

        let outcome = s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["burn", "starved"]);
        assert!(!outcome.needs_frame);
    }

    #[test]
    fn immediate_runs_even_with_exhausted_budget() {
        let (mut s, clock) = scheduler();
        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);

        // Three 5ms jobs leave well under 2ms of budget without any single
        // one tripping the bad-citizen limit.
        for id in ["burn1", "burn2", "burn3"] {
            let burner = clock.clone();
            s.schedule(id, JobPriority::Immediate, move |log: &mut Log, _| {
                burner.advance(ms(5));
                log.push("burn");
                Ok(())
            });
        }
        s.schedule("urgent", JobPriority::Immediate, mark("urgent"));
        s.schedule("casual", JobPriority::Normal, mark("casual"));

        let outcome = s.run_frame(clock.now(), &mut log);
        // All Immediate jobs ran despite the exhausted budget; Normal work
        // yielded to the next frame.
        assert_eq!(log, vec!["burn", "burn", "burn", "urgent"]);
        assert!(outcome.yielded);
        assert!(outcome.needs_frame);
    }

    #[test]
    fn bad_citizen_tightens_threshold_by_one_ms() {
        let (mut s, clock) = scheduler();
        let before = s.budget().threshold_ms();

        let slow = clock.clone();
        s.schedule("slow", JobPriority::Normal, move |log: &mut Log, _| {
            slow.advance(ms(8));
            log.push("slow");
            Ok(())
        });
        s.schedule("after", JobPriority::Normal, mark("after"));

        let mut log = Log::new();
        let outcome = s.run_frame(clock.now(), &mut log);
        assert_eq!(log, vec!["slow"], "frame ends after the overrun");
        assert!(outcome.penalized);
        assert!((s.budget().threshold_ms() - (before - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn threshold_floor_holds_under_repeated_penalties() {
        let (mut s, clock) = scheduler();
        for _ in 0..20 {
            let slow = clock.clone();
            s.schedule("slow", JobPriority::Normal, move |_: &mut Log, _| {
                slow.advance(ms(8));
                Ok(())
            });
            let mut log = Log::new();
            s.run_frame(clock.now(), &mut log);
            clock.advance(ms(16));
        }
        assert!(s.budget().threshold_ms() >= crate::budget::MIN_THRESHOLD_MS - 1e-9);
    }

    // =========================================================================
    // Frame loop lifecycle
    // =========================================================================

    #[test]
    fn schedule_reports_when_loop_must_start() {
        let (mut s, clock) = scheduler();
        assert!(s.schedule("a", JobPriority::Normal, mark("a")));
        assert!(!s.schedule("b", JobPriority::Normal, mark("b")));

        let mut log = Log::new();
        let outcome = s.run_frame(clock.now(), &mut log);
        assert!(!outcome.needs_frame);
        // Queue drained: the next schedule starts a fresh loop.
        assert!(s.schedule("c", JobPriority::Normal, mark("c")));
    }

    #[test]
    fn has_budget_tracks_frame_elapsed() {
        let (mut s, clock) = scheduler();
        assert!(s.has_budget(10.0));

        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);
        clock.advance(ms(14));
        assert!(!s.has_budget(10.0));
        assert!(s.has_budget(1.0));
    }

    #[test]
    fn inter_frame_deltas_feed_the_budget() {
        let (mut s, clock) = scheduler();
        let mut log = Log::new();
        s.run_frame(clock.now(), &mut log);
        for _ in 0..61 {
            clock.advance(ms(16));
            s.run_frame(clock.now(), &mut log);
        }
        // 16ms average: slow window, threshold tightened once.
        assert!(s.budget().threshold_ms() < crate::budget::MAX_THRESHOLD_MS);
    }
}
