#![forbid(unsafe_code)]

//! Runtime: frame-budgeted scheduling, section-snap navigation, and wiring.
//!
//! # Role in choreo
//! `choreo-runtime` owns the cooperative, single-threaded loop that turns
//! classified intents from `choreo-core` into section transitions while
//! keeping per-frame work inside an adaptive time budget.
//!
//! # Primary responsibilities
//! - **FrameScheduler**: priority work queue drained inside the host's
//!   per-frame callback under a shrinking/growing time budget.
//! - **FrameBudget**: the adaptive threshold and its 60-sample feedback loop.
//! - **Navigator**: the `Idle`/`Snapping` state machine that owns the section
//!   registry and admits at most one in-flight transition.
//! - **PerfMonitor**: developer-facing frame diagnostics (dropped frames,
//!   jank percentage, A–F grade). Observational only.
//! - **Engine**: composition root tying classifier, scheduler, navigator,
//!   and host together.
//!
//! # Concurrency model
//! Everything runs on one thread inside host frame callbacks and event
//! handlers. The only mutual exclusion in the system is the navigator's
//! `Snapping` phase, backed by a 500 ms self-expiring timeout for liveness.

pub mod budget;
pub mod clock;
pub mod diagnostics;
pub mod engine;
pub mod host;
pub mod navigator;
pub mod scheduler;

pub use budget::{FrameBudget, MAX_THRESHOLD_MS, MIN_THRESHOLD_MS};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use diagnostics::{PerfGrade, PerfMonitor, PerfReport};
pub use engine::{Engine, EngineConfig, EventDisposition, World};
pub use host::{Host, ScrollBehavior};
pub use navigator::{NavPhase, Navigator, NavigatorConfig, SectionMetrics};
pub use scheduler::{FrameOutcome, FrameScheduler, JobError, JobPriority, SchedulerStats};
