#![forbid(unsafe_code)]

//! Frame-performance diagnostics: the developer-visible half of the
//! feedback loop.
//!
//! [`PerfMonitor`] samples frame deltas independently of the scheduler's
//! budget ring, counts dropped frames (delta above 20 ms), tracks transition
//! durations, and condenses everything into a coarse A–F grade. It is
//! observational only — nothing here feeds back into scheduling decisions;
//! the adaptive loop lives in [`FrameBudget`](crate::budget::FrameBudget).

use web_time::Duration;

use choreo_core::ring::FixedRing;

/// Frames slower than this are counted as dropped and as jank (50 fps floor).
pub const JANK_FRAME_MS: f64 = 20.0;

/// Retained frame-delta samples.
const FRAME_SAMPLE_CAPACITY: usize = 120;

/// Retained transition-duration samples.
const TRANSITION_SAMPLE_CAPACITY: usize = 20;

/// Coarse performance grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PerfGrade {
    A,
    B,
    C,
    D,
    F,
}

impl PerfGrade {
    /// Stable string for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

/// Snapshot of the monitor's view of frame health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfReport {
    /// Average frames per second over the sample window.
    pub average_fps: f64,
    /// Fraction of sampled frames slower than the 50 fps floor, `[0, 1]`.
    pub jank_ratio: f64,
    /// Total frames counted as dropped since construction.
    pub dropped_frames: u64,
    /// Average snap-transition duration in milliseconds (0 before any).
    pub average_transition_ms: f64,
    /// Condensed grade.
    pub grade: PerfGrade,
}

/// Rolling frame-health sampler.
#[derive(Debug)]
pub struct PerfMonitor {
    frame_deltas: FixedRing<f64>,
    transitions: FixedRing<f64>,
    dropped: u64,
    total_frames: u64,
}

impl PerfMonitor {
    /// Create an empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_deltas: FixedRing::new(FRAME_SAMPLE_CAPACITY),
            transitions: FixedRing::new(TRANSITION_SAMPLE_CAPACITY),
            dropped: 0,
            total_frames: 0,
        }
    }

    /// Record one inter-frame delta in milliseconds.
    pub fn record_frame(&mut self, delta_ms: f64) {
        if !delta_ms.is_finite() || delta_ms <= 0.0 {
            return;
        }
        self.total_frames += 1;
        if delta_ms > JANK_FRAME_MS {
            self.dropped += 1;
        }
        self.frame_deltas.push(delta_ms);
    }

    /// Record one completed snap-transition duration.
    pub fn record_transition(&mut self, duration: Duration) {
        self.transitions.push(duration.as_secs_f64() * 1000.0);
    }

    /// Average FPS over the retained window (0 before any frame).
    #[must_use]
    pub fn average_fps(&self) -> f64 {
        let mean = self.frame_deltas.mean();
        if mean <= 0.0 { 0.0 } else { 1000.0 / mean }
    }

    /// Fraction of retained frames above the jank floor.
    #[must_use]
    pub fn jank_ratio(&self) -> f64 {
        if self.frame_deltas.is_empty() {
            return 0.0;
        }
        let janky = self
            .frame_deltas
            .iter()
            .filter(|&&d| d > JANK_FRAME_MS)
            .count();
        janky as f64 / self.frame_deltas.len() as f64
    }

    /// Dropped frames since construction.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Average transition duration in milliseconds.
    #[must_use]
    pub fn average_transition_ms(&self) -> f64 {
        self.transitions.mean()
    }

    /// Condense the current samples into a report.
    #[must_use]
    pub fn report(&self) -> PerfReport {
        let average_fps = self.average_fps();
        let jank_ratio = self.jank_ratio();
        let average_transition_ms = self.average_transition_ms();

        // Score out of 100, deduction-based.
        let mut score = 100.0;
        score -= match average_fps {
            fps if fps >= 58.0 || fps == 0.0 => 0.0,
            fps if fps >= 50.0 => 10.0,
            fps if fps >= 40.0 => 25.0,
            _ => 40.0,
        };
        score -= match jank_ratio {
            r if r <= 0.05 => 0.0,
            r if r <= 0.15 => 10.0,
            r if r <= 0.30 => 25.0,
            _ => 40.0,
        };
        score -= match average_transition_ms {
            ms if ms <= 600.0 => 0.0,
            ms if ms <= 900.0 => 10.0,
            _ => 20.0,
        };

        let grade = match score {
            s if s >= 90.0 => PerfGrade::A,
            s if s >= 80.0 => PerfGrade::B,
            s if s >= 70.0 => PerfGrade::C,
            s if s >= 60.0 => PerfGrade::D,
            _ => PerfGrade::F,
        };

        PerfReport {
            average_fps,
            jank_ratio,
            dropped_frames: self.dropped,
            average_transition_ms,
            grade,
        }
    }
}

impl Default for PerfMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(monitor: &mut PerfMonitor, delta_ms: f64, count: usize) {
        for _ in 0..count {
            monitor.record_frame(delta_ms);
        }
    }

    #[test]
    fn clean_sixty_fps_grades_a() {
        let mut m = PerfMonitor::new();
        feed(&mut m, 16.7, 100);
        m.record_transition(Duration::from_millis(350));
        let report = m.report();
        assert_eq!(report.grade, PerfGrade::A);
        assert!((report.average_fps - 59.88).abs() < 0.1);
        assert_eq!(report.dropped_frames, 0);
    }

    #[test]
    fn sustained_slowness_fails() {
        let mut m = PerfMonitor::new();
        feed(&mut m, 40.0, 100);
        let report = m.report();
        assert_eq!(report.grade, PerfGrade::F);
        assert!((report.jank_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn occasional_jank_degrades_gradually() {
        let mut m = PerfMonitor::new();
        feed(&mut m, 16.7, 92);
        feed(&mut m, 30.0, 8);
        let report = m.report();
        assert!(report.grade <= PerfGrade::B, "got {:?}", report.grade);
        assert_eq!(report.dropped_frames, 8);
    }

    #[test]
    fn slow_transitions_deduct() {
        let mut m = PerfMonitor::new();
        feed(&mut m, 16.7, 60);
        m.record_transition(Duration::from_millis(1200));
        let fast = {
            let mut fast = PerfMonitor::new();
            feed(&mut fast, 16.7, 60);
            fast.record_transition(Duration::from_millis(300));
            fast.report()
        };
        assert_eq!(fast.grade, PerfGrade::A);
        assert_eq!(m.report().grade, PerfGrade::B);
        assert!(m.average_transition_ms() > 900.0);
    }

    #[test]
    fn empty_monitor_reports_neutral_a() {
        let m = PerfMonitor::new();
        let report = m.report();
        assert_eq!(report.grade, PerfGrade::A);
        assert_eq!(report.average_fps, 0.0);
    }

    #[test]
    fn rejects_bad_samples() {
        let mut m = PerfMonitor::new();
        m.record_frame(f64::NAN);
        m.record_frame(-3.0);
        m.record_frame(0.0);
        assert_eq!(m.report().dropped_frames, 0);
        assert_eq!(m.average_fps(), 0.0);
    }

    #[test]
    fn dropped_count_survives_window_eviction() {
        let mut m = PerfMonitor::new();
        feed(&mut m, 25.0, 10);
        feed(&mut m, 16.7, 200); // evicts the janky samples from the window
        assert_eq!(m.dropped_frames(), 10);
        assert!(m.jank_ratio() < 0.01);
    }
}
