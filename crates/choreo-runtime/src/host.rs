#![forbid(unsafe_code)]

//! Platform abstraction between the engine and the embedding environment.
//!
//! A browser embedding implements [`Host`] over DOM handles and
//! `requestAnimationFrame`; test harnesses implement it over plain structs.
//! The engine never touches the platform directly, which is what keeps the
//! whole subsystem hermetic under test.

/// How a programmatic scroll should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Animated scrolling (the default for snap transitions).
    Smooth,
    /// Jump without animation. Selected automatically when the host reports
    /// a reduced-motion preference.
    Instant,
}

/// Effects the engine asks of its embedding environment.
pub trait Host {
    /// Opaque section element handle owned by the navigator's registry.
    type Elem;

    /// Scroll the element to the top of the viewport.
    fn scroll_into_view(&mut self, elem: &Self::Elem, behavior: ScrollBehavior);

    /// Toggle the page-level "pointer interactions disabled" flag used to
    /// avoid double-triggering during a transition.
    fn set_pointer_interactions(&mut self, enabled: bool);

    /// Accessibility capability query. When true, the navigator downgrades
    /// every transition to [`ScrollBehavior::Instant`].
    fn prefers_reduced_motion(&self) -> bool {
        false
    }

    /// Ask the platform for another frame callback. Called whenever the
    /// scheduler has pending work and no frame loop is active.
    fn request_frame(&mut self);
}
