#![forbid(unsafe_code)]

//! Core: input events, gesture classification, and velocity smoothing.
//!
//! # Role in choreo
//! `choreo-core` is the input layer. It owns the canonical event types and the
//! stateful classifier that turns noisy, bursty wheel/touch/key streams into
//! discrete navigation intents (`Advance`, `Retreat`, absolute jumps).
//!
//! # Primary responsibilities
//! - **Event**: normalized input events (wheel, touch, key, raw scroll).
//! - **GestureClassifier**: accumulation, debouncing, and velocity-based
//!   intent emission with native-scroll suppression decisions.
//! - **VelocityWindow**: exponentially-weighted sliding window over scroll
//!   velocity samples.
//! - **FixedRing**: fixed-capacity circular buffer used for every bounded
//!   history in the system (frame durations, velocity samples, diagnostics).
//!
//! # How it fits in the system
//! The runtime (`choreo-runtime`) consumes intents and suppression decisions
//! from this crate and drives the frame scheduler and section navigator. This
//! crate knows nothing about frames, budgets, or sections beyond the small
//! [`gesture::NavContext`] snapshot it is handed per event.

pub mod event;
pub mod gesture;
pub mod ring;
pub mod velocity;

pub use event::{InputEvent, Intent, KeyCode, ScrollEvent, TouchPoint, WheelEvent};
pub use gesture::{Classification, GestureClassifier, GestureConfig, NavContext, WheelMode};
pub use ring::FixedRing;
pub use velocity::{VelocitySample, VelocityWindow};
