#![forbid(unsafe_code)]

//! Canonical input events and navigation intents.
//!
//! Events are deliberately minimal: the host (a browser shim, a test harness)
//! normalizes platform events into these types and passes a monotonic `now`
//! alongside each one, so nothing in this crate reads a clock of its own.

/// Key identity for the navigation-relevant subset of the keyboard.
///
/// Anything else maps to [`KeyCode::Other`] and is ignored by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    ArrowUp,
    ArrowDown,
    PageUp,
    PageDown,
    Space,
    Home,
    End,
    Other,
}

/// A single wheel event.
///
/// `delta_y` follows platform convention: positive scrolls the content down
/// (the user wants to advance), negative scrolls up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    /// Vertical wheel delta in pixels.
    pub delta_y: f64,
}

/// A touch contact point. Only the vertical coordinate matters for
/// section-snap classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    /// Viewport-relative vertical position in pixels.
    pub y: f64,
}

/// A raw scroll observation (e.g. resize-driven reflow), reported as the
/// page's current vertical scroll offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    /// Current vertical scroll offset in pixels.
    pub offset_y: f64,
}

/// Normalized input event stream consumed by the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Wheel(WheelEvent),
    TouchStart(TouchPoint),
    TouchEnd(TouchPoint),
    Key(KeyCode),
    Scroll(ScrollEvent),
}

/// A classified, discrete navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Move one section down.
    Advance,
    /// Move one section up.
    Retreat,
    /// Jump to an absolute section index (Home/End keys).
    JumpTo(usize),
}

impl Intent {
    /// Resolve this intent against the current position.
    ///
    /// Returns the target section index, or `None` when the intent is a no-op:
    /// it would leave `[0, section_count)`, target the current section, or
    /// there are no sections at all.
    #[must_use]
    pub fn target(self, current: usize, section_count: usize) -> Option<usize> {
        if section_count == 0 {
            return None;
        }
        let target = match self {
            Intent::Advance => current.checked_add(1)?,
            Intent::Retreat => current.checked_sub(1)?,
            Intent::JumpTo(index) => index,
        };
        if target >= section_count || target == current {
            None
        } else {
            Some(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_down_one() {
        assert_eq!(Intent::Advance.target(0, 3), Some(1));
        assert_eq!(Intent::Advance.target(1, 3), Some(2));
    }

    #[test]
    fn advance_clamped_at_last_section() {
        assert_eq!(Intent::Advance.target(2, 3), None);
    }

    #[test]
    fn retreat_clamped_at_first_section() {
        assert_eq!(Intent::Retreat.target(0, 3), None);
        assert_eq!(Intent::Retreat.target(2, 3), Some(1));
    }

    #[test]
    fn jump_to_out_of_range_is_noop() {
        assert_eq!(Intent::JumpTo(5).target(0, 3), None);
        assert_eq!(Intent::JumpTo(2).target(0, 3), Some(2));
    }

    #[test]
    fn jump_to_current_is_noop() {
        assert_eq!(Intent::JumpTo(1).target(1, 3), None);
    }

    #[test]
    fn empty_registry_rejects_everything() {
        assert_eq!(Intent::Advance.target(0, 0), None);
        assert_eq!(Intent::JumpTo(0).target(0, 0), None);
    }
}
