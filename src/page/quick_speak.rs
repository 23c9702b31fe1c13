//! Floating "speak selection" affordance.
//!
//! Time is passed in explicitly; the page adapter feeds its monotonic clock
//! through `tick` so dismissal deadlines stay testable.

use std::time::Duration;

/// Vertical gap between the selection and the bubble, in CSS pixels.
const BUBBLE_OFFSET_PX: f64 = 50.0;

/// Selection bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubblePosition {
    pub x: f64,
    pub y: f64,
}

impl BubblePosition {
    /// Centered above the selection.
    pub fn above(rect: Rect, scroll_y: f64) -> Self {
        Self {
            x: rect.left + rect.width / 2.0,
            y: rect.top + scroll_y - BUBBLE_OFFSET_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Shown {
    text: String,
    position: BubblePosition,
    /// `None` while the pointer hovers the bubble.
    hide_at: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuickSpeakBubble {
    idle: Duration,
    leave: Duration,
    shown: Option<Shown>,
}

impl QuickSpeakBubble {
    pub fn new(idle: Duration, leave: Duration) -> Self {
        Self {
            idle,
            leave,
            shown: None,
        }
    }

    /// Show the bubble for `text`, replacing any bubble already visible.
    pub fn show(
        &mut self,
        text: String,
        rect: Rect,
        scroll_y: f64,
        now: Duration,
    ) -> BubblePosition {
        let position = BubblePosition::above(rect, scroll_y);
        self.shown = Some(Shown {
            text,
            position,
            hide_at: Some(now + self.idle),
        });
        position
    }

    pub fn is_visible(&self) -> bool {
        self.shown.is_some()
    }

    pub fn text(&self) -> Option<&str> {
        self.shown.as_ref().map(|shown| shown.text.as_str())
    }

    pub fn position(&self) -> Option<BubblePosition> {
        self.shown.as_ref().map(|shown| shown.position)
    }

    pub fn hover_enter(&mut self) {
        if let Some(shown) = self.shown.as_mut() {
            shown.hide_at = None;
        }
    }

    pub fn hover_leave(&mut self, now: Duration) {
        if let Some(shown) = self.shown.as_mut() {
            shown.hide_at = Some(now + self.leave);
        }
    }

    /// Click on the bubble: hides it and hands back the text to speak.
    pub fn activate(&mut self) -> Option<String> {
        self.shown.take().map(|shown| shown.text)
    }

    /// Returns whether a bubble was visible.
    pub fn dismiss(&mut self) -> bool {
        self.shown.take().is_some()
    }

    /// Returns `true` when this tick hid the bubble.
    pub fn tick(&mut self, now: Duration) -> bool {
        let due = self
            .shown
            .as_ref()
            .and_then(|shown| shown.hide_at)
            .is_some_and(|deadline| now >= deadline);
        if due {
            self.shown = None;
        }
        due
    }
}
