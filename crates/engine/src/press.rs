//! Transient press and swipe tracking for an in-progress gesture.
//!
//! Clearing this state is the sole cancellation/cleanup mechanism for a
//! gesture: it runs on action completion and, mandatorily, before a
//! dispatch error propagates.

use time::OffsetDateTime;

/// Press-start/end timestamps and swipe tracking for one element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PressState {
    pub press_start: Option<OffsetDateTime>,
    pub press_end: Option<OffsetDateTime>,
    pub swiping: bool,
    pub initial_x: Option<f64>,
    pub initial_y: Option<f64>,
}

impl PressState {
    pub fn start(&mut self, now: OffsetDateTime) {
        self.press_start = Some(now);
        self.press_end = None;
    }

    pub fn finish(&mut self, now: OffsetDateTime) {
        self.press_end = Some(now);
    }

    pub fn begin_swipe(&mut self, x: f64, y: f64) {
        self.swiping = true;
        self.initial_x = Some(x);
        self.initial_y = Some(y);
    }

    /// Elapsed press duration in seconds; 0 when no completed press is in
    /// flight.
    pub fn hold_secs(&self) -> f64 {
        match (self.press_start, self.press_end) {
            (Some(start), Some(end)) => (end - start).as_seconds_f64().max(0.0),
            _ => 0.0,
        }
    }

    pub fn clear(&mut self) {
        *self = PressState::default();
    }

    pub fn is_clear(&self) -> bool {
        *self == PressState::default()
    }
}
