//! Touch gesture recogniser: debounced short tap vs. long press.
//!
//! ## Timing
//!
//! | Gesture    | Condition                                          | Event       |
//! |-----------|----------------------------------------------------|-------------|
//! | Short tap | touch-up stamped < 1000 ms after the touch-down    | `ShortTap`  |
//! | Long press| no touch-up for >= 1000 ms after the touch-down    | `LongPress` |
//!
//! Touch-downs closer than 500 ms to the last processed one are dropped.
//!
//! The recogniser never waits.  The node loop calls [`TouchGesture::step`]
//! once per cycle with whatever sample the touch port returned, so a
//! cooperative backend keeps running its host loop while a press is held.

use crate::app::ports::{TouchKind, TouchSample};
use crate::config::{LONG_PRESS_MS, TOUCH_DEBOUNCE_MS};

/// Gestures emitted after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    ShortTap,
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    Held { since_ms: u64 },
}

#[derive(Debug)]
pub struct TouchGesture {
    state: GestureState,
    last_down_ms: Option<u64>,
}

impl Default for TouchGesture {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchGesture {
    pub fn new() -> Self {
        Self {
            state: GestureState::Idle,
            last_down_ms: None,
        }
    }

    /// `true` while no press is being timed.
    pub fn is_idle(&self) -> bool {
        self.state == GestureState::Idle
    }

    /// Advance the recogniser by one cycle.
    ///
    /// `now_ms` is the current monotonic time; `sample` is the touch port's
    /// result for this cycle, if any.  Returns a classified gesture once
    /// the press has been decided.
    pub fn step(&mut self, now_ms: u64, sample: Option<TouchSample>) -> Option<Gesture> {
        match self.state {
            GestureState::Idle => {
                let down = sample.filter(TouchSample::is_down)?;
                if let Some(last) = self.last_down_ms {
                    if now_ms.saturating_sub(last) <= TOUCH_DEBOUNCE_MS {
                        log::debug!("touch-down at ({}, {}) debounced", down.x, down.y);
                        return None;
                    }
                }
                self.last_down_ms = Some(now_ms);
                self.state = GestureState::Held { since_ms: now_ms };
                log::debug!("touch-down at ({}, {})", down.x, down.y);
                None
            }

            GestureState::Held { since_ms } => {
                let window = LONG_PRESS_MS;

                if let Some(up) = sample.filter(|s| s.kind == TouchKind::Up) {
                    self.state = GestureState::Idle;
                    return if up.timestamp.saturating_sub(since_ms) < window {
                        Some(Gesture::ShortTap)
                    } else {
                        Some(Gesture::LongPress)
                    };
                }

                if now_ms.saturating_sub(since_ms) >= window {
                    self.state = GestureState::Idle;
                    return Some(Gesture::LongPress);
                }

                None
            }
        }
    }
}
