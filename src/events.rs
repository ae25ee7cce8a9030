//! Inbound event inbox for the simulation backend.
//!
//! The host loop keeps running while the node is inside a `delay`, so
//! touches and tag changes arrive at any time.  They are parked here until
//! the node polls for them.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────────┐     ┌──────────────┐
//! │ Host loop   │────▶│ touch FIFO (cap 10)  │────▶│ touch_read   │
//! │ (yield)     │────▶│ tag slot (single)    │────▶│ tag_present  │
//! └─────────────┘     └──────────────────────┘     └──────────────┘
//! ```
//!
//! - Touch FIFO: bounded, the oldest sample is dropped on overflow.
//! - Tag slot: at most one tag; a new tag replaces the queued one and a
//!   removal clears it.
//! - Nothing is accepted until the node has initialised the matching
//!   subsystem.

use heapless::Deque;
use log::debug;

use crate::app::ports::{NdefPayload, TouchSample, Uid};

/// Capacity of the touch FIFO.
pub const TOUCH_QUEUE_CAP: usize = 10;

/// The tag currently in the field as seen by the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimTag {
    pub uid: Uid,
    pub ndef: NdefPayload,
}

#[derive(Debug, Default)]
pub struct Inbox {
    touches: Deque<TouchSample, TOUCH_QUEUE_CAP>,
    tag: Option<SimTag>,
    touch_open: bool,
    tag_open: bool,
    dropped_touches: u32,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting touch samples (called by `touch_init`).
    pub fn open_touch(&mut self) {
        self.touch_open = true;
    }

    /// Start accepting tag changes (called by `tag_init`).
    pub fn open_tags(&mut self) {
        self.tag_open = true;
    }

    // ── Touch ─────────────────────────────────────────────────

    /// Queue a touch sample.  Returns `false` if it was rejected because
    /// touch is not initialised yet.
    pub fn push_touch(&mut self, sample: TouchSample) -> bool {
        if !self.touch_open {
            return false;
        }
        if self.touches.is_full() {
            self.touches.pop_front();
            self.dropped_touches = self.dropped_touches.saturating_add(1);
            debug!("touch FIFO full, dropped oldest sample");
        }
        // Cannot fail: one slot was just freed if needed.
        let _ = self.touches.push_back(sample);
        true
    }

    pub fn pop_touch(&mut self) -> Option<TouchSample> {
        self.touches.pop_front()
    }

    pub fn pending_touches(&self) -> usize {
        self.touches.len()
    }

    /// Samples lost to FIFO overflow since boot.
    pub fn dropped_touches(&self) -> u32 {
        self.dropped_touches
    }

    // ── Tag ───────────────────────────────────────────────────

    /// Put a tag in the field, replacing any tag already there.
    pub fn present_tag(&mut self, tag: SimTag) -> bool {
        if !self.tag_open {
            return false;
        }
        self.tag = Some(tag);
        true
    }

    pub fn remove_tag(&mut self) {
        self.tag = None;
    }

    pub fn tag(&self) -> Option<&SimTag> {
        self.tag.as_ref()
    }
}
