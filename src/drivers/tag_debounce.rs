//! Presence debouncing for the tag reader.
//!
//! A tag triggers once per contiguous presence interval, identified by uid
//! rather than by time.  Losing presence clears the remembered uid so the
//! same tag retriggers when presented again.  The reader is polled at most
//! once per [`TAG_POLL_INTERVAL_MS`].

use crate::app::ports::Uid;
use crate::config::TAG_POLL_INTERVAL_MS;

/// Outcome of one reader observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPoll {
    /// Nothing changed.
    Quiet,
    /// A uid different from the remembered one is in the field.
    Activated(Uid),
    /// The remembered tag left the field.
    Removed,
}

#[derive(Debug, Default)]
pub struct TagDebounce {
    last_poll_ms: Option<u64>,
    last_seen: Option<Uid>,
}

impl TagDebounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the reader should be polled at `now_ms`.  Arms the next
    /// interval when it returns `true`.
    pub fn due(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_poll_ms {
            if now_ms.saturating_sub(last) < TAG_POLL_INTERVAL_MS {
                return false;
            }
        }
        self.last_poll_ms = Some(now_ms);
        true
    }

    /// Feed one reader observation.  `uid` is `None` when the reader
    /// reported presence but could not produce a uid this time; that leaves
    /// the debounce state untouched.
    pub fn observe(&mut self, present: bool, uid: Option<Uid>) -> TagPoll {
        if !present {
            return match self.last_seen.take() {
                Some(_) => TagPoll::Removed,
                None => TagPoll::Quiet,
            };
        }

        match uid {
            Some(uid) if self.last_seen.as_ref() != Some(&uid) => {
                self.last_seen = Some(uid.clone());
                TagPoll::Activated(uid)
            }
            _ => TagPoll::Quiet,
        }
    }

    pub fn last_seen(&self) -> Option<&Uid> {
        self.last_seen.as_ref()
    }
}
