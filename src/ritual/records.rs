//! Persisted ritual records.
//!
//! Each record is a flat JSON object stored under `<kind>_<timestamp>`.
//! Field names are what external readers of the store expect:
//!
//! | Kind     | Fields                                          |
//! |----------|-------------------------------------------------|
//! | `moment` | uid, node, timestamp, verified                  |
//! | `tip`    | uid, amount, node, timestamp                    |
//! | `vote`   | uid, option, vote_option, node, timestamp       |
//! | `unlock` | uid, content_id, node, timestamp                |

use core::fmt::Write;

use serde::Serialize;

/// Storage key of a record ("moment_1234").  Fits the longest prefix plus
/// a full `u64`.
pub type RecordKey = heapless::String<32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Moment,
    Tip,
    Vote,
    Unlock,
}

impl RecordKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Moment => "moment",
            Self::Tip => "tip",
            Self::Vote => "vote",
            Self::Unlock => "unlock",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MomentRecord<'a> {
    pub uid: &'a str,
    pub node: &'a str,
    pub timestamp: u64,
    pub verified: bool,
}

#[derive(Debug, Serialize)]
pub struct TipRecord<'a> {
    pub uid: &'a str,
    pub amount: f64,
    pub node: &'a str,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct VoteRecord<'a> {
    pub uid: &'a str,
    pub option: &'a str,
    pub vote_option: &'a str,
    pub node: &'a str,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct UnlockRecord<'a> {
    pub uid: &'a str,
    pub content_id: &'a str,
    pub node: &'a str,
    pub timestamp: u64,
}

/// Tip amounts are stored to the cent.
pub fn round_cents(amount: f32) -> f64 {
    (f64::from(amount) * 100.0).round() / 100.0
}

/// Hands out record timestamps that never repeat, so keys are never
/// reused even when two records land in the same millisecond.
#[derive(Debug, Default)]
pub struct RecordKeyer {
    last_ms: Option<u64>,
}

impl RecordKeyer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp for a record created at `now_ms`.
    pub fn stamp(&mut self, now_ms: u64) -> u64 {
        let ts = match self.last_ms {
            Some(last) if now_ms <= last => last + 1,
            _ => now_ms,
        };
        self.last_ms = Some(ts);
        ts
    }
}

pub fn record_key(kind: RecordKind, timestamp: u64) -> RecordKey {
    let mut key = RecordKey::new();
    // "unlock_" + 20 digits fits in 32 bytes.
    let _ = write!(key, "{}_{}", kind.prefix(), timestamp);
    key
}
