//! Ritual configuration and node timing parameters.
//!
//! The live [`RitualConfig`] is replaced wholesale by an external
//! configurator (BLE provisioning on the device, the scenario host in
//! simulation) and read-only everywhere else.  [`ConfigCell`] holds it.

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::warn;
use serde::{Deserialize, Serialize};

// --- Timing ---

/// Minimum spacing between tag presence checks.
pub const TAG_POLL_INTERVAL_MS: u64 = 100;
/// Minimum spacing between processed touch-downs.
pub const TOUCH_DEBOUNCE_MS: u64 = 500;
/// Hold time after which a touch-down becomes a long-press.
pub const LONG_PRESS_MS: u64 = 1000;
/// Fixed per-cycle yield at the end of every acquisition step.
pub const CYCLE_YIELD_MS: u32 = 10;
/// Dwell after a ritual's completion message.
pub const RITUAL_DWELL_MS: u32 = 2000;
/// Dwell after light shows, unknown behaviors and menu messages.
pub const SHORT_DWELL_MS: u32 = 1000;
/// Dwell while the NFC self-test waits for a tag.
pub const NFC_TEST_DWELL_MS: u32 = 3000;

// --- Capacities (bytes, matching the device's fixed buffers) ---

pub const NODE_ID_CAP: usize = 32;
pub const LABEL_CAP: usize = 64;
pub const VOTE_OPTION_CAP: usize = 64;
pub const COUNTER_NAME_CAP: usize = 32;
pub const LIGHT_PATTERN_CAP: usize = 32;

/// Storage key holding the postcard-encoded live config.  Reserved: a
/// counter may not be named after it.
pub const CONFIG_STORAGE_KEY: &str = "ritual_cfg";
/// Counter used when none (or a reserved name) is configured.
pub const DEFAULT_COUNTER_NAME: &str = "default_counter";
/// Upper bound on the encoded config blob.
pub const CONFIG_BLOB_MAX: usize = 320;

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// The ritual a tag activation runs.
///
/// Serialised as the configurator's integer code.  Codes without a named
/// behavior (the device reserves 6 for sound playback and 8 for custom
/// scripts) decode to [`Behavior::Unrecognized`] and are shown as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Behavior {
    SaveMoment,
    SendTip,
    VoteA,
    VoteB,
    UnlockContent,
    TriggerLight,
    IncrementCounter,
    Unrecognized(i32),
}

impl Behavior {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::SaveMoment,
            1 => Self::SendTip,
            2 => Self::VoteA,
            3 => Self::VoteB,
            4 => Self::UnlockContent,
            5 => Self::TriggerLight,
            7 => Self::IncrementCounter,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::SaveMoment => 0,
            Self::SendTip => 1,
            Self::VoteA => 2,
            Self::VoteB => 3,
            Self::UnlockContent => 4,
            Self::TriggerLight => 5,
            Self::IncrementCounter => 7,
            Self::Unrecognized(code) => code,
        }
    }
}

impl From<i32> for Behavior {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<Behavior> for i32 {
    fn from(b: Behavior) -> Self {
        b.code()
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaveMoment => write!(f, "save-moment"),
            Self::SendTip => write!(f, "send-tip"),
            Self::VoteA => write!(f, "vote-a"),
            Self::VoteB => write!(f, "vote-b"),
            Self::UnlockContent => write!(f, "unlock-content"),
            Self::TriggerLight => write!(f, "trigger-light"),
            Self::IncrementCounter => write!(f, "increment-counter"),
            Self::Unrecognized(code) => write!(f, "unrecognized({code})"),
        }
    }
}

/// Light show selected by `light_pattern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightPattern {
    Rainbow,
    Pulse,
    /// Anything that is not a known pattern name.
    Strobe,
}

impl LightPattern {
    pub fn parse(name: &str) -> Self {
        match name {
            "rainbow" => Self::Rainbow,
            "pulse" => Self::Pulse,
            _ => Self::Strobe,
        }
    }
}

// ---------------------------------------------------------------------------
// RitualConfig
// ---------------------------------------------------------------------------

/// The active ritual and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualConfig {
    pub node_id: heapless::String<NODE_ID_CAP>,
    pub label: heapless::String<LABEL_CAP>,
    pub behavior: Behavior,
    /// Tip in currency units; recorded rounded to cents.
    pub tip_amount: f32,
    pub vote_option: heapless::String<VOTE_OPTION_CAP>,
    /// Also the storage key of the counter value; never
    /// [`CONFIG_STORAGE_KEY`].
    pub counter_name: heapless::String<COUNTER_NAME_CAP>,
    pub light_pattern: heapless::String<LIGHT_PATTERN_CAP>,
}

impl RitualConfig {
    /// Build a config from borrowed fields, truncating any field that
    /// exceeds its capacity.  A counter named after the config's own
    /// storage key falls back to [`DEFAULT_COUNTER_NAME`].
    pub fn new(
        node_id: &str,
        label: &str,
        behavior: Behavior,
        tip_amount: f32,
        vote_option: &str,
        counter_name: &str,
        light_pattern: &str,
    ) -> Self {
        Self {
            node_id: fit(node_id),
            label: fit(label),
            behavior,
            tip_amount,
            vote_option: fit(vote_option),
            counter_name: fit(counter_name),
            light_pattern: fit(light_pattern),
        }
        .with_free_counter()
    }

    /// Move the counter off the reserved config key.
    fn with_free_counter(mut self) -> Self {
        if self.counter_name.as_str() == CONFIG_STORAGE_KEY {
            warn!(
                "counter name {} is reserved; counting in {}",
                CONFIG_STORAGE_KEY, DEFAULT_COUNTER_NAME
            );
            self.counter_name = fit(DEFAULT_COUNTER_NAME);
        }
        self
    }

    pub fn light_pattern(&self) -> LightPattern {
        LightPattern::parse(&self.light_pattern)
    }

    /// Encode for the `ritual_cfg` storage key.
    pub fn to_blob(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_blob(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes).map(Self::with_free_counter)
    }
}

impl Default for RitualConfig {
    fn default() -> Self {
        Self::new(
            "default-node",
            "Default Ritual",
            Behavior::SaveMoment,
            5.0,
            "Option A",
            DEFAULT_COUNTER_NAME,
            "rainbow",
        )
    }
}

/// Copy as much of `s` as fits into `N` bytes without splitting a char.
pub fn fit<const N: usize>(s: &str) -> heapless::String<N> {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = heapless::String::new();
    // Cannot fail: `end <= N`.
    let _ = out.push_str(&s[..end]);
    out
}

// ---------------------------------------------------------------------------
// ConfigCell
// ---------------------------------------------------------------------------

/// Holder of the single live [`RitualConfig`].
///
/// Readers take an `Arc` snapshot and keep using it for the whole
/// operation; `replace` swaps the `Arc` under a critical section, so a
/// reader sees either the old or the new config, never a mix.
pub struct ConfigCell {
    live: Mutex<CriticalSectionRawMutex, RefCell<Arc<RitualConfig>>>,
    replaced: AtomicBool,
}

impl ConfigCell {
    pub fn new(initial: RitualConfig) -> Self {
        Self {
            live: Mutex::new(RefCell::new(Arc::new(initial))),
            replaced: AtomicBool::new(false),
        }
    }

    /// The config as of now.
    pub fn snapshot(&self) -> Arc<RitualConfig> {
        self.live.lock(|cell| Arc::clone(&cell.borrow()))
    }

    /// Atomically replace the live config and flag a ready-screen redraw.
    pub fn replace(&self, next: RitualConfig) {
        let previous = self.swap(next);
        self.replaced.store(true, Ordering::Release);
        drop(previous);
    }

    /// The configurator entry point: one call with every field.
    #[allow(clippy::too_many_arguments)]
    pub fn set_ritual_config(
        &self,
        node_id: &str,
        label: &str,
        behavior: i32,
        tip_amount: f32,
        vote_option: &str,
        counter_name: &str,
        light_pattern: &str,
    ) {
        self.replace(RitualConfig::new(
            node_id,
            label,
            Behavior::from_code(behavior),
            tip_amount,
            vote_option,
            counter_name,
            light_pattern,
        ));
    }

    /// Install a config restored from storage without flagging a redraw.
    pub fn restore(&self, cfg: RitualConfig) {
        drop(self.swap(cfg));
    }

    /// Returns `true` once per `replace` (or batch of replaces).
    pub fn take_replaced(&self) -> bool {
        self.replaced.swap(false, Ordering::AcqRel)
    }

    fn swap(&self, next: RitualConfig) -> Arc<RitualConfig> {
        let next = Arc::new(next);
        self.live.lock(|cell| cell.replace(next))
    }
}

impl Default for ConfigCell {
    fn default() -> Self {
        Self::new(RitualConfig::default())
    }
}
