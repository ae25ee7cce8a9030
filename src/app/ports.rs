//! Port traits: the hardware abstraction contract.
//!
//! ```text
//!   Backend (HardwareHal | SimHal) ──▶ Port traits ──▶ NodeService (domain)
//! ```
//!
//! Every backend implements the same operation set with the same
//! observable effect.  The business layer only ever sees `impl Hal`, so
//! the exact same ritual, acquisition and menu code runs on the device
//! and in the host simulation.
//!
//! ## Contract
//!
//! - Every call is synchronous: it returns once its effect is logically
//!   committed, even if the real effect is relayed to a host later.
//! - Polls (`tag_uid`, `touch_read`) never wait.  "Nothing there" is
//!   `Ok(None)`; `Err(HalError::NotInitialized)` means the subsystem was
//!   never initialised.
//! - Out-of-range input (uid > 7 bytes, NDEF > 512 bytes, pixels outside
//!   296×296, text size outside 1–4) is clamped or ignored here and never
//!   reaches the caller as an error.
//! - Storage is a flat ASCII-keyed namespace.  Loading an absent key
//!   yields `Ok(0)`.  A save followed by a load of the same key observes
//!   the saved bytes.
//! - `led_blink`, `buzzer_success` and `buzzer_error` are provided methods
//!   so both backends emit the identical on/off/tone/delay sequence.

use core::fmt;

use crate::error::{HalError, StorageError};

use super::events::NodeEvent;

// ───────────────────────────────────────────────────────────────
// Geometry and bounds
// ───────────────────────────────────────────────────────────────

pub const DISPLAY_WIDTH: u16 = 296;
pub const DISPLAY_HEIGHT: u16 = 296;
pub const MIN_TEXT_SIZE: u8 = 1;
pub const MAX_TEXT_SIZE: u8 = 4;
pub const MAX_UID_LEN: usize = 7;
pub const MAX_NDEF_LEN: usize = 512;

/// NDEF payload read from a tag.  Opaque bytes.
pub type NdefPayload = heapless::Vec<u8, MAX_NDEF_LEN>;

// ───────────────────────────────────────────────────────────────
// Tag identity
// ───────────────────────────────────────────────────────────────

/// A tag uid of 0–7 bytes.  Compared by value for presence debouncing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Uid(heapless::Vec<u8, MAX_UID_LEN>);

/// Uppercase hex rendering of a [`Uid`] ("AABB").
pub type UidHex = heapless::String<{ MAX_UID_LEN * 2 }>;

impl Uid {
    /// Build from raw reader bytes; anything past byte 7 is dropped.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let len = bytes.len().min(MAX_UID_LEN);
        let mut v = heapless::Vec::new();
        // Cannot fail: `len <= MAX_UID_LEN`.
        let _ = v.extend_from_slice(&bytes[..len]);
        Self(v)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> UidHex {
        use core::fmt::Write;
        let mut out = UidHex::new();
        for b in &self.0 {
            let _ = write!(out, "{:02X}", b);
        }
        out
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ───────────────────────────────────────────────────────────────
// Touch samples
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchKind {
    Down,
    Move,
    Up,
}

impl TouchKind {
    /// Wire code used by touch controllers and the simulation host.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Down),
            1 => Some(Self::Move),
            2 => Some(Self::Up),
            _ => None,
        }
    }
}

/// One touch controller report.  `x`/`y` are within the display extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    pub x: u16,
    pub y: u16,
    pub kind: TouchKind,
    pub timestamp: u64,
}

impl TouchSample {
    /// Clamp raw coordinates into the display extent.
    pub fn clamped(x: u16, y: u16, kind: TouchKind, timestamp: u64) -> Self {
        Self {
            x: x.min(DISPLAY_WIDTH - 1),
            y: y.min(DISPLAY_HEIGHT - 1),
            kind,
            timestamp,
        }
    }

    pub fn is_down(&self) -> bool {
        self.kind == TouchKind::Down
    }
}

// ───────────────────────────────────────────────────────────────
// HAL ports
// ───────────────────────────────────────────────────────────────

/// Bistable 296×296 monochrome display.
pub trait DisplayPort {
    fn display_init(&mut self);

    /// Clear the frame buffer to white.
    fn display_clear(&mut self);

    fn display_set_pixel(&mut self, x: u16, y: u16, black: bool);

    /// Draw `text` with its top-left corner at (`x`, `y`); `size` 1–4.
    fn display_draw_text(&mut self, x: u16, y: u16, text: &str, size: u8);

    /// Push the frame buffer to the panel.  `partial = true` is the fast
    /// status refresh; `false` is a full refresh for screens that stay up.
    fn display_update(&mut self, partial: bool);
}

/// Single proximity tag reader.
pub trait TagReaderPort {
    fn tag_init(&mut self);

    fn tag_present(&mut self) -> bool;

    /// Uid of the tag in the field, if any.
    fn tag_uid(&mut self) -> Result<Option<Uid>, HalError>;

    /// NDEF payload of the tag in the field, if any.
    fn tag_read_ndef(&mut self) -> Result<Option<NdefPayload>, HalError>;

    fn tag_write_ndef(&mut self, payload: &[u8]) -> Result<(), HalError>;
}

/// Touch controller, polled.
pub trait TouchPort {
    fn touch_init(&mut self);

    /// Next queued touch sample, if any.
    fn touch_read(&mut self) -> Result<Option<TouchSample>, HalError>;
}

/// Monotonic clock and delay.
///
/// The hardware backend's `delay` blocks the core; the simulation
/// backend's `delay` yields to the host loop until the time has passed.
pub trait ClockPort {
    /// Milliseconds since boot.
    fn millis(&self) -> u64;

    fn delay(&mut self, ms: u32);
}

pub trait DebugPort {
    fn debug_print(&mut self, message: &str);
}

pub trait LedPort: ClockPort {
    fn led_set(&mut self, on: bool);

    /// `times` × (on, `delay_ms`, off, `delay_ms`).
    fn led_blink(&mut self, times: u32, delay_ms: u32) {
        for _ in 0..times {
            self.led_set(true);
            self.delay(delay_ms);
            self.led_set(false);
            self.delay(delay_ms);
        }
    }
}

pub trait BuzzerPort: ClockPort {
    /// Start a tone.  Returns once the tone is committed, not when it ends.
    fn buzzer_tone(&mut self, frequency_hz: u16, duration_ms: u16);

    /// Three rising chirps.
    fn buzzer_success(&mut self) {
        self.buzzer_tone(1000, 100);
        self.delay(120);
        self.buzzer_tone(1200, 100);
        self.delay(120);
        self.buzzer_tone(1400, 150);
    }

    /// Two falling buzzes.
    fn buzzer_error(&mut self) {
        self.buzzer_tone(400, 300);
        self.delay(350);
        self.buzzer_tone(300, 300);
    }
}

/// Persistent flat key-value storage as seen by the business layer.
pub trait StoragePort {
    fn storage_save(&mut self, key: &str, data: &[u8]) -> Result<(), HalError>;

    /// Copy the value of `key` into `buf`; `Ok(0)` if the key is absent.
    fn storage_load(&mut self, key: &str, buf: &mut [u8]) -> Result<usize, HalError>;

    fn storage_delete(&mut self, key: &str) -> Result<(), HalError>;
}

/// The full capability set the business layer depends on.
pub trait Hal:
    DisplayPort + TagReaderPort + TouchPort + ClockPort + DebugPort + LedPort + BuzzerPort + StoragePort
{
}

impl<T> Hal for T where
    T: DisplayPort
        + TagReaderPort
        + TouchPort
        + ClockPort
        + DebugPort
        + LedPort
        + BuzzerPort
        + StoragePort
{
}

// ───────────────────────────────────────────────────────────────
// Key-value engine (driven adapter behind the storage port)
// ───────────────────────────────────────────────────────────────

/// The persistence engine a backend stores into (NVS on the device).
///
/// Only save/load/delete semantics are consumed; the on-flash format is
/// the engine's business.  Writes are atomic per key.
pub trait KvStore {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, key: &str) -> Result<(), StorageError>;

    fn exists(&self, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink
// ───────────────────────────────────────────────────────────────

/// The node emits structured [`NodeEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &NodeEvent);
}
