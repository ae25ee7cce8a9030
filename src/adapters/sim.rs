//! Simulation backend: the HAL over a host bridge.
//!
//! Every effect (display, LED, buzzer, storage, debug line) is relayed to
//! the host as it happens.  Inbound touches and tags are parked in an
//! [`Inbox`] that the host fills while the node is waiting in `delay`.
//!
//! ```text
//!  NodeService ──▶ SimHal ──▶ HostBridge (render, store, log)
//!                    ▲             │
//!                    └── Inbox ◀───┘  yield_to_host, one 10 ms quantum at a time
//! ```
//!
//! `delay` never blocks the host: it hands control back in quanta of
//! [`YIELD_QUANTUM_MS`] until the host clock has advanced by the full
//! amount.

use log::{debug, warn};

use crate::app::ports::{
    BuzzerPort, ClockPort, DISPLAY_HEIGHT, DISPLAY_WIDTH, DebugPort, DisplayPort, LedPort,
    MAX_NDEF_LEN, MAX_TEXT_SIZE, MIN_TEXT_SIZE, NdefPayload, StoragePort, TagReaderPort,
    TouchPort, TouchSample, Uid,
};
use crate::error::HalError;
use crate::events::Inbox;

/// Longest slice of a `delay` before control goes back to the host.
pub const YIELD_QUANTUM_MS: u32 = 10;

/// The host side of the simulation.
///
/// Relays mirror the device's peripherals; the host decides how to render
/// or persist them.  Storage relays report success as `bool` and loads
/// return the number of bytes copied (0 if the key is absent).
pub trait HostBridge {
    fn display_clear(&mut self);
    fn display_set_pixel(&mut self, x: u16, y: u16, black: bool);
    fn display_draw_text(&mut self, x: u16, y: u16, text: &str, size: u8);
    fn display_update(&mut self, partial: bool);

    fn led_set(&mut self, on: bool);
    fn buzzer_tone(&mut self, frequency_hz: u16, duration_ms: u16);

    fn tag_write(&mut self, payload: &[u8]) -> bool;

    fn storage_save(&mut self, key: &str, data: &[u8]) -> bool;
    fn storage_load(&mut self, key: &str, buf: &mut [u8]) -> usize;
    fn storage_delete(&mut self, key: &str) -> bool;

    fn debug_print(&mut self, message: &str);

    /// Host clock in milliseconds.
    fn millis(&self) -> u64;

    /// Let the host run for up to `budget_ms`.  The host advances its
    /// clock and may deliver touches and tags into `inbox`.
    fn yield_to_host(&mut self, inbox: &mut Inbox, budget_ms: u32);
}

pub struct SimHal<B: HostBridge> {
    bridge: B,
    inbox: Inbox,
    display_ready: bool,
    tag_ready: bool,
    touch_ready: bool,
}

impl<B: HostBridge> SimHal<B> {
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            inbox: Inbox::new(),
            display_ready: false,
            tag_ready: false,
            touch_ready: false,
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn into_bridge(self) -> B {
        self.bridge
    }
}

// ── DisplayPort ───────────────────────────────────────────────

impl<B: HostBridge> DisplayPort for SimHal<B> {
    fn display_init(&mut self) {
        self.display_ready = true;
        self.bridge.display_clear();
        self.bridge.debug_print("Display initialized (simulation)");
    }

    fn display_clear(&mut self) {
        if self.display_ready {
            self.bridge.display_clear();
        }
    }

    fn display_set_pixel(&mut self, x: u16, y: u16, black: bool) {
        if !self.display_ready || x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return;
        }
        self.bridge.display_set_pixel(x, y, black);
    }

    fn display_draw_text(&mut self, x: u16, y: u16, text: &str, size: u8) {
        if !self.display_ready || x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return;
        }
        self.bridge
            .display_draw_text(x, y, text, size.clamp(MIN_TEXT_SIZE, MAX_TEXT_SIZE));
    }

    fn display_update(&mut self, partial: bool) {
        if self.display_ready {
            self.bridge.display_update(partial);
        }
    }
}

// ── TagReaderPort ─────────────────────────────────────────────

impl<B: HostBridge> TagReaderPort for SimHal<B> {
    fn tag_init(&mut self) {
        self.tag_ready = true;
        self.inbox.open_tags();
        self.bridge.debug_print("NFC initialized (simulation)");
    }

    fn tag_present(&mut self) -> bool {
        self.tag_ready && self.inbox.tag().is_some()
    }

    fn tag_uid(&mut self) -> Result<Option<Uid>, HalError> {
        if !self.tag_ready {
            return Err(HalError::NotInitialized);
        }
        Ok(self.inbox.tag().map(|t| t.uid.clone()))
    }

    fn tag_read_ndef(&mut self) -> Result<Option<NdefPayload>, HalError> {
        if !self.tag_ready {
            return Err(HalError::NotInitialized);
        }
        Ok(self.inbox.tag().map(|t| t.ndef.clone()))
    }

    fn tag_write_ndef(&mut self, payload: &[u8]) -> Result<(), HalError> {
        if !self.tag_ready {
            return Err(HalError::NotInitialized);
        }
        if payload.is_empty() {
            return Ok(());
        }
        let len = payload.len().min(MAX_NDEF_LEN);
        if self.bridge.tag_write(&payload[..len]) {
            Ok(())
        } else {
            Err(HalError::Io)
        }
    }
}

// ── TouchPort ─────────────────────────────────────────────────

impl<B: HostBridge> TouchPort for SimHal<B> {
    fn touch_init(&mut self) {
        self.touch_ready = true;
        self.inbox.open_touch();
        self.bridge.debug_print("Touch initialized (simulation)");
    }

    fn touch_read(&mut self) -> Result<Option<TouchSample>, HalError> {
        if !self.touch_ready {
            return Err(HalError::NotInitialized);
        }
        Ok(self.inbox.pop_touch())
    }
}

// ── Clock ─────────────────────────────────────────────────────

impl<B: HostBridge> ClockPort for SimHal<B> {
    fn millis(&self) -> u64 {
        self.bridge.millis()
    }

    fn delay(&mut self, ms: u32) {
        let deadline = self.bridge.millis() + u64::from(ms);
        loop {
            let now = self.bridge.millis();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(u64::from(YIELD_QUANTUM_MS)) as u32;
            self.bridge.yield_to_host(&mut self.inbox, slice);
            if self.bridge.millis() == now {
                warn!("host clock did not advance during delay; giving up wait");
                break;
            }
        }
    }
}

// ── Debug, LED, buzzer ────────────────────────────────────────

impl<B: HostBridge> DebugPort for SimHal<B> {
    fn debug_print(&mut self, message: &str) {
        self.bridge.debug_print(message);
    }
}

impl<B: HostBridge> LedPort for SimHal<B> {
    fn led_set(&mut self, on: bool) {
        self.bridge.led_set(on);
    }
}

impl<B: HostBridge> BuzzerPort for SimHal<B> {
    fn buzzer_tone(&mut self, frequency_hz: u16, duration_ms: u16) {
        self.bridge.buzzer_tone(frequency_hz, duration_ms);
    }
}

// ── StoragePort ───────────────────────────────────────────────

impl<B: HostBridge> StoragePort for SimHal<B> {
    fn storage_save(&mut self, key: &str, data: &[u8]) -> Result<(), HalError> {
        if key.is_empty() {
            return Err(HalError::Unsupported);
        }
        if self.bridge.storage_save(key, data) {
            Ok(())
        } else {
            debug!("host refused save of {}", key);
            Err(HalError::Io)
        }
    }

    fn storage_load(&mut self, key: &str, buf: &mut [u8]) -> Result<usize, HalError> {
        if key.is_empty() {
            return Err(HalError::Unsupported);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        Ok(self.bridge.storage_load(key, buf).min(buf.len()))
    }

    fn storage_delete(&mut self, key: &str) -> Result<(), HalError> {
        if key.is_empty() {
            return Err(HalError::Unsupported);
        }
        if self.bridge.storage_delete(key) {
            Ok(())
        } else {
            Err(HalError::Io)
        }
    }
}
