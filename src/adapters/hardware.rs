//! Hardware adapter: bridges the board's peripherals to the HAL ports.
//!
//! Owns the panel, tag reader, touch controller, buzzer, status LED,
//! delay provider, clock and storage engine, exposing them through the
//! [`Hal`](crate::app::ports::Hal) capability set.  This is the only
//! module that touches board drivers; the concrete driver types are
//! picked by the [`Board`] implementation, so host tests can run the same
//! adapter over fakes.
//!
//! Contract bounds are enforced here: uid clamped to 7 bytes, NDEF to 512,
//! pixels outside the panel and draws before `display_init` are dropped,
//! text size is clamped to 1–4.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

use crate::app::ports::{
    BuzzerPort, ClockPort, DISPLAY_HEIGHT, DISPLAY_WIDTH, DebugPort, DisplayPort, KvStore,
    LedPort, MAX_NDEF_LEN, MAX_TEXT_SIZE, MIN_TEXT_SIZE, NdefPayload, StoragePort, TagReaderPort,
    TouchKind, TouchPort, TouchSample, Uid,
};
use crate::drivers::status_led::StatusLed;
use crate::error::{HalError, StorageError};

use super::peripherals::{
    Monotonic, PanelDriver, RAW_UID_MAX, TagFrontend, ToneOutput, TouchController,
};

/// The driver set of one board.
pub trait Board {
    type Panel: PanelDriver;
    type Tags: TagFrontend;
    type Touch: TouchController;
    type Buzzer: ToneOutput;
    type Led: OutputPin;
    type Delay: DelayNs;
    type Clock: Monotonic;
    type Store: KvStore;
}

/// Constructor bundle for [`HardwareHal::new`].
pub struct BoardParts<B: Board> {
    pub panel: B::Panel,
    pub tags: B::Tags,
    pub touch: B::Touch,
    pub buzzer: B::Buzzer,
    pub led: B::Led,
    pub delay: B::Delay,
    pub clock: B::Clock,
    pub store: B::Store,
}

/// Concrete adapter that combines all board drivers behind the ports.
pub struct HardwareHal<B: Board> {
    panel: B::Panel,
    tags: B::Tags,
    touch: B::Touch,
    buzzer: B::Buzzer,
    led: StatusLed<B::Led>,
    delay: B::Delay,
    clock: B::Clock,
    store: B::Store,
    display_ready: bool,
    tag_ready: bool,
    touch_ready: bool,
}

impl<B: Board> HardwareHal<B> {
    pub fn new(parts: BoardParts<B>) -> Self {
        Self {
            panel: parts.panel,
            tags: parts.tags,
            touch: parts.touch,
            buzzer: parts.buzzer,
            led: StatusLed::new(parts.led),
            delay: parts.delay,
            clock: parts.clock,
            store: parts.store,
            display_ready: false,
            tag_ready: false,
            touch_ready: false,
        }
    }

    pub fn led_is_on(&self) -> bool {
        self.led.is_on()
    }

    pub fn store(&self) -> &B::Store {
        &self.store
    }
}

// ── DisplayPort ───────────────────────────────────────────────

impl<B: Board> DisplayPort for HardwareHal<B> {
    fn display_init(&mut self) {
        self.panel.init();
        self.panel.clear();
        self.display_ready = true;
        info!("display initialised ({}x{})", DISPLAY_WIDTH, DISPLAY_HEIGHT);
    }

    fn display_clear(&mut self) {
        if self.display_ready {
            self.panel.clear();
        }
    }

    fn display_set_pixel(&mut self, x: u16, y: u16, black: bool) {
        if !self.display_ready || x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return;
        }
        self.panel.set_pixel(x, y, black);
    }

    fn display_draw_text(&mut self, x: u16, y: u16, text: &str, size: u8) {
        if !self.display_ready || x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return;
        }
        let size = size.clamp(MIN_TEXT_SIZE, MAX_TEXT_SIZE);
        self.panel.draw_text(x, y, text, size);
    }

    fn display_update(&mut self, partial: bool) {
        if self.display_ready {
            self.panel.refresh(partial);
        }
    }
}

// ── TagReaderPort ─────────────────────────────────────────────

impl<B: Board> TagReaderPort for HardwareHal<B> {
    fn tag_init(&mut self) {
        if self.tags.init() {
            info!("tag reader initialised");
        } else {
            warn!("tag reader did not answer; tags will never be seen");
        }
        // Polls stay well defined either way: a dead reader is an empty field.
        self.tag_ready = true;
    }

    fn tag_present(&mut self) -> bool {
        self.tag_ready && self.tags.present()
    }

    fn tag_uid(&mut self) -> Result<Option<Uid>, HalError> {
        if !self.tag_ready {
            return Err(HalError::NotInitialized);
        }
        let mut raw = [0u8; RAW_UID_MAX];
        Ok(self
            .tags
            .read_uid(&mut raw)
            .map(|n| Uid::from_slice(&raw[..n.min(RAW_UID_MAX)])))
    }

    fn tag_read_ndef(&mut self) -> Result<Option<NdefPayload>, HalError> {
        if !self.tag_ready {
            return Err(HalError::NotInitialized);
        }
        let mut raw = [0u8; MAX_NDEF_LEN];
        let Some(full_len) = self.tags.read_ndef(&mut raw) else {
            return Ok(None);
        };
        if full_len > MAX_NDEF_LEN {
            debug!("NDEF message of {} B truncated", full_len);
        }
        let mut payload = NdefPayload::new();
        // Cannot fail: at most MAX_NDEF_LEN bytes.
        let _ = payload.extend_from_slice(&raw[..full_len.min(MAX_NDEF_LEN)]);
        Ok(Some(payload))
    }

    fn tag_write_ndef(&mut self, payload: &[u8]) -> Result<(), HalError> {
        if !self.tag_ready {
            return Err(HalError::NotInitialized);
        }
        if payload.is_empty() {
            return Ok(());
        }
        let len = payload.len().min(MAX_NDEF_LEN);
        if self.tags.write_ndef(&payload[..len]) {
            Ok(())
        } else {
            Err(HalError::Io)
        }
    }
}

// ── TouchPort ─────────────────────────────────────────────────

impl<B: Board> TouchPort for HardwareHal<B> {
    fn touch_init(&mut self) {
        if self.touch.init() {
            info!("touch controller initialised");
        } else {
            warn!("touch controller did not answer");
        }
        self.touch_ready = true;
    }

    fn touch_read(&mut self) -> Result<Option<TouchSample>, HalError> {
        if !self.touch_ready {
            return Err(HalError::NotInitialized);
        }
        let now = self.clock.now_ms();
        // Unknown kind codes are controller noise; skip them.
        while let Some(raw) = self.touch.read() {
            match TouchKind::from_code(raw.code) {
                Some(kind) => return Ok(Some(TouchSample::clamped(raw.x, raw.y, kind, now))),
                None => debug!("touch report with unknown kind {} dropped", raw.code),
            }
        }
        Ok(None)
    }
}

// ── Clock, debug, LED, buzzer ─────────────────────────────────

impl<B: Board> ClockPort for HardwareHal<B> {
    fn millis(&self) -> u64 {
        self.clock.now_ms()
    }

    fn delay(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

impl<B: Board> DebugPort for HardwareHal<B> {
    fn debug_print(&mut self, message: &str) {
        info!("{}", message);
    }
}

impl<B: Board> LedPort for HardwareHal<B> {
    fn led_set(&mut self, on: bool) {
        self.led.set(on);
    }
}

impl<B: Board> BuzzerPort for HardwareHal<B> {
    fn buzzer_tone(&mut self, frequency_hz: u16, duration_ms: u16) {
        self.buzzer.tone(frequency_hz, duration_ms);
    }
}

// ── StoragePort ───────────────────────────────────────────────

impl<B: Board> StoragePort for HardwareHal<B> {
    fn storage_save(&mut self, key: &str, data: &[u8]) -> Result<(), HalError> {
        self.store.write(key, data).map_err(HalError::from)
    }

    fn storage_load(&mut self, key: &str, buf: &mut [u8]) -> Result<usize, HalError> {
        match self.store.read(key, buf) {
            Ok(n) => Ok(n),
            Err(StorageError::NotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn storage_delete(&mut self, key: &str) -> Result<(), HalError> {
        self.store.delete(key).map_err(HalError::from)
    }
}
