//! Driver seams for the hardware backend's external collaborators.
//!
//! Font rasterisation, the tag RF protocol, the touch controller's bus
//! protocol and the buzzer's electrical drive all live in board-support
//! drivers outside this crate.  [`HardwareHal`](super::hardware::HardwareHal)
//! is generic over these traits, so a board bring-up only has to supply
//! implementations.
//!
//! Each trait reports raw, unchecked data; contract bounds (uid length,
//! NDEF size, coordinates) are enforced by the HAL, not here.

/// E-paper panel with an internal frame buffer and glyph rasteriser.
pub trait PanelDriver {
    fn init(&mut self);
    fn clear(&mut self);
    fn set_pixel(&mut self, x: u16, y: u16, black: bool);
    fn draw_text(&mut self, x: u16, y: u16, text: &str, size: u8);
    /// Push the frame buffer; `partial` selects the fast refresh waveform.
    fn refresh(&mut self, partial: bool);
}

/// Raw uid buffer size; real readers report at most 10 bytes.
pub const RAW_UID_MAX: usize = 10;

/// Proximity tag reader front end.
pub trait TagFrontend {
    /// Bring the reader up.  `false` if the chip did not answer.
    fn init(&mut self) -> bool;
    fn present(&mut self) -> bool;
    /// Read the uid into `buf`; `None` if no tag answered.
    fn read_uid(&mut self, buf: &mut [u8; RAW_UID_MAX]) -> Option<usize>;
    /// Read the NDEF message into `buf`; returns the full message length,
    /// which may exceed `buf.len()`.
    fn read_ndef(&mut self, buf: &mut [u8]) -> Option<usize>;
    fn write_ndef(&mut self, data: &[u8]) -> bool;
}

/// Raw touch report: coordinates in panel space and a kind code
/// (0 down, 1 move, 2 up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTouch {
    pub x: u16,
    pub y: u16,
    pub code: u8,
}

pub trait TouchController {
    fn init(&mut self) -> bool;
    /// Next report from the controller FIFO, if any.  Never waits.
    fn read(&mut self) -> Option<RawTouch>;
}

/// Buzzer electrical driver.  Starts a tone and returns immediately.
pub trait ToneOutput {
    fn tone(&mut self, frequency_hz: u16, duration_ms: u16);
}

/// Monotonic millisecond clock.
pub trait Monotonic {
    fn now_ms(&self) -> u64;
}

// ── Placeholders ──────────────────────────────────────────────
//
// Used when a peripheral is not populated on the board.  They behave as
// an empty field / silent buzzer / blank panel.

/// Panel that accepts and discards every operation.
#[derive(Debug, Default)]
pub struct UnwiredPanel;

impl PanelDriver for UnwiredPanel {
    fn init(&mut self) {
        log::warn!("display: no panel driver wired, output discarded");
    }
    fn clear(&mut self) {}
    fn set_pixel(&mut self, _x: u16, _y: u16, _black: bool) {}
    fn draw_text(&mut self, _x: u16, _y: u16, _text: &str, _size: u8) {}
    fn refresh(&mut self, _partial: bool) {}
}

/// Reader that never sees a tag.
#[derive(Debug, Default)]
pub struct UnwiredTagFrontend;

impl TagFrontend for UnwiredTagFrontend {
    fn init(&mut self) -> bool {
        log::warn!("tag reader: no front end wired");
        true
    }
    fn present(&mut self) -> bool {
        false
    }
    fn read_uid(&mut self, _buf: &mut [u8; RAW_UID_MAX]) -> Option<usize> {
        None
    }
    fn read_ndef(&mut self, _buf: &mut [u8]) -> Option<usize> {
        None
    }
    fn write_ndef(&mut self, _data: &[u8]) -> bool {
        false
    }
}

/// Touch controller that never reports.
#[derive(Debug, Default)]
pub struct UnwiredTouch;

impl TouchController for UnwiredTouch {
    fn init(&mut self) -> bool {
        log::warn!("touch: no controller wired");
        true
    }
    fn read(&mut self) -> Option<RawTouch> {
        None
    }
}

/// Silent buzzer.
#[derive(Debug, Default)]
pub struct UnwiredTone;

impl ToneOutput for UnwiredTone {
    fn tone(&mut self, _frequency_hz: u16, _duration_ms: u16) {}
}
