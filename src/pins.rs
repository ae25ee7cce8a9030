//! GPIO / peripheral pin assignments for the MELD node board (ESP32-S3).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// E-paper panel (296×296, SPI2)
// ---------------------------------------------------------------------------

pub const EPD_SCK_GPIO: i32 = 12;
pub const EPD_MOSI_GPIO: i32 = 11;
pub const EPD_CS_GPIO: i32 = 10;
/// Data/command select.
pub const EPD_DC_GPIO: i32 = 9;
pub const EPD_RST_GPIO: i32 = 8;
/// HIGH while the panel is refreshing.
pub const EPD_BUSY_GPIO: i32 = 7;

// ---------------------------------------------------------------------------
// Tag reader front end (SPI3)
// ---------------------------------------------------------------------------

pub const NFC_SCK_GPIO: i32 = 36;
pub const NFC_MOSI_GPIO: i32 = 35;
pub const NFC_MISO_GPIO: i32 = 37;
pub const NFC_CS_GPIO: i32 = 38;
/// Reader IRQ, active low.
pub const NFC_IRQ_GPIO: i32 = 39;

// ---------------------------------------------------------------------------
// Capacitive touch controller (I²C0)
// ---------------------------------------------------------------------------

pub const TOUCH_SDA_GPIO: i32 = 14;
pub const TOUCH_SCL_GPIO: i32 = 15;
/// Touch interrupt, active low.
pub const TOUCH_INT_GPIO: i32 = 16;
pub const TOUCH_I2C_FREQ_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// Discrete status LED, active high.
pub const STATUS_LED_GPIO: i32 = 2;
/// Piezo buzzer, driven by an LEDC channel.
pub const BUZZER_GPIO: i32 = 4;
