//! Single status LED on a GPIO.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: wraps an `esp_idf_hal` `PinDriver` through the
//! `embedded_hal::digital::OutputPin` trait.
//! On host/test: any `OutputPin` fake works; the driver also tracks the
//! commanded state in-memory.

use embedded_hal::digital::OutputPin;
use log::warn;

pub struct StatusLed<P: OutputPin> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> StatusLed<P> {
    /// Take the pin and drive it low.
    pub fn new(pin: P) -> Self {
        let mut led = Self { pin, on: true };
        led.set(false);
        led
    }

    /// Drive the LED.  A GPIO failure is logged and otherwise ignored so
    /// feedback sequences keep their timing.
    pub fn set(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.on = on,
            Err(e) => warn!("status LED write failed: {:?}", e),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
