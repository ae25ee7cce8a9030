//! MELD Node firmware: main entry point.
//!
//! Hexagonal architecture with a single cooperative acquisition loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareHal       LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Hal ports)       (EventSink)    (KvStore)    (Monotonic)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  tag debounce · gestures · menu FSM · rituals          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use log::info;

use meldnode::adapters::hardware::{Board, BoardParts, HardwareHal};
use meldnode::adapters::log_sink::LogEventSink;
use meldnode::adapters::nvs::NvsAdapter;
use meldnode::adapters::peripherals::{
    UnwiredPanel, UnwiredTagFrontend, UnwiredTone, UnwiredTouch,
};
use meldnode::adapters::time::Esp32TimeAdapter;
use meldnode::app::service::NodeService;
use meldnode::config::ConfigCell;
use meldnode::pins;

/// Driver set of the node board.  The panel, reader, touch and buzzer
/// drivers are supplied by the board-support package; until one is
/// linked the placeholders keep the node running on LED feedback alone.
struct NodeBoard;

impl Board for NodeBoard {
    type Panel = UnwiredPanel;
    type Tags = UnwiredTagFrontend;
    type Touch = UnwiredTouch;
    type Buzzer = UnwiredTone;
    type Led = PinDriver<'static, AnyOutputPin, Output>;
    type Delay = FreeRtos;
    type Clock = Esp32TimeAdapter;
    type Store = NvsAdapter;
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MELD Node v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Storage and board drivers ──────────────────────────
    let store = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;

    // SAFETY: the status LED GPIO is not claimed by any other driver.
    let led_pin = unsafe { AnyOutputPin::new(pins::STATUS_LED_GPIO) };
    let led = PinDriver::output(led_pin)?;

    let mut hal = HardwareHal::<NodeBoard>::new(BoardParts {
        panel: UnwiredPanel,
        tags: UnwiredTagFrontend,
        touch: UnwiredTouch,
        buzzer: UnwiredTone,
        led,
        delay: FreeRtos,
        clock: Esp32TimeAdapter::new(),
        store,
    });

    // ── 3. Core service ───────────────────────────────────────
    let config = Arc::new(ConfigCell::default());
    let mut node = NodeService::new(Arc::clone(&config));
    let mut sink = LogEventSink::new();

    node.setup(&mut hal, &mut sink);
    info!("System ready. Entering acquisition loop.");

    // ── 4. Acquisition loop ───────────────────────────────────
    // Each step ends with a short FreeRTOS delay, so the idle task and
    // its watchdog get CPU time.
    loop {
        node.step(&mut hal, &mut sink);
    }
}
