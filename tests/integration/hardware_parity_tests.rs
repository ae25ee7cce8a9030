//! The hardware backend against the simulation backend.
//!
//! Runs the node on `HardwareHal` over fake board drivers that share one
//! clock, advanced only by the board's `DelayNs`, and logs every effect
//! the drivers see.  The log must match the `SimHal` trace of the same
//! scenario effect for effect and millisecond for millisecond.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use meldnode::adapters::hardware::{Board, BoardParts, HardwareHal};
use meldnode::adapters::host::{Effect, Scenario, TraceEntry, run_scenario};
use meldnode::adapters::nvs::NvsAdapter;
use meldnode::adapters::peripherals::{
    Monotonic, PanelDriver, RAW_UID_MAX, RawTouch, TagFrontend, ToneOutput, TouchController,
};
use meldnode::app::ports::KvStore;
use meldnode::app::service::NodeService;
use meldnode::config::{Behavior, CONFIG_STORAGE_KEY, ConfigCell, RitualConfig, fit};
use meldnode::error::StorageError;

use crate::mock_hal::VecSink;

const TAG: [u8; 2] = [0xAA, 0xBB];

/// Shared by every fake driver: the board clock in nanoseconds and the
/// effect log.
#[derive(Clone, Default)]
struct Bench {
    nanos: Rc<Cell<u64>>,
    trace: Rc<RefCell<Vec<TraceEntry>>>,
}

impl Bench {
    fn now_ms(&self) -> u64 {
        self.nanos.get() / 1_000_000
    }

    fn record(&self, effect: Effect) {
        self.trace.borrow_mut().push(TraceEntry {
            at: self.now_ms(),
            effect,
        });
    }
}

struct Panel(Bench);

impl PanelDriver for Panel {
    fn init(&mut self) {}
    fn clear(&mut self) {
        self.0.record(Effect::Clear);
    }
    fn set_pixel(&mut self, x: u16, y: u16, black: bool) {
        self.0.record(Effect::Pixel { x, y, black });
    }
    fn draw_text(&mut self, x: u16, y: u16, text: &str, size: u8) {
        self.0.record(Effect::Text {
            x,
            y,
            text: text.to_string(),
            size,
        });
    }
    fn refresh(&mut self, partial: bool) {
        self.0.record(Effect::Update { partial });
    }
}

/// One tag in the field from `enter` until `leave` by the board clock.
struct Reader {
    bench: Bench,
    enter: u64,
    leave: u64,
}

impl TagFrontend for Reader {
    fn init(&mut self) -> bool {
        true
    }
    fn present(&mut self) -> bool {
        (self.enter..self.leave).contains(&self.bench.now_ms())
    }
    fn read_uid(&mut self, buf: &mut [u8; RAW_UID_MAX]) -> Option<usize> {
        if !self.present() {
            return None;
        }
        buf[..TAG.len()].copy_from_slice(&TAG);
        Some(TAG.len())
    }
    fn read_ndef(&mut self, _buf: &mut [u8]) -> Option<usize> {
        self.present().then_some(0)
    }
    fn write_ndef(&mut self, data: &[u8]) -> bool {
        self.bench.record(Effect::TagWrite { len: data.len() });
        true
    }
}

struct Touch;

impl TouchController for Touch {
    fn init(&mut self) -> bool {
        true
    }
    fn read(&mut self) -> Option<RawTouch> {
        None
    }
}

struct Buzzer(Bench);

impl ToneOutput for Buzzer {
    fn tone(&mut self, frequency_hz: u16, duration_ms: u16) {
        self.0.record(Effect::Tone {
            frequency_hz,
            duration_ms,
        });
    }
}

struct Led(Bench);

impl ErrorType for Led {
    type Error = Infallible;
}

impl OutputPin for Led {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.record(Effect::Led(false));
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.record(Effect::Led(true));
        Ok(())
    }
}

/// The only thing that moves the board clock.
struct Delay(Bench);

impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        let nanos = &self.0.nanos;
        nanos.set(nanos.get() + u64::from(ns));
    }
}

struct Clock(Bench);

impl Monotonic for Clock {
    fn now_ms(&self) -> u64 {
        self.0.now_ms()
    }
}

/// The in-memory NVS engine with writes and deletes logged.
struct Store {
    bench: Bench,
    nvs: NvsAdapter,
}

impl KvStore for Store {
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.nvs.read(key, buf)
    }
    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.bench.record(Effect::Save {
            key: key.to_string(),
            data: data.to_vec(),
        });
        self.nvs.write(key, data)
    }
    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.bench.record(Effect::Delete {
            key: key.to_string(),
        });
        self.nvs.delete(key)
    }
    fn exists(&self, key: &str) -> bool {
        self.nvs.exists(key)
    }
}

struct BenchBoard;

impl Board for BenchBoard {
    type Panel = Panel;
    type Tags = Reader;
    type Touch = Touch;
    type Buzzer = Buzzer;
    type Led = Led;
    type Delay = Delay;
    type Clock = Clock;
    type Store = Store;
}

/// Boot a node on the bench board and run it until `until` ms.
fn run_on_hardware(bench: &Bench, nvs: NvsAdapter, enter: u64, leave: u64, until: u64) {
    let mut hal = HardwareHal::<BenchBoard>::new(BoardParts {
        panel: Panel(bench.clone()),
        tags: Reader {
            bench: bench.clone(),
            enter,
            leave,
        },
        touch: Touch,
        buzzer: Buzzer(bench.clone()),
        led: Led(bench.clone()),
        delay: Delay(bench.clone()),
        clock: Clock(bench.clone()),
        store: Store {
            bench: bench.clone(),
            nvs,
        },
    });
    // The LED driver parks the pin low when it takes it; that is wiring,
    // not node behavior.
    bench.trace.borrow_mut().clear();

    let mut node = NodeService::new(Arc::new(ConfigCell::default()));
    let mut sink = VecSink::new();
    while bench.now_ms() < until {
        node.step(&mut hal, &mut sink);
    }
}

/// The effects a device would show: debug lines go to the serial log on
/// hardware and are not part of the comparison.
fn device_effects(trace: Vec<TraceEntry>) -> Vec<TraceEntry> {
    trace
        .into_iter()
        .filter(|e| !matches!(e.effect, Effect::Debug(_)))
        .collect()
}

fn store_with(cfg: Option<&RitualConfig>) -> NvsAdapter {
    let mut nvs = NvsAdapter::new().unwrap();
    if let Some(cfg) = cfg {
        nvs.write(CONFIG_STORAGE_KEY, &cfg.to_blob().unwrap()).unwrap();
    }
    nvs
}

fn assert_backends_agree(cfg: Option<&RitualConfig>, enter: u64, leave: u64, until: u64) {
    let script = format!("at {enter} tag AABB\nat {leave} untag\nrun {until}\n");
    let sim = run_scenario(Scenario::parse(&script).unwrap(), store_with(cfg));

    let bench = Bench::default();
    run_on_hardware(&bench, store_with(cfg), enter, leave, until);
    let hardware = bench.trace.take();

    assert!(
        hardware
            .iter()
            .any(|e| e.at >= enter && matches!(e.effect, Effect::Led(true))),
        "the tag ran a ritual"
    );
    assert_eq!(hardware, device_effects(sim.trace));
    // Same total time spent in delays.
    assert_eq!(bench.now_ms(), sim.finished_at);
}

#[test]
fn default_tap_matches_the_simulation() {
    assert_backends_agree(None, 500, 4000, 6000);
}

#[test]
fn light_show_matches_the_simulation() {
    let cfg = RitualConfig {
        label: fit("Lantern"),
        behavior: Behavior::TriggerLight,
        light_pattern: fit("pulse"),
        ..RitualConfig::default()
    };
    assert_backends_agree(Some(&cfg), 300, 3000, 5000);
}

#[test]
fn counter_matches_the_simulation() {
    let cfg = RitualConfig {
        behavior: Behavior::IncrementCounter,
        ..RitualConfig::default()
    };
    assert_backends_agree(Some(&cfg), 1200, 4500, 6000);
}
