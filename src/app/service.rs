//! Node service, the hexagonal core.
//!
//! [`NodeService`] owns the acquisition state (tag debounce, touch gesture
//! recogniser), the menu FSM and the record keyer.  All I/O flows through
//! the [`Hal`] port injected at call sites, so the exact same service runs
//! on the device and in the simulation harness, and is testable against a
//! recording fake.
//!
//! ```text
//!  tag reader ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!  touch      ──▶ │        NodeService         │
//!                 │ debounce · gestures · FSM  │ ──▶ display / LED / buzzer
//!  ConfigCell ──▶ │ ritual dispatch            │ ──▶ storage
//!                 └────────────────────────────┘
//! ```
//!
//! One [`NodeService::step`] is one acquisition cycle.  It never re-enters:
//! a ritual or menu entry runs to completion inside the step that
//! triggered it, so at most one activation is ever in flight.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{
    CONFIG_BLOB_MAX, CONFIG_STORAGE_KEY, CYCLE_YIELD_MS, ConfigCell, NFC_TEST_DWELL_MS,
    RitualConfig, SHORT_DWELL_MS,
};
use crate::drivers::tag_debounce::{TagDebounce, TagPoll};
use crate::drivers::touch_gesture::TouchGesture;
use crate::fsm::context::{FsmContext, MenuItem, NodeAction};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::ritual::{self, records::RecordKeyer};
use crate::screens::{self, format_status};

use super::events::NodeEvent;
use super::ports::{EventSink, Hal, TouchSample, Uid};

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    config: Arc<ConfigCell>,
    fsm: Fsm,
    ctx: FsmContext,
    tags: TagDebounce,
    gesture: TouchGesture,
    keyer: RecordKeyer,
    /// Config the ready screen currently shows; `None` off the ready screen.
    shown: Option<Arc<RitualConfig>>,
    /// Tag activations since boot.
    activations: u32,
    started: bool,
}

impl NodeService {
    /// Construct the service around the shared live config.
    ///
    /// Does **not** touch the HAL; call [`setup`](Self::setup) next.
    pub fn new(config: Arc<ConfigCell>) -> Self {
        Self {
            config,
            fsm: Fsm::new(build_state_table(), StateId::Ready),
            ctx: FsmContext::new(),
            tags: TagDebounce::new(),
            gesture: TouchGesture::new(),
            keyer: RecordKeyer::new(),
            shown: None,
            activations: 0,
            started: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise the peripherals, restore the persisted config and show
    /// the ready screen.
    pub fn setup(&mut self, hal: &mut impl Hal, sink: &mut impl EventSink) {
        if self.started {
            warn!("setup called twice; ignoring");
            return;
        }

        hal.debug_print("MELD Node starting...");
        hal.display_init();
        hal.tag_init();
        hal.touch_init();

        if self.config.take_replaced() {
            // Pushed before boot finished; newer than anything stored.
            sink.emit(&NodeEvent::ConfigReplaced);
            self.persist_config(hal, &self.config.snapshot());
        } else {
            self.restore_config(hal);
        }

        self.fsm.start(&mut self.ctx);
        self.apply_actions(hal);
        self.started = true;

        hal.debug_print("MELD Node ready!");
        sink.emit(&NodeEvent::Started(self.fsm.current_state()));
        info!("NodeService started with ritual {}", self.config.snapshot().behavior);
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one acquisition cycle:
    /// config sync → tag poll → touch/gesture → FSM → actions → yield.
    pub fn step(&mut self, hal: &mut impl Hal, sink: &mut impl EventSink) {
        if !self.started {
            self.setup(hal, sink);
        }

        // 1. Config replaced by the configurator since the last cycle
        self.sync_config(hal, sink);

        let state = self.fsm.current_state();

        // 2. Tags are only watched while idle on the ready screen
        if state == StateId::Ready && self.gesture.is_idle() {
            self.poll_tag(hal, sink);
        }

        // 3. Touch
        let sample = match hal.touch_read() {
            Ok(sample) => sample,
            Err(e) => {
                debug!("touch read failed: {}", e);
                None
            }
        };
        let now = hal.millis();

        if state == StateId::Ready {
            let was_idle = self.gesture.is_idle();
            let gesture = self.gesture.step(now, sample);
            if was_idle && !self.gesture.is_idle() {
                if let Some(s) = sample {
                    hal.debug_print(&format!("Touch at ({}, {})", s.x, s.y));
                }
            }
            if let Some(g) = gesture {
                info!("gesture: {:?}", g);
                sink.emit(&NodeEvent::Gesture(g));
                self.ctx.gesture = Some(g);
            }
        } else {
            self.ctx.touch_down = sample.filter(TouchSample::is_down);
        }

        // 4. Menu FSM
        let transition = self.fsm.tick(&mut self.ctx);
        if let Some(item) = self.ctx.selected.take() {
            sink.emit(&NodeEvent::MenuSelected(item));
        }
        if let Some((from, to)) = transition {
            sink.emit(&NodeEvent::StateChanged { from, to });
        }
        self.ctx.end_cycle();

        // 5. Apply what the handlers queued
        self.apply_actions(hal);

        // 6. Fixed yield
        hal.delay(CYCLE_YIELD_MS);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn activations(&self) -> u32 {
        self.activations
    }

    pub fn config(&self) -> &Arc<ConfigCell> {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // ── Internals ─────────────────────────────────────────────

    fn poll_tag(&mut self, hal: &mut impl Hal, sink: &mut impl EventSink) {
        if !self.tags.due(hal.millis()) {
            return;
        }

        let present = hal.tag_present();
        let uid = if present { read_uid(hal) } else { None };

        match self.tags.observe(present, uid) {
            TagPoll::Quiet => {}
            TagPoll::Removed => {
                debug!("tag removed");
                sink.emit(&NodeEvent::TagRemoved);
            }
            TagPoll::Activated(uid) => {
                hal.debug_print(&format!("NFC tag detected: {}", uid));
                sink.emit(&NodeEvent::TagActivated { uid: uid.clone() });
                self.activations = self.activations.saturating_add(1);

                let outcome = ritual::dispatch(hal, &self.config, &uid, &mut self.keyer);
                self.shown = Some(outcome.ready_config);
                sink.emit(&NodeEvent::RitualCompleted {
                    behavior: outcome.behavior,
                    record_key: outcome.record_key,
                });
            }
        }
    }

    fn sync_config(&mut self, hal: &mut impl Hal, sink: &mut impl EventSink) {
        if !self.config.take_replaced() {
            return;
        }

        let cfg = self.config.snapshot();
        info!("ritual config replaced: {} ({})", cfg.label, cfg.behavior);
        sink.emit(&NodeEvent::ConfigReplaced);
        self.persist_config(hal, &cfg);

        // Other screens pick the new label up when they return to Ready.
        // A ritual that just closed on the live config already drew it.
        let current = self
            .shown
            .as_ref()
            .is_some_and(|shown| Arc::ptr_eq(shown, &cfg));
        if self.fsm.current_state() == StateId::Ready && !current {
            self.show_ready(hal, cfg);
        }
    }

    fn show_ready(&mut self, hal: &mut impl Hal, cfg: Arc<RitualConfig>) {
        screens::ready(hal, &cfg);
        self.shown = Some(cfg);
    }

    fn persist_config(&self, hal: &mut impl Hal, cfg: &RitualConfig) {
        match cfg.to_blob() {
            Ok(blob) => {
                if let Err(e) = hal.storage_save(CONFIG_STORAGE_KEY, &blob) {
                    warn!("ritual config not persisted: {}", e);
                }
            }
            Err(e) => warn!("ritual config not encoded: {}", e),
        }
    }

    fn restore_config(&self, hal: &mut impl Hal) {
        let mut buf = [0u8; CONFIG_BLOB_MAX];
        match hal.storage_load(CONFIG_STORAGE_KEY, &mut buf) {
            Ok(0) => debug!("no stored ritual config, using defaults"),
            Ok(len) => match RitualConfig::from_blob(&buf[..len]) {
                Ok(cfg) => {
                    info!("restored ritual config \"{}\"", cfg.label);
                    self.config.restore(cfg);
                }
                Err(e) => warn!("stored ritual config ignored: {}", e),
            },
            Err(e) => warn!("stored ritual config unreadable: {}", e),
        }
    }

    fn apply_actions(&mut self, hal: &mut impl Hal) {
        let actions = core::mem::take(&mut self.ctx.actions);
        for action in actions {
            match action {
                NodeAction::ShowReady => {
                    let cfg = self.config.snapshot();
                    self.show_ready(hal, cfg);
                }
                NodeAction::ShowMenu => {
                    self.shown = None;
                    screens::menu(hal);
                }
                NodeAction::ShowNodeInfo => {
                    self.shown = None;
                    screens::node_info(hal, &self.config.snapshot());
                }
                NodeAction::RunMenuItem(item) => self.run_menu_item(hal, item),
            }
        }
    }

    fn run_menu_item(&mut self, hal: &mut impl Hal, item: MenuItem) {
        let cfg = self.config.snapshot();
        info!("menu: {:?}", item);

        match item {
            MenuItem::Stats => {
                let count = ritual::read_counter(hal, &cfg.counter_name);
                let taps = format_status(format_args!("Taps: {}", self.activations));
                let counter = format_status(format_args!("{}: {}", cfg.counter_name, count));
                screens::status_lines(hal, &cfg.label, &[taps.as_str(), counter.as_str()]);
                hal.delay(SHORT_DWELL_MS);
            }
            MenuItem::ClearData => {
                if let Err(e) = hal.storage_delete(&cfg.counter_name) {
                    warn!("counter {} not cleared: {}", cfg.counter_name, e);
                }
                screens::status(hal, &cfg.label, "Data cleared");
                hal.delay(SHORT_DWELL_MS);
            }
            MenuItem::TestNfc => {
                screens::status(hal, &cfg.label, "Tap NFC tag to test");
                hal.delay(NFC_TEST_DWELL_MS);
                self.report_test_tag(hal, &cfg);
            }
            // Has its own FSM state; never queued as an action.
            MenuItem::NodeInfo => {}
        }
    }

    fn report_test_tag(&mut self, hal: &mut impl Hal, cfg: &RitualConfig) {
        if !hal.tag_present() {
            return;
        }
        let Some(uid) = read_uid(hal) else {
            return;
        };

        let ndef_len = match hal.tag_read_ndef() {
            Ok(payload) => payload.map_or(0, |p| p.len()),
            Err(e) => {
                debug!("NDEF read failed: {}", e);
                0
            }
        };
        let message = format_status(format_args!("Tag {} ({} B NDEF)", uid, ndef_len));
        screens::status(hal, &cfg.label, &message);
        hal.delay(SHORT_DWELL_MS);

        // The tested tag is still in the field; it must not fire a ritual
        // the moment the node is back on the ready screen.
        let _ = self.tags.observe(true, Some(uid));
    }
}

fn read_uid(hal: &mut impl Hal) -> Option<Uid> {
    match hal.tag_uid() {
        Ok(uid) => uid,
        Err(e) => {
            debug!("tag uid read failed: {}", e);
            None
        }
    }
}
