//! Scripted host for the simulation backend.
//!
//! [`ScriptHost`] is a deterministic [`HostBridge`]: a virtual clock that
//! only moves when the node yields, a timed [`Scenario`] of inbound events,
//! a key-value store and a log of every relayed effect.  The sim binary and
//! the integration tests both drive the node through it.
//!
//! ## Scenario format
//!
//! One directive per line; blank lines and `#` comments are skipped.
//!
//! ```text
//! at 500  tag AABB              # tag enters the field
//! at 500  tag 04A1B2 ndef D101  # ... with an NDEF payload
//! at 4000 untag
//! at 6000 touch down 40 60
//! at 6050 touch up 40 60
//! at 9000 config {"node_id":"n1","label":"Tips","behavior":1, ...}
//! run 12000                     # stop the clock here
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::Deserialize;

use crate::app::events::NodeEvent;
use crate::app::ports::{
    EventSink, KvStore, MAX_NDEF_LEN, MAX_UID_LEN, NdefPayload, TouchKind, TouchSample, Uid,
};
use crate::app::service::NodeService;
use crate::config::{Behavior, ConfigCell, RitualConfig};
use crate::error::{ScenarioError, ScenarioErrorKind, StorageError};
use crate::events::{Inbox, SimTag};
use crate::fsm::StateId;

use super::log_sink::LogEventSink;
use super::nvs::NvsAdapter;
use super::sim::{HostBridge, SimHal};

/// How long a scenario without `run` keeps going after its last event.
pub const DEFAULT_TAIL_MS: u64 = 5000;

/// Scenario used when the sim binary is started without a file.
pub const DEMO_SCENARIO: &str = "\
# default ritual: one tag tap saves a moment
at 500 tag AABB
at 4000 untag
run 6000
";

// ───────────────────────────────────────────────────────────────
// Scenario
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Tag { uid: Uid, ndef: NdefPayload },
    Untag,
    Touch { kind: TouchKind, x: u16, y: u16 },
    Config(Box<RitualConfig>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub at: u64,
    pub directive: Directive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    events: VecDeque<Scheduled>,
    run_until: u64,
}

impl Scenario {
    pub fn parse(text: &str) -> Result<Self, ScenarioError> {
        let mut events = Vec::new();
        let mut run_until = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let err = |kind| ScenarioError {
                line: idx + 1,
                kind,
            };

            let (head, rest) = split_word(line);
            match head {
                "run" => {
                    let (ms, _) = split_word(rest);
                    run_until = Some(ms.parse().map_err(|_| err(ScenarioErrorKind::BadNumber))?);
                }
                "at" => {
                    let (ms, rest) = split_word(rest);
                    let at: u64 = ms.parse().map_err(|_| err(ScenarioErrorKind::BadNumber))?;
                    let directive = parse_directive(rest).map_err(err)?;
                    events.push(Scheduled { at, directive });
                }
                _ => return Err(err(ScenarioErrorKind::MissingTime)),
            }
        }

        // Stable: same-time directives keep file order.
        events.sort_by_key(|e| e.at);
        let last = events.last().map_or(0, |e| e.at);
        Ok(Self {
            run_until: run_until.unwrap_or(last + DEFAULT_TAIL_MS),
            events: events.into(),
        })
    }

    pub fn run_until(&self) -> u64 {
        self.run_until
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Drop a `#` comment.  Config lines keep theirs: JSON strings may
/// contain `#`.
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    if line.contains(" config ") {
        return line;
    }
    line.split('#').next().unwrap_or(line)
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn parse_directive(text: &str) -> Result<Directive, ScenarioErrorKind> {
    let (word, rest) = split_word(text);
    match word {
        "tag" => {
            let (hex, rest) = split_word(rest);
            let uid = parse_hex(hex)?;
            if uid.len() > MAX_UID_LEN {
                return Err(ScenarioErrorKind::UidTooLong);
            }
            let mut ndef = NdefPayload::new();
            let (kw, rest) = split_word(rest);
            if kw == "ndef" {
                let (hex, _) = split_word(rest);
                let bytes = parse_hex(hex)?;
                let _ = ndef.extend_from_slice(&bytes[..bytes.len().min(MAX_NDEF_LEN)]);
            }
            Ok(Directive::Tag {
                uid: Uid::from_slice(&uid),
                ndef,
            })
        }
        "untag" => Ok(Directive::Untag),
        "touch" => {
            let (kind, rest) = split_word(rest);
            let kind = match kind {
                "down" => TouchKind::Down,
                "move" => TouchKind::Move,
                "up" => TouchKind::Up,
                _ => return Err(ScenarioErrorKind::BadTouchKind),
            };
            let (x, rest) = split_word(rest);
            let (y, _) = split_word(rest);
            let x = x.parse().map_err(|_| ScenarioErrorKind::BadNumber)?;
            let y = y.parse().map_err(|_| ScenarioErrorKind::BadNumber)?;
            Ok(Directive::Touch { kind, x, y })
        }
        "config" => serde_json::from_str::<ConfigFields>(rest)
            .map(|fields| Directive::Config(Box::new(fields.into())))
            .map_err(|_| ScenarioErrorKind::BadConfig),
        _ => Err(ScenarioErrorKind::UnknownDirective),
    }
}

/// Body of a `config` directive: the setter's arguments as the
/// configurator sends them.  Strings of any length are accepted and fitted
/// on the way in; missing fields keep their default.
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFields {
    node_id: String,
    label: String,
    behavior: i32,
    tip_amount: f32,
    vote_option: String,
    counter_name: String,
    light_pattern: String,
}

impl Default for ConfigFields {
    fn default() -> Self {
        let d = RitualConfig::default();
        Self {
            node_id: d.node_id.to_string(),
            label: d.label.to_string(),
            behavior: d.behavior.code(),
            tip_amount: d.tip_amount,
            vote_option: d.vote_option.to_string(),
            counter_name: d.counter_name.to_string(),
            light_pattern: d.light_pattern.to_string(),
        }
    }
}

impl From<ConfigFields> for RitualConfig {
    fn from(f: ConfigFields) -> Self {
        RitualConfig::new(
            &f.node_id,
            &f.label,
            Behavior::from_code(f.behavior),
            f.tip_amount,
            &f.vote_option,
            &f.counter_name,
            &f.light_pattern,
        )
    }
}

fn parse_hex(hex: &str) -> Result<Vec<u8>, ScenarioErrorKind> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(ScenarioErrorKind::BadHex);
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ScenarioErrorKind::BadHex))
        .collect()
}

// ───────────────────────────────────────────────────────────────
// Effect trace
// ───────────────────────────────────────────────────────────────

/// One effect relayed from the node to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Clear,
    Pixel { x: u16, y: u16, black: bool },
    Text { x: u16, y: u16, text: String, size: u8 },
    Update { partial: bool },
    Led(bool),
    Tone { frequency_hz: u16, duration_ms: u16 },
    TagWrite { len: usize },
    Save { key: String, data: Vec<u8> },
    Delete { key: String },
    Debug(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub at: u64,
    pub effect: Effect,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>7}] ", self.at)?;
        match &self.effect {
            Effect::Clear => write!(f, "display clear"),
            Effect::Pixel { x, y, black } => write!(f, "pixel ({}, {}) {}", x, y, black),
            Effect::Text { x, y, text, size } => {
                write!(f, "text ({}, {}) x{} {:?}", x, y, size, text)
            }
            Effect::Update { partial: true } => write!(f, "display update (partial)"),
            Effect::Update { partial: false } => write!(f, "display update (full)"),
            Effect::Led(on) => write!(f, "led {}", if *on { "on" } else { "off" }),
            Effect::Tone {
                frequency_hz,
                duration_ms,
            } => write!(f, "tone {} Hz {} ms", frequency_hz, duration_ms),
            Effect::TagWrite { len } => write!(f, "tag write {} B", len),
            Effect::Save { key, data } => {
                write!(f, "save {} {}", key, String::from_utf8_lossy(data))
            }
            Effect::Delete { key } => write!(f, "delete {}", key),
            Effect::Debug(line) => write!(f, "debug {}", line),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ScriptHost
// ───────────────────────────────────────────────────────────────

pub struct ScriptHost<S: KvStore> {
    now: u64,
    pending: VecDeque<Scheduled>,
    config: Arc<ConfigCell>,
    store: S,
    trace: Vec<TraceEntry>,
    /// Inbound events the inbox refused (subsystem not initialised).
    refused: u32,
}

impl<S: KvStore> ScriptHost<S> {
    pub fn new(scenario: Scenario, config: Arc<ConfigCell>, store: S) -> Self {
        Self {
            now: 0,
            pending: scenario.events,
            config,
            store,
            trace: Vec::new(),
            refused: 0,
        }
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn refused(&self) -> u32 {
        self.refused
    }

    fn record(&mut self, effect: Effect) {
        self.trace.push(TraceEntry {
            at: self.now,
            effect,
        });
    }

    fn deliver(&mut self, inbox: &mut Inbox) {
        while self.pending.front().is_some_and(|e| e.at <= self.now) {
            let Some(Scheduled { at, directive }) = self.pending.pop_front() else {
                break;
            };
            let accepted = match directive {
                Directive::Tag { uid, ndef } => {
                    debug!("host: tag {} at {}", uid, at);
                    inbox.present_tag(SimTag { uid, ndef })
                }
                Directive::Untag => {
                    debug!("host: tag removed at {}", at);
                    inbox.remove_tag();
                    true
                }
                Directive::Touch { kind, x, y } => {
                    inbox.push_touch(TouchSample::clamped(x, y, kind, at))
                }
                Directive::Config(cfg) => {
                    debug!("host: config push at {}", at);
                    self.config.replace(*cfg);
                    true
                }
            };
            if !accepted {
                self.refused = self.refused.saturating_add(1);
            }
        }
    }

    pub fn into_parts(self) -> (Vec<TraceEntry>, S) {
        (self.trace, self.store)
    }
}

impl<S: KvStore> HostBridge for ScriptHost<S> {
    fn display_clear(&mut self) {
        self.record(Effect::Clear);
    }

    fn display_set_pixel(&mut self, x: u16, y: u16, black: bool) {
        self.record(Effect::Pixel { x, y, black });
    }

    fn display_draw_text(&mut self, x: u16, y: u16, text: &str, size: u8) {
        self.record(Effect::Text {
            x,
            y,
            text: text.to_string(),
            size,
        });
    }

    fn display_update(&mut self, partial: bool) {
        self.record(Effect::Update { partial });
    }

    fn led_set(&mut self, on: bool) {
        self.record(Effect::Led(on));
    }

    fn buzzer_tone(&mut self, frequency_hz: u16, duration_ms: u16) {
        self.record(Effect::Tone {
            frequency_hz,
            duration_ms,
        });
    }

    fn tag_write(&mut self, payload: &[u8]) -> bool {
        self.record(Effect::TagWrite { len: payload.len() });
        true
    }

    fn storage_save(&mut self, key: &str, data: &[u8]) -> bool {
        self.record(Effect::Save {
            key: key.to_string(),
            data: data.to_vec(),
        });
        self.store.write(key, data).is_ok()
    }

    fn storage_load(&mut self, key: &str, buf: &mut [u8]) -> usize {
        self.store.read(key, buf).unwrap_or(0)
    }

    fn storage_delete(&mut self, key: &str) -> bool {
        self.record(Effect::Delete {
            key: key.to_string(),
        });
        self.store.delete(key).is_ok()
    }

    fn debug_print(&mut self, message: &str) {
        self.record(Effect::Debug(message.to_string()));
    }

    fn millis(&self) -> u64 {
        self.now
    }

    fn yield_to_host(&mut self, inbox: &mut Inbox, budget_ms: u32) {
        self.now += u64::from(budget_ms);
        self.deliver(inbox);
    }
}

// ───────────────────────────────────────────────────────────────
// Runner
// ───────────────────────────────────────────────────────────────

/// Event sink that keeps every event and logs it as well.
#[derive(Debug, Default)]
pub struct TraceSink {
    pub events: Vec<NodeEvent>,
    log: LogEventSink,
}

impl EventSink for TraceSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.log.emit(event);
        self.events.push(event.clone());
    }
}

/// Everything a finished simulation run produced.
pub struct SimReport<S> {
    pub trace: Vec<TraceEntry>,
    pub events: Vec<NodeEvent>,
    pub store: S,
    pub final_state: StateId,
    pub activations: u32,
    pub dropped_touches: u32,
    pub refused: u32,
    pub finished_at: u64,
}

/// Boot a node on a [`ScriptHost`] and run it until the scenario's end.
pub fn run_scenario<S: KvStore>(scenario: Scenario, store: S) -> SimReport<S> {
    let config = Arc::new(ConfigCell::default());
    let run_until = scenario.run_until();
    let host = ScriptHost::new(scenario, Arc::clone(&config), store);

    let mut hal = SimHal::new(host);
    let mut node = NodeService::new(config);
    let mut sink = TraceSink::default();

    while hal.bridge().millis() < run_until {
        node.step(&mut hal, &mut sink);
    }

    let dropped_touches = hal.inbox().dropped_touches();
    let finished_at = hal.bridge().millis();
    let refused = hal.bridge().refused();
    let (trace, store) = hal.into_bridge().into_parts();

    SimReport {
        trace,
        events: sink.events,
        store,
        final_state: node.state(),
        activations: node.activations(),
        dropped_touches,
        refused,
        finished_at,
    }
}

/// [`run_scenario`] over the in-memory NVS engine.
pub fn run_in_memory(scenario: Scenario) -> Result<SimReport<NvsAdapter>, StorageError> {
    Ok(run_scenario(scenario, NvsAdapter::new()?))
}
