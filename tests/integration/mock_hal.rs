//! Recording HAL for integration tests.
//!
//! Implements every port over a virtual clock that only moves inside
//! `delay`, and records each call with the time it happened so tests can
//! assert on exact sequences and timestamps.  Tag presence and touch
//! samples are scripted against the same clock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use meldnode::app::events::NodeEvent;
use meldnode::app::ports::{
    BuzzerPort, ClockPort, DebugPort, DisplayPort, EventSink, LedPort, NdefPayload, StoragePort,
    TagReaderPort, TouchKind, TouchPort, TouchSample, Uid,
};
use meldnode::app::service::NodeService;
use meldnode::config::{ConfigCell, RitualConfig};
use meldnode::error::HalError;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    DisplayInit,
    Clear,
    Pixel { x: u16, y: u16, black: bool },
    Text { x: u16, y: u16, text: String, size: u8 },
    Update { partial: bool },
    TagInit,
    TagPoll,
    TouchInit,
    Led(bool),
    Tone { frequency_hz: u16, duration_ms: u16 },
    Delay(u32),
    Save { key: String, data: Vec<u8> },
    Delete(String),
    Debug(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub at: u64,
    pub op: Op,
}

#[derive(Debug, Clone)]
pub struct MockTag {
    pub uid: Vec<u8>,
    pub ndef: Vec<u8>,
}

// ── RecordingHal ──────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingHal {
    pub now: u64,
    pub calls: Vec<Call>,
    pub store: HashMap<String, Vec<u8>>,
    /// Every save fails with `Io` while set.
    pub fail_saves: bool,
    tag: Option<MockTag>,
    tag_script: VecDeque<(u64, Option<MockTag>)>,
    touch_script: VecDeque<TouchSample>,
    config_push: Option<(u64, Arc<ConfigCell>, RitualConfig)>,
    tag_ready: bool,
    touch_ready: bool,
}

#[allow(dead_code)]
impl RecordingHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a tag in the field at `at` ms.
    pub fn tag_at(&mut self, at: u64, uid: &[u8]) -> &mut Self {
        self.tag_with_ndef_at(at, uid, &[])
    }

    pub fn tag_with_ndef_at(&mut self, at: u64, uid: &[u8], ndef: &[u8]) -> &mut Self {
        self.tag_script.push_back((
            at,
            Some(MockTag {
                uid: uid.to_vec(),
                ndef: ndef.to_vec(),
            }),
        ));
        self
    }

    /// Take the tag out of the field at `at` ms.
    pub fn untag_at(&mut self, at: u64) -> &mut Self {
        self.tag_script.push_back((at, None));
        self
    }

    /// Queue a touch sample, readable once the clock reaches `at`.
    pub fn touch_at(&mut self, at: u64, kind: TouchKind, x: u16, y: u16) -> &mut Self {
        self.touch_script
            .push_back(TouchSample::clamped(x, y, kind, at));
        self
    }

    /// Replace the live config from "outside" once the clock reaches `at`,
    /// even in the middle of a delay.
    pub fn push_config_at(&mut self, at: u64, cell: Arc<ConfigCell>, cfg: RitualConfig) {
        self.config_push = Some((at, cell, cfg));
    }

    fn record(&mut self, op: Op) {
        self.calls.push(Call { at: self.now, op });
    }

    fn sync_tag(&mut self) {
        while self.tag_script.front().is_some_and(|(at, _)| *at <= self.now) {
            if let Some((_, tag)) = self.tag_script.pop_front() {
                self.tag = tag;
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn ops(&self) -> impl Iterator<Item = &Op> {
        self.calls.iter().map(|c| &c.op)
    }

    /// Every text drawn, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops()
            .filter_map(|op| match op {
                Op::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Texts drawn at the status message line (10, 100).
    pub fn status_messages(&self) -> Vec<&str> {
        self.ops()
            .filter_map(|op| match op {
                Op::Text { x: 10, y: 100, text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Labels drawn on the ready screen (30, 120).
    pub fn ready_labels(&self) -> Vec<&str> {
        self.ops()
            .filter_map(|op| match op {
                Op::Text { x: 30, y: 120, text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn saves(&self) -> Vec<(&str, &[u8])> {
        self.ops()
            .filter_map(|op| match op {
                Op::Save { key, data } => Some((key.as_str(), data.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// Saves whose key starts with `prefix`, with the payload as text.
    pub fn records(&self, prefix: &str) -> Vec<(String, String)> {
        self.saves()
            .into_iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, d)| (k.to_string(), String::from_utf8_lossy(d).into_owned()))
            .collect()
    }

    pub fn tones(&self) -> Vec<(u16, u16)> {
        self.ops()
            .filter_map(|op| match op {
                Op::Tone {
                    frequency_hz,
                    duration_ms,
                } => Some((*frequency_hz, *duration_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn leds(&self) -> Vec<bool> {
        self.ops()
            .filter_map(|op| match op {
                Op::Led(on) => Some(*on),
                _ => None,
            })
            .collect()
    }

    pub fn debug_lines(&self) -> Vec<&str> {
        self.ops()
            .filter_map(|op| match op {
                Op::Debug(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops().filter(|op| pred(op)).count()
    }

    /// Time of the first call matching `pred`.
    pub fn first_at(&self, pred: impl Fn(&Op) -> bool) -> Option<u64> {
        self.calls.iter().find(|c| pred(&c.op)).map(|c| c.at)
    }

    /// Forget the recorded calls, keeping clock, store and scripts.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

// ── Ports ─────────────────────────────────────────────────────

impl DisplayPort for RecordingHal {
    fn display_init(&mut self) {
        self.record(Op::DisplayInit);
    }

    fn display_clear(&mut self) {
        self.record(Op::Clear);
    }

    fn display_set_pixel(&mut self, x: u16, y: u16, black: bool) {
        self.record(Op::Pixel { x, y, black });
    }

    fn display_draw_text(&mut self, x: u16, y: u16, text: &str, size: u8) {
        self.record(Op::Text {
            x,
            y,
            text: text.to_string(),
            size,
        });
    }

    fn display_update(&mut self, partial: bool) {
        self.record(Op::Update { partial });
    }
}

impl TagReaderPort for RecordingHal {
    fn tag_init(&mut self) {
        self.tag_ready = true;
        self.record(Op::TagInit);
    }

    fn tag_present(&mut self) -> bool {
        self.sync_tag();
        self.record(Op::TagPoll);
        self.tag_ready && self.tag.is_some()
    }

    fn tag_uid(&mut self) -> Result<Option<Uid>, HalError> {
        if !self.tag_ready {
            return Err(HalError::NotInitialized);
        }
        self.sync_tag();
        Ok(self.tag.as_ref().map(|t| Uid::from_slice(&t.uid)))
    }

    fn tag_read_ndef(&mut self) -> Result<Option<NdefPayload>, HalError> {
        if !self.tag_ready {
            return Err(HalError::NotInitialized);
        }
        self.sync_tag();
        Ok(self.tag.as_ref().map(|t| {
            let mut p = NdefPayload::new();
            let _ = p.extend_from_slice(&t.ndef[..t.ndef.len().min(p.capacity())]);
            p
        }))
    }

    fn tag_write_ndef(&mut self, payload: &[u8]) -> Result<(), HalError> {
        match self.tag.as_mut() {
            Some(tag) => {
                tag.ndef = payload.to_vec();
                Ok(())
            }
            None => Err(HalError::Io),
        }
    }
}

impl TouchPort for RecordingHal {
    fn touch_init(&mut self) {
        self.touch_ready = true;
        self.record(Op::TouchInit);
    }

    fn touch_read(&mut self) -> Result<Option<TouchSample>, HalError> {
        if !self.touch_ready {
            return Err(HalError::NotInitialized);
        }
        if self
            .touch_script
            .front()
            .is_some_and(|t| t.timestamp <= self.now)
        {
            return Ok(self.touch_script.pop_front());
        }
        Ok(None)
    }
}

impl ClockPort for RecordingHal {
    fn millis(&self) -> u64 {
        self.now
    }

    fn delay(&mut self, ms: u32) {
        self.record(Op::Delay(ms));
        self.now += u64::from(ms);
        if self.config_push.as_ref().is_some_and(|(at, _, _)| *at <= self.now) {
            if let Some((_, cell, cfg)) = self.config_push.take() {
                cell.replace(cfg);
            }
        }
    }
}

impl DebugPort for RecordingHal {
    fn debug_print(&mut self, message: &str) {
        self.record(Op::Debug(message.to_string()));
    }
}

impl LedPort for RecordingHal {
    fn led_set(&mut self, on: bool) {
        self.record(Op::Led(on));
    }
}

impl BuzzerPort for RecordingHal {
    fn buzzer_tone(&mut self, frequency_hz: u16, duration_ms: u16) {
        self.record(Op::Tone {
            frequency_hz,
            duration_ms,
        });
    }
}

impl StoragePort for RecordingHal {
    fn storage_save(&mut self, key: &str, data: &[u8]) -> Result<(), HalError> {
        self.record(Op::Save {
            key: key.to_string(),
            data: data.to_vec(),
        });
        if self.fail_saves {
            return Err(HalError::Io);
        }
        self.store.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn storage_load(&mut self, key: &str, buf: &mut [u8]) -> Result<usize, HalError> {
        Ok(self.store.get(key).map_or(0, |v| {
            let n = v.len().min(buf.len());
            buf[..n].copy_from_slice(&v[..n]);
            n
        }))
    }

    fn storage_delete(&mut self, key: &str) -> Result<(), HalError> {
        self.record(Op::Delete(key.to_string()));
        self.store.remove(key);
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct VecSink {
    pub events: Vec<NodeEvent>,
}

#[allow(dead_code)]
impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&NodeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for VecSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}

/// Step `node` until the clock reaches `until_ms`.
#[allow(dead_code)]
pub fn run_until(node: &mut NodeService, hal: &mut RecordingHal, sink: &mut VecSink, until_ms: u64) {
    while hal.now < until_ms {
        node.step(hal, sink);
    }
}
