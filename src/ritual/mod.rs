//! Ritual dispatch engine.
//!
//! Given a tag activation and the live config, run exactly one behavior to
//! completion.  Every behavior follows the same bracket:
//!
//! ```text
//! status screen ─▶ LED / buzzer effect ─▶ record or counter write
//!               ─▶ completion screen ─▶ dwell ─▶ ready screen
//! ```
//!
//! Storage failures are logged and otherwise ignored: the feedback
//! sequence always completes and the node always lands on the ready
//! screen.  Nothing here is cancellable once started.

pub mod records;

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{Hal, Uid};
use crate::config::{Behavior, ConfigCell, RITUAL_DWELL_MS, RitualConfig, SHORT_DWELL_MS};
use crate::drivers::led_patterns;
use crate::screens::{self, format_status};

use records::{
    MomentRecord, RecordKey, RecordKeyer, RecordKind, TipRecord, UnlockRecord, VoteRecord,
    record_key, round_cents,
};

/// What a dispatch did, for the event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RitualOutcome {
    pub behavior: Behavior,
    /// Key of the record written, if the behavior writes one and the save
    /// went through.
    pub record_key: Option<RecordKey>,
    /// Config the closing ready screen was drawn with.
    pub ready_config: Arc<RitualConfig>,
}

/// Run the configured behavior for `uid`.
///
/// The config is snapshotted once at activation; a replacement arriving
/// mid-ritual only shows on the final ready screen.
pub fn dispatch<H: Hal + ?Sized>(
    hal: &mut H,
    live: &ConfigCell,
    uid: &Uid,
    keyer: &mut RecordKeyer,
) -> RitualOutcome {
    let config = live.snapshot();
    let uid_hex = uid.to_hex();
    info!("ritual {} for uid {}", config.behavior, uid_hex);

    let record_key = match config.behavior {
        Behavior::SaveMoment => save_moment(hal, &config, &uid_hex, keyer),
        Behavior::SendTip => send_tip(hal, &config, &uid_hex, keyer),
        Behavior::VoteA => vote(hal, &config, &uid_hex, keyer, VoteSide::A),
        Behavior::VoteB => vote(hal, &config, &uid_hex, keyer, VoteSide::B),
        Behavior::IncrementCounter => {
            increment_counter(hal, &config, &uid_hex);
            None
        }
        Behavior::TriggerLight => {
            trigger_light(hal, &config, &uid_hex);
            None
        }
        Behavior::UnlockContent => unlock_content(hal, &config, &uid_hex, keyer),
        Behavior::Unrecognized(code) => {
            warn!("no ritual for behavior code {}", code);
            screens::status(hal, &config.label, "Unknown behavior");
            hal.delay(SHORT_DWELL_MS);
            None
        }
    };

    let ready_config = live.snapshot();
    screens::ready(hal, &ready_config);

    RitualOutcome {
        behavior: config.behavior,
        record_key,
        ready_config,
    }
}

// ---------------------------------------------------------------------------
// Behaviors
// ---------------------------------------------------------------------------

fn save_moment<H: Hal + ?Sized>(
    hal: &mut H,
    config: &RitualConfig,
    uid: &str,
    keyer: &mut RecordKeyer,
) -> Option<RecordKey> {
    hal.debug_print(&format!("Saving moment for UID: {}", uid));
    screens::status(hal, &config.label, "Saving moment...");
    hal.led_blink(3, 200);
    hal.buzzer_success();

    let timestamp = keyer.stamp(hal.millis());
    let record = MomentRecord {
        uid,
        node: &config.node_id,
        timestamp,
        verified: true,
    };
    let key = save_record(hal, RecordKind::Moment, timestamp, &record);

    finish(hal, config, "Moment saved!", RITUAL_DWELL_MS);
    key
}

fn send_tip<H: Hal + ?Sized>(
    hal: &mut H,
    config: &RitualConfig,
    uid: &str,
    keyer: &mut RecordKeyer,
) -> Option<RecordKey> {
    let amount = round_cents(config.tip_amount);
    hal.debug_print(&format!("Sending tip: ${:.2} for UID: {}", amount, uid));
    screens::status(hal, &config.label, "Sending tip...");
    hal.led_blink(5, 100);

    hal.buzzer_tone(800, 100);
    hal.delay(120);
    hal.buzzer_tone(1000, 100);
    hal.delay(120);
    hal.buzzer_tone(1200, 150);

    let timestamp = keyer.stamp(hal.millis());
    let record = TipRecord {
        uid,
        amount,
        node: &config.node_id,
        timestamp,
    };
    let key = save_record(hal, RecordKind::Tip, timestamp, &record);

    let message = format_status(format_args!("Tip sent: ${:.2}", amount));
    finish(hal, config, &message, RITUAL_DWELL_MS);
    key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoteSide {
    A,
    B,
}

impl VoteSide {
    fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

fn vote<H: Hal + ?Sized>(
    hal: &mut H,
    config: &RitualConfig,
    uid: &str,
    keyer: &mut RecordKeyer,
    side: VoteSide,
) -> Option<RecordKey> {
    let option = side.as_str();
    hal.debug_print(&format!(
        "Voting {}: {} for UID: {}",
        option, config.vote_option, uid
    ));
    let message = format_status(format_args!("Voting {}...", option));
    screens::status(hal, &config.label, &message);

    match side {
        VoteSide::A => {
            hal.led_set(true);
            hal.buzzer_tone(1000, 500);
            hal.led_set(false);
        }
        VoteSide::B => {
            hal.led_blink(2, 250);
            hal.buzzer_tone(800, 300);
            hal.delay(100);
            hal.buzzer_tone(600, 300);
        }
    }

    let timestamp = keyer.stamp(hal.millis());
    let record = VoteRecord {
        uid,
        option,
        vote_option: &config.vote_option,
        node: &config.node_id,
        timestamp,
    };
    let key = save_record(hal, RecordKind::Vote, timestamp, &record);

    let message = format_status(format_args!("Vote {} recorded", option));
    finish(hal, config, &message, RITUAL_DWELL_MS);
    key
}

fn increment_counter<H: Hal + ?Sized>(hal: &mut H, config: &RitualConfig, uid: &str) {
    hal.debug_print(&format!(
        "Incrementing counter: {} for UID: {}",
        config.counter_name, uid
    ));
    screens::status(hal, &config.label, "Updating counter...");

    let count = read_counter(hal, &config.counter_name).wrapping_add(1);
    if let Err(e) = hal.storage_save(&config.counter_name, &count.to_be_bytes()) {
        warn!("counter {} not saved: {}", config.counter_name, e);
    }

    hal.led_blink(count % 10, 150);
    hal.buzzer_tone(1000 + (count % 500) as u16, 200);

    let message = format_status(format_args!("{}: {}", config.counter_name, count));
    finish(hal, config, &message, RITUAL_DWELL_MS);
}

fn trigger_light<H: Hal + ?Sized>(hal: &mut H, config: &RitualConfig, uid: &str) {
    hal.debug_print(&format!(
        "Triggering light pattern: {} for UID: {}",
        config.light_pattern, uid
    ));
    screens::status(hal, &config.label, "Light show!");

    let program = led_patterns::compile(config.light_pattern());
    led_patterns::play(hal, &program);

    finish(hal, config, "Light show complete", SHORT_DWELL_MS);
}

fn unlock_content<H: Hal + ?Sized>(
    hal: &mut H,
    config: &RitualConfig,
    uid: &str,
    keyer: &mut RecordKeyer,
) -> Option<RecordKey> {
    hal.debug_print(&format!("Unlocking content for UID: {}", uid));
    screens::status(hal, &config.label, "Unlocking content...");
    hal.led_set(true);
    hal.buzzer_success();
    hal.delay(RITUAL_DWELL_MS);
    hal.led_set(false);

    let timestamp = keyer.stamp(hal.millis());
    let record = UnlockRecord {
        uid,
        content_id: &config.node_id,
        node: &config.node_id,
        timestamp,
    };
    let key = save_record(hal, RecordKind::Unlock, timestamp, &record);

    finish(hal, config, "Content unlocked!", RITUAL_DWELL_MS);
    key
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current value of a big-endian `u32` counter; 0 when absent or unreadable.
pub fn read_counter<H: Hal + ?Sized>(hal: &mut H, name: &str) -> u32 {
    let mut buf = [0u8; 4];
    match hal.storage_load(name, &mut buf) {
        Ok(_) => u32::from_be_bytes(buf),
        Err(e) => {
            warn!("counter {} unreadable: {}", name, e);
            0
        }
    }
}

fn save_record<H: Hal + ?Sized, R: Serialize>(
    hal: &mut H,
    kind: RecordKind,
    timestamp: u64,
    record: &R,
) -> Option<RecordKey> {
    let key = record_key(kind, timestamp);
    let body = match serde_json::to_vec(record) {
        Ok(body) => body,
        Err(e) => {
            warn!("{} record not encoded: {}", kind.prefix(), e);
            return None;
        }
    };
    match hal.storage_save(&key, &body) {
        Ok(()) => Some(key),
        Err(e) => {
            warn!("record {} not saved: {}", key, e);
            None
        }
    }
}

fn finish<H: Hal + ?Sized>(hal: &mut H, config: &RitualConfig, message: &str, dwell_ms: u32) {
    screens::status(hal, &config.label, message);
    hal.delay(dwell_ms);
}
