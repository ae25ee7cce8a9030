//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per node event
//! to the `log` facade (UART / USB-CDC on the device, stderr in the
//! simulation harness).

use log::info;

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            NodeEvent::TagActivated { uid } => {
                info!("TAG | activated uid={}", uid);
            }
            NodeEvent::TagRemoved => {
                info!("TAG | removed");
            }
            NodeEvent::RitualCompleted {
                behavior,
                record_key,
            } => match record_key {
                Some(key) => info!("RITUAL | {} done, record={}", behavior, key),
                None => info!("RITUAL | {} done", behavior),
            },
            NodeEvent::Gesture(g) => {
                info!("TOUCH | {:?}", g);
            }
            NodeEvent::MenuSelected(item) => {
                info!("MENU | selected {:?}", item);
            }
            NodeEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            NodeEvent::ConfigReplaced => {
                info!("CONFIG | ritual config replaced");
            }
        }
    }
}
