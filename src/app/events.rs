//! Outbound node events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them (log line on the device, effect trace in
//! the simulation harness).

use crate::app::ports::Uid;
use crate::config::Behavior;
use crate::drivers::touch_gesture::Gesture;
use crate::fsm::StateId;
use crate::fsm::context::MenuItem;
use crate::ritual::records::RecordKey;

/// Structured events emitted by the node core.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// `setup` finished and the ready screen is up.
    Started(StateId),

    /// A tag distinct from the debounce state was detected.
    TagActivated { uid: Uid },

    /// The tag left the field; the next presentation retriggers.
    TagRemoved,

    /// A ritual ran to completion.  `record_key` is the storage key of the
    /// record written, if the behavior writes one and the save succeeded.
    RitualCompleted {
        behavior: Behavior,
        record_key: Option<RecordKey>,
    },

    /// A touch gesture was recognised.
    Gesture(Gesture),

    /// A menu entry was picked.
    MenuSelected(MenuItem),

    /// The menu FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// The live ritual config was replaced by the configurator.
    ConfigReplaced,
}
