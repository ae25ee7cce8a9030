//! Shared context threaded through every FSM handler.
//!
//! The service writes this cycle's inputs (recognised gesture, raw
//! touch-down) before the tick; handlers read them and queue
//! [`NodeAction`]s that the service applies to the HAL afterwards.

use crate::app::ports::TouchSample;
use crate::drivers::touch_gesture::Gesture;
use crate::screens::{MENU_BAND_HEIGHT, MENU_ROWS};

// ---------------------------------------------------------------------------
// Menu entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Stats,
    ClearData,
    TestNfc,
    NodeInfo,
}

impl MenuItem {
    const ALL: [Self; 4] = [Self::Stats, Self::ClearData, Self::TestNfc, Self::NodeInfo];

    /// The entry whose hit-band contains `y`; `None` means "exit menu".
    pub fn from_y(y: u16) -> Option<Self> {
        Self::ALL
            .iter()
            .zip(MENU_ROWS.iter())
            .find(|(_, (top, _))| y >= *top && y < top + MENU_BAND_HEIGHT)
            .map(|(item, _)| *item)
    }
}

// ---------------------------------------------------------------------------
// Actions (written by handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    ShowReady,
    ShowMenu,
    ShowNodeInfo,
    /// Run a self-contained menu entry (message, dwell).
    RunMenuItem(MenuItem),
}

/// Enough for exit + enter of one transition plus a menu entry.
pub const MAX_ACTIONS: usize = 4;

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FsmContext {
    /// Cycles since the current state was entered.
    pub ticks_in_state: u64,

    // -- Inputs for this cycle --
    /// Gesture recognised this cycle (only fed while Ready).
    pub gesture: Option<Gesture>,
    /// Raw touch-down read this cycle (only fed outside Ready).
    pub touch_down: Option<TouchSample>,

    // -- Outputs --
    pub actions: heapless::Vec<NodeAction, MAX_ACTIONS>,
    /// Menu entry picked this cycle.
    pub selected: Option<MenuItem>,
}

impl FsmContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action.  Overflow would mean a handler bug; it is logged
    /// and the action dropped.
    pub fn push(&mut self, action: NodeAction) {
        if self.actions.push(action).is_err() {
            log::warn!("FSM action queue full, dropped {:?}", action);
        }
    }

    /// Clear the per-cycle inputs.  Actions are drained by the service.
    pub fn end_cycle(&mut self) {
        self.gesture = None;
        self.touch_down = None;
    }
}
