//! Concrete state handler functions and table builder.
//!
//! ```text
//!  READY ──[long press]──▶ MENU ──[Stats | ClearData | TestNfc]──▶ READY
//!    ▲                       │  └──────[touch outside bands]─────▶ READY
//!    │                  [Node Info]
//!    │                       ▼
//!    └────[touch-down]──── NODE_INFO
//! ```

use log::info;

use super::context::{FsmContext, MenuItem, NodeAction};
use super::{StateDescriptor, StateId};
use crate::drivers::touch_gesture::Gesture;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Ready
        StateDescriptor {
            id: StateId::Ready,
            name: "Ready",
            on_enter: Some(ready_enter),
            on_exit: None,
            on_update: ready_update,
        },
        // Index 1: Menu
        StateDescriptor {
            id: StateId::Menu,
            name: "Menu",
            on_enter: Some(menu_enter),
            on_exit: None,
            on_update: menu_update,
        },
        // Index 2: NodeInfo
        StateDescriptor {
            id: StateId::NodeInfo,
            name: "NodeInfo",
            on_enter: Some(node_info_enter),
            on_exit: None,
            on_update: node_info_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  READY state
// ═══════════════════════════════════════════════════════════════════════════

fn ready_enter(ctx: &mut FsmContext) {
    ctx.push(NodeAction::ShowReady);
}

fn ready_update(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.gesture {
        Some(Gesture::LongPress) => Some(StateId::Menu),
        // A short tap has no meaning outside the menu.
        Some(Gesture::ShortTap) | None => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  MENU state
// ═══════════════════════════════════════════════════════════════════════════

fn menu_enter(ctx: &mut FsmContext) {
    ctx.push(NodeAction::ShowMenu);
}

fn menu_update(ctx: &mut FsmContext) -> Option<StateId> {
    let touch = ctx.touch_down?;

    match MenuItem::from_y(touch.y) {
        Some(MenuItem::NodeInfo) => {
            ctx.selected = Some(MenuItem::NodeInfo);
            Some(StateId::NodeInfo)
        }
        Some(item) => {
            ctx.selected = Some(item);
            ctx.push(NodeAction::RunMenuItem(item));
            Some(StateId::Ready)
        }
        None => {
            info!("menu dismissed at y={}", touch.y);
            Some(StateId::Ready)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  NODE_INFO state
// ═══════════════════════════════════════════════════════════════════════════

fn node_info_enter(ctx: &mut FsmContext) {
    ctx.push(NodeAction::ShowNodeInfo);
}

fn node_info_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.touch_down.map(|_| StateId::Ready)
}
