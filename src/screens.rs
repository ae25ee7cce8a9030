//! Screen layouts for the 296×296 e-paper panel.
//!
//! Every screen starts from a cleared frame.  Screens that are replaced
//! within seconds (status, menu, node info) use the fast partial refresh;
//! the ready screen stays up indefinitely and gets a full refresh.

use core::fmt::Write;

use crate::app::ports::DisplayPort;
use crate::config::RitualConfig;

/// Longest formatted status line we build ("<counter_name>: <u32>").
pub type StatusText = heapless::String<64>;

pub const TITLE: &str = "MELD Node";

/// Vertical positions of the menu entries; each owns a 20 px band.
pub const MENU_ROWS: [(u16, &str); 4] = [
    (50, "1. View Stats"),
    (70, "2. Clear Data"),
    (90, "3. Test NFC"),
    (110, "4. Node Info"),
];
pub const MENU_BAND_HEIGHT: u16 = 20;

/// Status screen: title, ritual label and a one-line message.
pub fn status<D: DisplayPort + ?Sized>(display: &mut D, label: &str, message: &str) {
    status_lines(display, label, &[message]);
}

/// Status screen with several message lines, 20 px apart.
pub fn status_lines<D: DisplayPort + ?Sized>(display: &mut D, label: &str, lines: &[&str]) {
    display.display_clear();
    display.display_draw_text(10, 10, TITLE, 2);
    display.display_draw_text(10, 50, label, 1);
    display.display_draw_text(10, 80, "Status:", 1);
    let mut y = 100;
    for line in lines {
        display.display_draw_text(10, y, line, 1);
        y += 20;
    }
    display.display_update(true);
}

/// Idle screen naming the active ritual.
pub fn ready<D: DisplayPort + ?Sized>(display: &mut D, config: &RitualConfig) {
    display.display_clear();
    display.display_draw_text(50, 50, TITLE, 3);
    display.display_draw_text(30, 120, &config.label, 2);
    display.display_draw_text(10, 180, "Tap NFC tag to activate", 1);
    display.display_draw_text(10, 200, "Touch screen for menu", 1);
    display.display_update(false);
}

pub fn menu<D: DisplayPort + ?Sized>(display: &mut D) {
    display.display_clear();
    display.display_draw_text(10, 10, "MELD Node Menu", 2);
    for (y, text) in MENU_ROWS {
        display.display_draw_text(10, y, text, 1);
    }
    display.display_draw_text(10, 250, "Touch to exit", 1);
    display.display_update(true);
}

pub fn node_info<D: DisplayPort + ?Sized>(display: &mut D, config: &RitualConfig) {
    display.display_clear();
    display.display_draw_text(10, 10, "Node Information", 2);
    display.display_draw_text(10, 50, "ID:", 1);
    display.display_draw_text(40, 50, &config.node_id, 1);
    display.display_draw_text(10, 70, "Label:", 1);
    display.display_draw_text(60, 70, &config.label, 1);
    display.display_draw_text(10, 250, "Touch to continue", 1);
    display.display_update(true);
}

/// Format into a status line, truncating on overflow.
pub fn format_status(args: core::fmt::Arguments<'_>) -> StatusText {
    let mut out = StatusText::new();
    let _ = Truncating(&mut out).write_fmt(args);
    out
}

struct Truncating<'a>(&'a mut StatusText);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}
