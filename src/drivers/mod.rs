//! Input recognisers, feedback patterns and peripheral helpers.

pub mod led_patterns;
pub mod status_led;
pub mod tag_debounce;
pub mod touch_gesture;
