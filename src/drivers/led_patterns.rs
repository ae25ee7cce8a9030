//! Light-show pattern engine.
//!
//! Compiles a [`LightPattern`] into a flat list of LED / tone / delay
//! steps, then replays it on any HAL.  Keeping the pattern as data lets
//! both backends produce the identical effect sequence and lets tests
//! assert on it without a HAL at all.
//!
//! ## Pattern types
//!
//! | Pattern  | Description                                        | Length  |
//! |---------|----------------------------------------------------|---------|
//! | Rainbow | 10 × (on, rising tone 500+100·i Hz, 100 ms, off, 50 ms) | 1.5 s |
//! | Pulse   | 5 × (on, 50 ms, off, 50 ms)                        | 0.5 s   |
//! | Strobe  | 10 blinks at 100 ms                                | 2.0 s   |

use crate::app::ports::{BuzzerPort, LedPort};
use crate::config::LightPattern;

/// Longest compiled pattern (rainbow: 10 cycles × 5 steps).
pub const MAX_STEPS: usize = 50;

const RAINBOW_CYCLES: u16 = 10;
const RAINBOW_BASE_HZ: u16 = 500;
const RAINBOW_STEP_HZ: u16 = 100;
const PULSE_CYCLES: usize = 5;
const STROBE_BLINKS: u32 = 10;
const STROBE_DELAY_MS: u32 = 100;

/// One primitive effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightStep {
    Led(bool),
    Tone { frequency_hz: u16, duration_ms: u16 },
    Delay(u32),
    /// Delegates to the HAL's shared blink sequence.
    Blink { times: u32, delay_ms: u32 },
}

pub type LightProgram = heapless::Vec<LightStep, MAX_STEPS>;

/// Build the step list for `pattern`.
pub fn compile(pattern: LightPattern) -> LightProgram {
    let mut program = LightProgram::new();
    // Every arm stays within MAX_STEPS; pushes cannot fail.
    match pattern {
        LightPattern::Rainbow => {
            for i in 0..RAINBOW_CYCLES {
                let _ = program.push(LightStep::Led(true));
                let _ = program.push(LightStep::Tone {
                    frequency_hz: RAINBOW_BASE_HZ + i * RAINBOW_STEP_HZ,
                    duration_ms: 100,
                });
                let _ = program.push(LightStep::Delay(100));
                let _ = program.push(LightStep::Led(false));
                let _ = program.push(LightStep::Delay(50));
            }
        }
        LightPattern::Pulse => {
            for _ in 0..PULSE_CYCLES {
                let _ = program.push(LightStep::Led(true));
                let _ = program.push(LightStep::Delay(50));
                let _ = program.push(LightStep::Led(false));
                let _ = program.push(LightStep::Delay(50));
            }
        }
        LightPattern::Strobe => {
            let _ = program.push(LightStep::Blink {
                times: STROBE_BLINKS,
                delay_ms: STROBE_DELAY_MS,
            });
        }
    }
    program
}

/// Replay a compiled program on the HAL.
pub fn play<H: LedPort + BuzzerPort + ?Sized>(hal: &mut H, program: &[LightStep]) {
    for step in program {
        match *step {
            LightStep::Led(on) => hal.led_set(on),
            LightStep::Tone {
                frequency_hz,
                duration_ms,
            } => hal.buzzer_tone(frequency_hz, duration_ms),
            LightStep::Delay(ms) => hal.delay(ms),
            LightStep::Blink { times, delay_ms } => hal.led_blink(times, delay_ms),
        }
    }
}

/// Nominal run time of a program in milliseconds.
pub fn duration_ms(program: &[LightStep]) -> u64 {
    program
        .iter()
        .map(|step| match *step {
            LightStep::Delay(ms) => u64::from(ms),
            LightStep::Blink { times, delay_ms } => 2 * u64::from(times) * u64::from(delay_ms),
            LightStep::Led(_) | LightStep::Tone { .. } => 0,
        })
        .sum()
}
