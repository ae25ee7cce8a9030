//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                    |
//! |---------------|---------------------|--------------------------------|
//! | `hardware`    | Hal                 | board drivers (`peripherals`)  |
//! | `sim`         | Hal                 | a `HostBridge`                 |
//! | `host`        | HostBridge          | scripted scenario, effect log  |
//! | `log_sink`    | EventSink           | Serial log output              |
//! | `nvs`         | KvStore             | NVS / in-memory store          |
//! | `time`        | Monotonic           | ESP32 system timer             |
//! | `peripherals` | (driver seams)      | panel, reader, touch, buzzer   |

pub mod hardware;
pub mod host;
pub mod log_sink;
pub mod nvs;
pub mod peripherals;
pub mod sim;
pub mod time;
