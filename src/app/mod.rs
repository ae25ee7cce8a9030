//! Node core: acquisition, dispatch and menu logic behind port traits.
//!
//! All interaction with hardware happens through the **port traits**
//! defined in [`ports`], keeping this layer testable without real
//! peripherals and identical across the hardware and simulation backends.

pub mod events;
pub mod ports;
pub mod service;
