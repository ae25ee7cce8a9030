//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below exercises one slice of the node loop against the
//! recording HAL, the scripted simulation host or the hardware backend over
//! fake board drivers.  Everything runs on the host with no hardware
//! attached.

mod hardware_parity_tests;
mod mock_hal;
mod sim_backend_tests;
