//! MELD node firmware library.
//!
//! Exposes the business logic and both HAL backends for the device binary,
//! the simulation harness and integration testing.  All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod pins;
pub mod ritual;
pub mod screens;

pub mod adapters;
pub mod drivers;
