//! ECUWatch agent: finds an ELM327 BLE adapter, runs an
//! [`ew_elm327::Session`] over it, and prints decoded measurements.
//!
//! Modules are public so the end-to-end tests can drive the runner with a
//! simulated backend.

pub mod ble;
#[cfg(feature = "btleplug")]
pub mod btle;
pub mod config;
pub mod error;
pub mod present;
pub mod runner;
pub mod setup;
pub mod sim;
