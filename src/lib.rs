//! OTA agent firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod announce;
pub mod app;
pub mod broker;
pub mod config;
pub mod error;
pub mod fsm;
pub mod ota;
pub mod version;

// Each adapter carries its own ESP-IDF and simulation halves.
pub mod adapters;
