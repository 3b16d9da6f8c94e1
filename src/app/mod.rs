//! Application core: pure domain logic, zero direct I/O.
//!
//! The update orchestrator and the main loop live here. All interaction with
//! the network, flash and the chip happens through the **port traits** in
//! [`ports`], so this layer runs unchanged under host tests with mock
//! adapters.

pub mod events;
pub mod ports;
pub mod runtime;
pub mod service;
