//! Time adapter.
//!
//! Implements the [`Delay`] port.
//!
//! - **`target_os = "espidf"`**: `FreeRtos::delay_ms`, which yields to the
//!   scheduler (and the idle task that feeds the task watchdog).
//! - **`not(target_os = "espidf")`**: `std::thread::sleep`, plus
//!   [`SimDelay`], which only accumulates simulated time.

use core::time::Duration;

use crate::app::ports::Delay;

/// Blocking delay on the current task.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDelay;

impl SystemDelay {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl Delay for SystemDelay {
    fn delay(&mut self, duration: Duration) {
        let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }
}

#[cfg(not(target_os = "espidf"))]
impl Delay for SystemDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Simulated time: records every wait, never sleeps.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default, Clone)]
pub struct SimDelay {
    waits: Vec<Duration>,
}

#[cfg(not(target_os = "espidf"))]
impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    /// Total simulated time spent waiting.
    pub fn elapsed(&self) -> Duration {
        self.waits.iter().sum()
    }
}

#[cfg(not(target_os = "espidf"))]
impl Delay for SimDelay {
    fn delay(&mut self, duration: Duration) {
        self.waits.push(duration);
    }
}
