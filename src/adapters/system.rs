//! System control adapter.
//!
//! Implements [`SystemControl`]: wait out the grace period so the last log
//! lines reach the console, then reboot into the committed image.

use core::time::Duration;

use log::info;

use crate::app::ports::{Delay, SystemControl};

pub struct SystemRestart<D> {
    delay: D,
    grace: Duration,
    /// Simulation only: restarts requested so far.
    #[cfg(not(target_os = "espidf"))]
    requests: u32,
}

impl<D: Delay> SystemRestart<D> {
    pub fn new(delay: D, grace: Duration) -> Self {
        Self {
            delay,
            grace,
            #[cfg(not(target_os = "espidf"))]
            requests: 0,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn restart_requests(&self) -> u32 {
        self.requests
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}

#[cfg(target_os = "espidf")]
impl<D: Delay> SystemControl for SystemRestart<D> {
    fn restart(&mut self) {
        info!("Restarting in {} ms", self.grace.as_millis());
        self.delay.delay(self.grace);
        esp_ota::restart();
    }
}

#[cfg(not(target_os = "espidf"))]
impl<D: Delay> SystemControl for SystemRestart<D> {
    fn restart(&mut self) {
        info!("Restart requested (simulation), grace {} ms", self.grace.as_millis());
        self.delay.delay(self.grace);
        self.requests += 1;
    }
}
