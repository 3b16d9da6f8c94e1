//! OTA partition adapter.
//!
//! Implements [`UpdatePartition`] on the inactive app slot.
//!
//! - **`target_os = "espidf"`**: `esp-ota` (`OtaUpdate::begin → write →
//!   finalize → set_as_boot_partition`), with the slot size read from the
//!   partition table.
//! - **`not(target_os = "espidf")`**: two in-memory slots; `boot_image()`
//!   shows what the device would boot next, which lets tests check that a
//!   failed update never touches it.

use log::{info, warn};

use crate::app::ports::{PartitionError, UpdatePartition};

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct OtaPartition {
    writing: Option<esp_ota::OtaUpdate>,
    completed: Option<esp_ota::CompletedOtaUpdate>,
}

#[cfg(target_os = "espidf")]
impl OtaPartition {
    pub fn new() -> Self {
        Self {
            writing: None,
            completed: None,
        }
    }
}

#[cfg(target_os = "espidf")]
impl Default for OtaPartition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl UpdatePartition for OtaPartition {
    fn capacity(&self) -> u64 {
        // SAFETY: a null start pointer asks for the slot after the running one.
        let part = unsafe { esp_idf_svc::sys::esp_ota_get_next_update_partition(core::ptr::null()) };
        if part.is_null() {
            return 0;
        }
        // SAFETY: non-null partition pointers reference the static table.
        u64::from(unsafe { (*part).size })
    }

    fn begin(&mut self, image_len: u64) -> Result<(), PartitionError> {
        self.abort();
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("esp-ota begin failed: {:?}", e);
            PartitionError::NoPartition
        })?;
        info!("OTA partition: erasing for {} bytes", image_len);
        self.writing = Some(update);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), PartitionError> {
        let update = self.writing.as_mut().ok_or(PartitionError::Io)?;
        update.write(data).map_err(|e| {
            warn!("esp-ota write failed: {:?}", e);
            PartitionError::Io
        })
    }

    fn complete(&mut self) -> Result<(), PartitionError> {
        let update = self.writing.take().ok_or(PartitionError::Io)?;
        let completed = update.finalize().map_err(|e| {
            warn!("esp-ota finalize failed: {:?}", e);
            PartitionError::Validation
        })?;
        self.completed = Some(completed);
        Ok(())
    }

    fn set_boot(&mut self) -> Result<(), PartitionError> {
        let completed = self.completed.as_mut().ok_or(PartitionError::BootSelect)?;
        completed.set_as_boot_partition().map_err(|e| {
            warn!("esp-ota set_as_boot_partition failed: {:?}", e);
            PartitionError::BootSelect
        })
    }

    fn abort(&mut self) {
        if let Some(update) = self.writing.take() {
            if let Err(e) = update.abort() {
                warn!("esp-ota abort failed: {:?}", e);
            }
        }
        self.completed = None;
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    Writing,
    Completed,
}

/// In-memory A/B slot pair.
#[cfg(not(target_os = "espidf"))]
pub struct OtaPartition {
    capacity: u64,
    staging: Vec<u8>,
    state: SlotState,
    boot: Vec<u8>,
    /// Fail the `complete()` integrity check.
    reject_image: bool,
    aborts: u32,
}

#[cfg(not(target_os = "espidf"))]
impl OtaPartition {
    /// A slot of `capacity` bytes next to a running image `boot`.
    pub fn new(capacity: u64, boot: Vec<u8>) -> Self {
        Self {
            capacity,
            staging: Vec::new(),
            state: SlotState::Empty,
            boot,
            reject_image: false,
            aborts: 0,
        }
    }

    pub fn reject_next_image(&mut self) {
        self.reject_image = true;
    }

    /// The image the device would boot next.
    pub fn boot_image(&self) -> &[u8] {
        &self.boot
    }

    /// Bytes written since the last `begin`.
    pub fn staged(&self) -> &[u8] {
        &self.staging
    }

    pub fn aborts(&self) -> u32 {
        self.aborts
    }
}

#[cfg(not(target_os = "espidf"))]
impl UpdatePartition for OtaPartition {
    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn begin(&mut self, image_len: u64) -> Result<(), PartitionError> {
        info!("OTA partition (simulation): begin {} bytes", image_len);
        self.staging.clear();
        self.state = SlotState::Writing;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), PartitionError> {
        if self.state != SlotState::Writing {
            return Err(PartitionError::Io);
        }
        if self.staging.len() as u64 + data.len() as u64 > self.capacity {
            return Err(PartitionError::Io);
        }
        self.staging.extend_from_slice(data);
        Ok(())
    }

    fn complete(&mut self) -> Result<(), PartitionError> {
        if self.state != SlotState::Writing {
            return Err(PartitionError::Io);
        }
        if std::mem::take(&mut self.reject_image) {
            self.state = SlotState::Empty;
            return Err(PartitionError::Validation);
        }
        self.state = SlotState::Completed;
        Ok(())
    }

    fn set_boot(&mut self) -> Result<(), PartitionError> {
        if self.state != SlotState::Completed {
            return Err(PartitionError::BootSelect);
        }
        self.boot = std::mem::take(&mut self.staging);
        self.state = SlotState::Empty;
        info!("OTA partition (simulation): boot slot switched ({} bytes)", self.boot.len());
        Ok(())
    }

    fn abort(&mut self) {
        self.aborts += 1;
        self.staging.clear();
        self.state = SlotState::Empty;
    }
}
