//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable MQTT client id in the form `ota-XXYYZZ` (last 3 bytes
//! of the 6-byte MAC in uppercase hex). Used when the configuration leaves
//! the client id empty, so that several devices on one broker never kick
//! each other off with the same id.

use crate::config::ClientId;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the client id from the last 3 MAC bytes.
/// Format: `ota-XXYYZZ` (e.g., `ota-EFCAFE`).
pub fn client_id(mac: &MacAddress) -> ClientId {
    use core::fmt::Write;
    let mut id = ClientId::new();
    let _ = write!(id, "ota-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}
