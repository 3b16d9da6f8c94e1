//! Firmware image transfer: secure fetch → sequenced flash write → commit.
//!
//! Flow: `open(url)` → `begin(len)` → `write_all(stream)` → verifier →
//! `finalize()` → restart
//!
//! Nothing here decides *whether* to update; that is the orchestrator's job
//! in [`crate::app::service`].

pub mod fetcher;
pub mod sequencer;
pub mod verifier;

pub use fetcher::{FetchedImage, SecureImageFetcher};
pub use sequencer::{FlashWriteSequencer, TransferSession};
pub use verifier::{AcceptAll, ImageMagicVerifier};

#[cfg(target_os = "espidf")]
use log::{info, warn};

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image as valid on startup.
///
/// When the bootloader has rollback enabled, an image that is never marked
/// valid is reverted on the next reset.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    log::info!("OTA rollback check (simulation): skipped");
}
