//! Image verifiers run between the last written byte and the commit.
//!
//! The platform already checks the image header and checksum when the
//! partition write is completed; verifiers here are an additional,
//! replaceable gate (signature checks would slot in the same way).

use log::warn;

use crate::announce::UpdateAnnouncement;
use crate::app::ports::{ImageVerifier, VerifyError};

/// Accepts every image. Default when no verifier is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ImageVerifier for AcceptAll {
    fn verify(&mut self) -> Result<(), VerifyError> {
        Ok(())
    }
}

/// First byte of every ESP application image.
pub const ESP_IMAGE_MAGIC: u8 = 0xE9;

/// Rejects images whose first byte is not the ESP application magic.
///
/// Catches the common mistake of announcing a URL that serves an HTML error
/// page or a merged flash dump with a 200 status.
#[derive(Debug, Default)]
pub struct ImageMagicVerifier {
    first: Option<u8>,
}

impl ImageMagicVerifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageVerifier for ImageMagicVerifier {
    fn begin(&mut self, _announcement: &UpdateAnnouncement, _expected_len: u64) {
        self.first = None;
    }

    fn update(&mut self, chunk: &[u8]) {
        if self.first.is_none() {
            self.first = chunk.first().copied();
        }
    }

    fn verify(&mut self) -> Result<(), VerifyError> {
        match self.first {
            Some(ESP_IMAGE_MAGIC) => Ok(()),
            Some(other) => {
                warn!("OTA: image magic 0x{:02X}, expected 0x{:02X}", other, ESP_IMAGE_MAGIC);
                Err(VerifyError::Rejected("bad image magic"))
            }
            None => Err(VerifyError::Rejected("empty image")),
        }
    }
}
