//! Flash write sequencer.
//!
//! Flow: begin(len) → write_all(stream) → finalize → (caller restarts)
//!
//! Invariants:
//! - at most one [`TransferSession`] is open at a time;
//! - `bytes_written` never exceeds `expected_length`;
//! - the partition is selected for boot only by [`FlashWriteSequencer::finalize`],
//!   and only when every declared byte was written and the platform check
//!   passed. Every failure aborts the partition write instead.

use log::{info, warn};

use crate::app::ports::{ImageStream, PartitionError, StreamError, UpdatePartition};
use crate::error::WriteError;

/// Read/write granularity. Matches the flash sector size.
pub const WRITE_CHUNK_SIZE: usize = 4096;

/// One in-flight image transfer. Obtained from [`FlashWriteSequencer::begin`]
/// and consumed by [`FlashWriteSequencer::finalize`] or
/// [`FlashWriteSequencer::abandon`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an open session keeps the update partition locked"]
pub struct TransferSession {
    id: u32,
    expected_length: u64,
    bytes_written: u64,
}

impl TransferSession {
    pub fn expected_length(&self) -> u64 {
        self.expected_length
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn remaining(&self) -> u64 {
        self.expected_length - self.bytes_written
    }
}

pub struct FlashWriteSequencer<P> {
    partition: P,
    /// Id of the open session, if any.
    active: Option<u32>,
    next_id: u32,
    buf: Vec<u8>,
}

impl<P: UpdatePartition> FlashWriteSequencer<P> {
    pub fn new(partition: P) -> Self {
        Self {
            partition,
            active: None,
            next_id: 1,
            buf: vec![0u8; WRITE_CHUNK_SIZE],
        }
    }

    pub fn partition(&self) -> &P {
        &self.partition
    }

    /// Whether a session is currently open.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Open a session for an image of `expected_length` bytes.
    pub fn begin(&mut self, expected_length: u64) -> Result<TransferSession, WriteError> {
        if self.active.is_some() {
            return Err(WriteError::AlreadyInProgress);
        }
        if expected_length == 0 {
            return Err(WriteError::InvalidLength);
        }
        let capacity = self.partition.capacity();
        if expected_length > capacity {
            warn!(
                "OTA: image of {} bytes exceeds partition capacity {}",
                expected_length, capacity
            );
            return Err(WriteError::InsufficientSpace);
        }

        self.partition.begin(expected_length).map_err(|e| {
            warn!("OTA: partition begin failed: {}", e);
            match e {
                PartitionError::NoPartition => WriteError::InsufficientSpace,
                _ => WriteError::IoFault,
            }
        })?;

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.active = Some(id);
        info!("OTA: begin ({} bytes)", expected_length);
        Ok(TransferSession {
            id,
            expected_length,
            bytes_written: 0,
        })
    }

    /// Drain `stream` into the partition until `expected_length` bytes are
    /// written. `on_chunk` sees every chunk after it reached flash, together
    /// with the running total.
    ///
    /// On any error the partition write is aborted and the session is dead;
    /// pass it to [`abandon`](Self::abandon) or drop it.
    pub fn write_all(
        &mut self,
        session: &mut TransferSession,
        stream: &mut dyn ImageStream,
        mut on_chunk: impl FnMut(&[u8], u64),
    ) -> Result<u64, WriteError> {
        self.check_active(session)?;

        while session.bytes_written < session.expected_length {
            let want = (session.remaining()).min(self.buf.len() as u64) as usize;
            let n = match stream.read(&mut self.buf[..want]) {
                Ok(0) => {
                    warn!(
                        "OTA: stream ended after {} of {} bytes",
                        session.bytes_written, session.expected_length
                    );
                    self.discard();
                    return Err(WriteError::ShortWrite(
                        session.bytes_written,
                        session.expected_length,
                    ));
                }
                Ok(n) => n.min(want),
                Err(e) => {
                    warn!("OTA: {} at byte {}", e, session.bytes_written);
                    self.discard();
                    return Err(match e {
                        StreamError::Timeout | StreamError::Io => WriteError::IoFault,
                    });
                }
            };

            if let Err(e) = self.partition.write(&self.buf[..n]) {
                warn!("OTA: flash write failed: {}", e);
                self.discard();
                return Err(WriteError::IoFault);
            }

            session.bytes_written += n as u64;
            on_chunk(&self.buf[..n], session.bytes_written);
        }

        Ok(session.bytes_written)
    }

    /// Verify the written image and select it for the next boot.
    pub fn finalize(&mut self, session: TransferSession) -> Result<(), WriteError> {
        self.check_active(&session)?;

        if session.bytes_written != session.expected_length {
            warn!(
                "OTA: finalize with {} of {} bytes",
                session.bytes_written, session.expected_length
            );
            self.discard();
            return Err(WriteError::Incomplete);
        }

        if let Err(e) = self.partition.complete() {
            warn!("OTA: platform verification failed: {}", e);
            self.discard();
            return Err(WriteError::VerificationFailed);
        }

        // The write is closed; a failed boot switch leaves the old selection.
        self.active = None;
        self.partition.set_boot().map_err(|e| {
            warn!("OTA: {}", e);
            WriteError::IoFault
        })?;

        info!("OTA: finalized, ready to reboot");
        Ok(())
    }

    /// Discard an open session without committing.
    pub fn abandon(&mut self, session: TransferSession) {
        if self.active == Some(session.id) {
            self.discard();
        }
    }

    fn check_active(&self, session: &TransferSession) -> Result<(), WriteError> {
        if self.active == Some(session.id) {
            Ok(())
        } else {
            Err(WriteError::NotActive)
        }
    }

    fn discard(&mut self) {
        self.partition.abort();
        self.active = None;
        warn!("OTA: aborted");
    }
}
