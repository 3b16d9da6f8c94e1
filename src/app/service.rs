//! Update orchestrator: the hexagonal core.
//!
//! [`UpdateAgent`] owns the state machine, the fetcher, the flash sequencer
//! and the restart handle. It turns one inbound payload into either a
//! committed image plus restart, or a logged failure with the running image
//! untouched.
//!
//! ```text
//!  payload ──▶ ┌────────────────────────────────────┐ ──▶ EventSink
//!              │            UpdateAgent              │
//!              │ decode · compare · fetch · write    │ ──▶ SystemControl
//!              └────────────────────────────────────┘
//!                   │ SecureChannelFactory   │ UpdatePartition
//! ```
//!
//! Runs synchronously: `handle_message` returns only once the machine is
//! back in `Idle` or has reached `Restarting`.

use log::{info, warn};

use crate::announce::{self, UpdateAnnouncement};
use crate::error::{UpdateError, WriteError};
use crate::fsm::{UpdateFsm, UpdateState};
use crate::ota::{AcceptAll, FetchedImage, FlashWriteSequencer, SecureImageFetcher, TransferSession};
use crate::version::{is_update_needed, VersionId};

use super::events::AgentEvent;
use super::ports::{
    EventSink, ImageVerifier, SecureChannelFactory, SystemControl, UpdatePartition,
};

/// Result of handing one payload to [`UpdateAgent::handle_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A restart is already pending; the payload was not looked at.
    Ignored,
    /// The announced version is the running one.
    AlreadyCurrent(VersionId),
    /// The attempt failed in `stage`; the agent is back in `Idle`.
    Rejected { stage: UpdateState, error: UpdateError },
    /// The image is committed and restart was requested.
    Restarting(VersionId),
}

// ───────────────────────────────────────────────────────────────
// UpdateAgent
// ───────────────────────────────────────────────────────────────

pub struct UpdateAgent<C, P, R> {
    current_version: VersionId,
    fsm: UpdateFsm,
    fetcher: SecureImageFetcher<C>,
    sequencer: FlashWriteSequencer<P>,
    verifier: Box<dyn ImageVerifier>,
    system: R,
}

impl<C, P, R> UpdateAgent<C, P, R>
where
    C: SecureChannelFactory,
    P: UpdatePartition,
    R: SystemControl,
{
    pub fn new(current_version: VersionId, channel: C, partition: P, system: R) -> Self {
        info!("OTA agent running firmware {}", current_version);
        Self {
            current_version,
            fsm: UpdateFsm::new(),
            fetcher: SecureImageFetcher::new(channel),
            sequencer: FlashWriteSequencer::new(partition),
            verifier: Box::new(AcceptAll),
            system,
        }
    }

    /// Replace the pre-commit image check (default: accept everything).
    #[must_use]
    pub fn with_verifier(mut self, verifier: Box<dyn ImageVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn current_version(&self) -> &VersionId {
        &self.current_version
    }

    pub fn state(&self) -> UpdateState {
        self.fsm.current()
    }

    /// True once a restart has been requested; later messages are ignored.
    pub fn is_halted(&self) -> bool {
        self.fsm.current().is_terminal()
    }

    pub fn fetcher(&self) -> &SecureImageFetcher<C> {
        &self.fetcher
    }

    pub fn sequencer(&self) -> &FlashWriteSequencer<P> {
        &self.sequencer
    }

    pub fn system(&self) -> &R {
        &self.system
    }

    // ── Orchestration ─────────────────────────────────────────

    /// Run one payload through the whole pipeline.
    pub fn handle_message(
        &mut self,
        payload: &[u8],
        sink: &mut (impl EventSink + ?Sized),
    ) -> UpdateOutcome {
        if self.is_halted() {
            info!("OTA: restart pending, ignoring message");
            return UpdateOutcome::Ignored;
        }

        // 1. Validating
        if let Err(e) = self.enter(UpdateState::Validating, sink) {
            return self.fail(e, sink);
        }
        let announcement = match announce::decode(payload) {
            Ok(a) => a,
            Err(e) => return self.fail(e.into(), sink),
        };
        info!(
            "OTA: announcement version={} url={}",
            announcement.target_version, announcement.source_url
        );
        sink.emit(&AgentEvent::AnnouncementReceived {
            version: announcement.target_version.clone(),
            url: announcement.source_url.clone(),
        });

        // 2. Comparing
        if let Err(e) = self.enter(UpdateState::Comparing, sink) {
            return self.fail(e, sink);
        }
        if !is_update_needed(&self.current_version, &announcement.target_version) {
            info!("OTA: already running {}, nothing to do", self.current_version);
            sink.emit(&AgentEvent::AlreadyCurrent(self.current_version.clone()));
            self.fsm.reset(sink);
            return UpdateOutcome::AlreadyCurrent(self.current_version.clone());
        }
        info!(
            "OTA: updating {} -> {}",
            self.current_version, announcement.target_version
        );
        sink.emit(&AgentEvent::UpdateStarted {
            from: self.current_version.clone(),
            to: announcement.target_version.clone(),
        });

        // 3. Fetching
        if let Err(e) = self.enter(UpdateState::Fetching, sink) {
            return self.fail(e, sink);
        }
        let mut image = match self.fetcher.open(&announcement.source_url) {
            Ok(image) => image,
            Err(e) => return self.fail(e.into(), sink),
        };
        let total = image.content_length();
        sink.emit(&AgentEvent::ImageOpened {
            content_length: total,
        });

        // 4. Writing
        if let Err(e) = self.enter(UpdateState::Writing, sink) {
            return self.fail(e, sink);
        }
        let session = match self.write_image(&announcement, &mut image, sink) {
            Ok(session) => session,
            Err(e) => return self.fail(e.into(), sink),
        };
        // Every byte is on flash; release the connection before committing.
        drop(image);

        // 5. Finalizing
        if let Err(e) = self.enter(UpdateState::Finalizing, sink) {
            self.sequencer.abandon(session);
            return self.fail(e, sink);
        }
        if let Err(e) = self.commit(session) {
            return self.fail(e.into(), sink);
        }
        let target = announcement.target_version;
        info!("OTA: committed {}", target);
        sink.emit(&AgentEvent::UpdateCommitted(target.clone()));

        // 6. Restarting
        if let Err(e) = self.enter(UpdateState::Restarting, sink) {
            return self.fail(e, sink);
        }
        info!("OTA: restarting into {}", target);
        self.system.restart();
        UpdateOutcome::Restarting(target)
    }

    /// Open a session and stream the whole image into it, feeding the
    /// verifier and emitting progress every 10 %.
    fn write_image(
        &mut self,
        announcement: &UpdateAnnouncement,
        image: &mut FetchedImage,
        sink: &mut (impl EventSink + ?Sized),
    ) -> Result<TransferSession, WriteError> {
        let total = image.content_length();
        let mut session = self.sequencer.begin(total)?;
        self.verifier.begin(announcement, total);

        let verifier = &mut self.verifier;
        let mut last_decile = 0;
        self.sequencer
            .write_all(&mut session, image.stream_mut(), |chunk, written| {
                verifier.update(chunk);
                let decile = written * 10 / total;
                if decile > last_decile {
                    last_decile = decile;
                    sink.emit(&AgentEvent::WriteProgress { written, total });
                }
            })?;
        Ok(session)
    }

    /// Run the pluggable verifier, then the platform finalize.
    fn commit(&mut self, session: TransferSession) -> Result<(), WriteError> {
        if let Err(e) = self.verifier.verify() {
            warn!("OTA: {}", e);
            self.sequencer.abandon(session);
            return Err(WriteError::VerificationFailed);
        }
        self.sequencer.finalize(session)
    }

    /// Take one pipeline edge. A rejected edge aborts the attempt.
    fn enter(
        &mut self,
        next: UpdateState,
        sink: &mut (impl EventSink + ?Sized),
    ) -> Result<(), UpdateError> {
        self.fsm.transition(next, sink).map_err(UpdateError::from)
    }

    fn fail(&mut self, error: UpdateError, sink: &mut (impl EventSink + ?Sized)) -> UpdateOutcome {
        let stage = self.fsm.current();
        warn!("OTA: {} failed: {}", stage.name(), error);
        sink.emit(&AgentEvent::UpdateFailed { stage, error });
        self.fsm.reset(sink);
        UpdateOutcome::Rejected { stage, error }
    }
}
