//! Outbound agent events.
//!
//! The [`UpdateAgent`](super::service::UpdateAgent) and the
//! [`ConnectivityManager`](crate::broker::ConnectivityManager) emit these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them.

use crate::app::ports::BrokerError;
use crate::error::UpdateError;
use crate::fsm::UpdateState;
use crate::version::VersionId;

/// Structured events emitted by the agent core.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The update state machine moved.
    StateChanged { from: UpdateState, to: UpdateState },

    /// A payload decoded into an announcement.
    AnnouncementReceived { version: VersionId, url: String },

    /// The announced version is the one already running.
    AlreadyCurrent(VersionId),

    /// A version mismatch was detected and the update begins.
    UpdateStarted { from: VersionId, to: VersionId },

    /// The image server answered; the body is `content_length` bytes.
    ImageOpened { content_length: u64 },

    /// Flash write progress, emitted every 10 % of the image.
    WriteProgress { written: u64, total: u64 },

    /// An update attempt failed in `stage`; the running image is unchanged.
    UpdateFailed { stage: UpdateState, error: UpdateError },

    /// The new image is committed as next boot.
    UpdateCommitted(VersionId),

    /// Broker session established after `attempts` tries.
    BrokerConnected { attempts: u32 },

    /// A connect attempt failed.
    BrokerConnectFailed { attempt: u32, error: BrokerError },

    /// The broker session dropped.
    BrokerDisconnected,

    /// Subscribed to the command topic.
    Subscribed(String),

    /// A reconnect was skipped because the network link is down.
    NetworkDown,
}
