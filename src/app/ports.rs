//! Port traits: the hexagonal boundary between the update engine and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ UpdateAgent / ConnectivityManager (domain)
//! ```
//!
//! Driven adapters (secure channel, flash partition, broker client, network
//! link, restart) implement these traits. The domain consumes them through
//! generics or `&mut dyn` references, so it never touches ESP-IDF directly.
//!
//! ## Contract notes
//!
//! - **ImageStream** owns its connection: dropping it must close the
//!   connection. The fetcher relies on this to release the channel on every
//!   exit path.
//! - **UpdatePartition** must never change the boot selection except in
//!   [`UpdatePartition::set_boot`].
//! - All port errors are typed; callers map every variant explicitly.

use core::fmt;
use core::time::Duration;

use crate::announce::UpdateAnnouncement;
use crate::broker::BrokerOptions;

use super::events::AgentEvent;

// ───────────────────────────────────────────────────────────────
// Secure channel (driven adapter: domain → HTTPS client)
// ───────────────────────────────────────────────────────────────

/// Readable body of an open secure connection.
pub trait ImageStream {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;
}

/// What the transport reported for a request, before the body is read.
pub struct ChannelResponse {
    /// HTTP status code.
    pub status: u16,
    /// Declared body length; `None` when the header is absent.
    pub content_length: Option<i64>,
    /// Body stream; owns the connection.
    pub body: Box<dyn ImageStream>,
}

/// Opens secure connections. TLS trust configuration lives entirely inside
/// the implementation.
pub trait SecureChannelFactory {
    fn open(&mut self, url: &str) -> Result<ChannelResponse, ChannelError>;
}

// ───────────────────────────────────────────────────────────────
// Update partition (driven adapter: domain → OTA flash)
// ───────────────────────────────────────────────────────────────

/// The inactive OTA slot.
///
/// Call order is `begin → write* → complete → set_boot`; `abort` may be
/// called at any point after `begin` and must leave the boot selection
/// untouched.
pub trait UpdatePartition {
    /// Usable size of the inactive slot, in bytes.
    fn capacity(&self) -> u64;

    /// Prepare the slot for an image of `image_len` bytes.
    fn begin(&mut self, image_len: u64) -> Result<(), PartitionError>;

    /// Append `data` to the slot.
    fn write(&mut self, data: &[u8]) -> Result<(), PartitionError>;

    /// Close the write and run the platform integrity check.
    fn complete(&mut self) -> Result<(), PartitionError>;

    /// Select the completed slot for the next boot.
    fn set_boot(&mut self) -> Result<(), PartitionError>;

    /// Discard whatever was written since `begin`.
    fn abort(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Image verifier (extension point, invoked before commit)
// ───────────────────────────────────────────────────────────────

/// Pluggable image check run between the last written byte and the commit.
pub trait ImageVerifier {
    /// A new transfer is starting.
    fn begin(&mut self, _announcement: &UpdateAnnouncement, _expected_len: u64) {}

    /// Observe a chunk exactly as it was written to flash.
    fn update(&mut self, _chunk: &[u8]) {}

    /// Accept or reject the image.
    fn verify(&mut self) -> Result<(), VerifyError>;
}

// ───────────────────────────────────────────────────────────────
// System control
// ───────────────────────────────────────────────────────────────

pub trait SystemControl {
    /// Reboot into the committed image. Never returns on hardware;
    /// simulations record the request and return.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AgentEvent`]s through this port.
/// Adapters decide where they go (serial log, test recorder, ...).
pub trait EventSink {
    fn emit(&mut self, event: &AgentEvent);
}

// ───────────────────────────────────────────────────────────────
// Time and network
// ───────────────────────────────────────────────────────────────

/// Blocking wait. Injected so reconnect backoff runs under simulated time
/// in tests.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Link-layer connectivity (WiFi association + IP) as a single bit.
pub trait NetworkStatus {
    fn is_up(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: domain ↔ MQTT client)
// ───────────────────────────────────────────────────────────────

/// Something that happened on the broker connection since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Message { topic: String, payload: Vec<u8> },
    /// The session dropped (keep-alive failure or broker close).
    Disconnected,
}

pub trait BrokerPort {
    /// Open a session. Blocks until the broker accepts or refuses.
    fn connect(&mut self, options: &BrokerOptions) -> Result<(), BrokerError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Service keep-alive and return the next pending event, if any.
    fn poll(&mut self) -> Option<BrokerEvent>;

    /// Tear down the session. Idempotent.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ImageStream::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// The read stalled past the channel's timeout.
    Timeout,
    /// Transport-level failure (TLS record error, socket reset).
    Io,
}

/// Errors from [`SecureChannelFactory::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// DNS / TCP connect failed.
    Connect,
    /// TLS handshake failed.
    Handshake,
    /// The request could not be sent or the response headers not read.
    Request,
}

/// Errors from [`UpdatePartition`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionError {
    /// No inactive OTA slot in the partition table.
    NoPartition,
    /// Erase or write failed.
    Io,
    /// The platform rejected the image (bad header, checksum).
    Validation,
    /// The boot selection could not be changed.
    BootSelect,
}

/// Rejection from an [`ImageVerifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    Rejected(&'static str),
}

/// Errors from [`BrokerPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// The session was refused. On device this is the ESP-IDF client error
    /// code (`esp_err_t`); the MQTT client wrapper does not surface the
    /// CONNACK return code. Simulated brokers report whatever they script.
    Refused(i32),
    /// No session is open.
    NotConnected,
    /// The connect attempt did not complete in time.
    Timeout,
    /// Transport failure below MQTT.
    Transport,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "stream read timed out"),
            Self::Io => write!(f, "stream I/O error"),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect failed"),
            Self::Handshake => write!(f, "TLS handshake failed"),
            Self::Request => write!(f, "request failed"),
        }
    }
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPartition => write!(f, "no inactive OTA partition"),
            Self::Io => write!(f, "partition I/O error"),
            Self::Validation => write!(f, "image validation failed"),
            Self::BootSelect => write!(f, "set boot partition failed"),
        }
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(why) => write!(f, "image rejected: {}", why),
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused(code) => write!(f, "broker refused session (state {})", code),
            Self::NotConnected => write!(f, "not connected"),
            Self::Timeout => write!(f, "connect timed out"),
            Self::Transport => write!(f, "transport error"),
        }
    }
}
