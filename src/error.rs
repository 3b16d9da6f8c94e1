//! Error taxonomy for the update pipeline.
//!
//! One enum per stage (decode → fetch → write) plus [`UpdateError`], which
//! every stage converts into so the orchestrator can log and reset through a
//! single path. All variants are `Copy`: they are logged, published in the
//! status report, and dropped, never propagated out of the control loop.

use core::fmt;

use crate::fsm::InvalidTransition;

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Rejection reasons for an inbound announcement payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not a well-formed JSON document.
    MalformedPayload,
    /// A required field (`version` or `url`) is absent.
    MissingField(&'static str),
    /// The payload exceeds the decoder's document budget.
    PayloadTooLarge(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload => write!(f, "payload is not well-formed JSON"),
            Self::MissingField(name) => write!(f, "missing required field '{name}'"),
            Self::PayloadTooLarge(len) => write!(f, "payload too large ({len} bytes)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// URL scheme is not `https`; no connection was attempted.
    NonSecureUrl,
    /// The secure channel could not be established.
    ConnectFailed,
    /// The server answered with something other than 200 OK.
    BadStatus(u16),
    /// Content length absent or not positive.
    UnknownLength,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonSecureUrl => write!(f, "image URL is not HTTPS"),
            Self::ConnectFailed => write!(f, "secure connection failed"),
            Self::BadStatus(code) => write!(f, "unexpected HTTP status {code}"),
            Self::UnknownLength => write!(f, "image size unknown or invalid"),
        }
    }
}

// ---------------------------------------------------------------------------
// Write errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// The inactive partition cannot hold the image.
    InsufficientSpace,
    /// The stream ended early: `(written, expected)`.
    ShortWrite(u64, u64),
    /// Flash write or stream read failed.
    IoFault,
    /// The written image failed the platform integrity check.
    VerificationFailed,
    /// Finalize was requested before every declared byte was written.
    Incomplete,
    /// A transfer session is already open.
    AlreadyInProgress,
    /// `begin` was called with a zero length.
    InvalidLength,
    /// The session handed in is not the active one.
    NotActive,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientSpace => write!(f, "update partition too small"),
            Self::ShortWrite(written, expected) => {
                write!(f, "short write: {written} of {expected} bytes")
            }
            Self::IoFault => write!(f, "flash or stream I/O fault"),
            Self::VerificationFailed => write!(f, "image verification failed"),
            Self::Incomplete => write!(f, "finalize called before all bytes written"),
            Self::AlreadyInProgress => write!(f, "update session already in progress"),
            Self::InvalidLength => write!(f, "image length must be non-zero"),
            Self::NotActive => write!(f, "transfer session is not active"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline-wide error
// ---------------------------------------------------------------------------

/// Every failure the orchestrator can observe during one update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    Decode(DecodeError),
    Fetch(FetchError),
    Write(WriteError),
    /// The orchestrator tried an edge the state machine does not have.
    Transition(InvalidTransition),
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Fetch(e) => write!(f, "fetch: {e}"),
            Self::Write(e) => write!(f, "write: {e}"),
            Self::Transition(e) => {
                write!(f, "state: no transition {} -> {}", e.from.name(), e.to.name())
            }
        }
    }
}

impl From<DecodeError> for UpdateError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<FetchError> for UpdateError {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

impl From<WriteError> for UpdateError {
    fn from(e: WriteError) -> Self {
        Self::Write(e)
    }
}

impl From<InvalidTransition> for UpdateError {
    fn from(e: InvalidTransition) -> Self {
        Self::Transition(e)
    }
}
