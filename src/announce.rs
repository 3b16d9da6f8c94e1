//! Update announcement decoder.
//!
//! Wire format (JSON object on the command topic):
//!
//! ```text
//! { "version": "v1.0.0", "url": "https://host/fw.bin", ...ignored }
//! ```
//!
//! Only presence of the two fields is checked here. URL scheme and
//! reachability are the fetcher's problem.

use serde_json::Value;

use crate::error::DecodeError;
use crate::version::VersionId;

/// Largest payload the decoder accepts, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 2048;

pub const VERSION_FIELD: &str = "version";
pub const URL_FIELD: &str = "url";

/// A decoded request to move to `target_version`, fetched from `source_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAnnouncement {
    pub target_version: VersionId,
    pub source_url: String,
}

/// Parse an inbound payload into an [`UpdateAnnouncement`].
pub fn decode(payload: &[u8]) -> Result<UpdateAnnouncement, DecodeError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(DecodeError::PayloadTooLarge(payload.len()));
    }

    let doc: Value = serde_json::from_slice(payload).map_err(|_| DecodeError::MalformedPayload)?;

    let version = field_text(&doc, VERSION_FIELD)?;
    let url = field_text(&doc, URL_FIELD)?;

    Ok(UpdateAnnouncement {
        target_version: VersionId::new(version),
        source_url: url,
    })
}

/// Extract a field as text. Strings are taken verbatim; other scalars and
/// nested values are rendered as their JSON text. `null` counts as absent,
/// and so does every field of a document that is not an object.
fn field_text(doc: &Value, name: &'static str) -> Result<String, DecodeError> {
    match doc.get(name) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(name)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}
