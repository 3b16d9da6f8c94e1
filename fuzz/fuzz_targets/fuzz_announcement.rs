//! Fuzz target: `announce::decode`
//!
//! Drives arbitrary byte sequences into the announcement decoder and
//! asserts that it never panics, enforces the payload cap, and that any
//! accepted announcement decodes identically a second time.
//!
//! cargo fuzz run fuzz_announcement

#![no_main]

use libfuzzer_sys::fuzz_target;
use ota_agent::announce::{decode, MAX_PAYLOAD_LEN};
use ota_agent::error::DecodeError;

fuzz_target!(|data: &[u8]| {
    match decode(data) {
        Ok(announcement) => {
            assert!(data.len() <= MAX_PAYLOAD_LEN, "oversized payload accepted");
            assert_eq!(decode(data), Ok(announcement), "decode must be deterministic");
        }
        Err(DecodeError::PayloadTooLarge(len)) => {
            assert_eq!(len, data.len());
            assert!(len > MAX_PAYLOAD_LEN);
        }
        Err(DecodeError::MalformedPayload | DecodeError::MissingField(_)) => {}
    }
});
