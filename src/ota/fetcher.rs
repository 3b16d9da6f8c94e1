//! Secure image fetcher.
//!
//! Wraps a [`SecureChannelFactory`] and enforces the transport contract:
//! HTTPS only, 200 OK only, positive declared length only. The channel is
//! owned here and never shared.

use log::{info, warn};

use crate::app::ports::{ImageStream, SecureChannelFactory};
use crate::error::FetchError;

const SECURE_SCHEME: &str = "https";
const HTTP_OK: u16 = 200;

/// An open image download: the body stream and its declared length.
///
/// Dropping this closes the underlying connection.
pub struct FetchedImage {
    stream: Box<dyn ImageStream>,
    content_length: u64,
}

impl FetchedImage {
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn stream_mut(&mut self) -> &mut dyn ImageStream {
        self.stream.as_mut()
    }
}

/// True iff `url` uses the `https` scheme (case-insensitive).
pub fn is_secure_url(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, rest)) => scheme.eq_ignore_ascii_case(SECURE_SCHEME) && !rest.is_empty(),
        None => false,
    }
}

pub struct SecureImageFetcher<C> {
    channel: C,
}

impl<C: SecureChannelFactory> SecureImageFetcher<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Open `url` and return its body with the declared length.
    pub fn open(&mut self, url: &str) -> Result<FetchedImage, FetchError> {
        if !is_secure_url(url) {
            warn!("OTA: refusing non-HTTPS image URL");
            return Err(FetchError::NonSecureUrl);
        }

        let response = self.channel.open(url).map_err(|e| {
            warn!("OTA: secure channel failed: {}", e);
            FetchError::ConnectFailed
        })?;

        info!("OTA: HTTP status {}", response.status);
        if response.status != HTTP_OK {
            return Err(FetchError::BadStatus(response.status));
        }

        let content_length = match response.content_length {
            Some(len) if len > 0 => len as u64,
            other => {
                warn!("OTA: invalid content length {:?}", other);
                return Err(FetchError::UnknownLength);
            }
        };

        info!("OTA: image size {} bytes", content_length);
        Ok(FetchedImage {
            stream: response.body,
            content_length,
        })
    }
}
