//! HTTPS secure-channel adapter.
//!
//! Implements [`SecureChannelFactory`].
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` with the ESP-IDF
//!   certificate bundle attached, so server certificates are checked against
//!   the bundled public CAs. The connection is moved into the returned body
//!   stream and closed when that stream drops.
//! - **`not(target_os = "espidf")`**: an in-memory URL catalogue. Each
//!   resource can lie about its length, cut the body short or fail mid-read,
//!   and the adapter counts opens and live connections.

use core::time::Duration;

use log::{debug, warn};

use crate::app::ports::{ChannelError, ChannelResponse, ImageStream, SecureChannelFactory, StreamError};

/// Per-read timeout. A stalled server surfaces as [`StreamError::Timeout`].
pub const READ_TIMEOUT: Duration = Duration::from_secs(15);

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use super::*;

    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
    use esp_idf_svc::http::Method;
    use esp_idf_svc::io::Read;

    /// Response body; owns the connection.
    struct HttpsBody(EspHttpConnection);

    impl ImageStream for HttpsBody {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
            self.0.read(buf).map_err(|e| {
                warn!("HTTPS read failed: {:?}", e);
                if e.0.code() == esp_idf_svc::sys::ESP_ERR_HTTP_EAGAIN as i32 {
                    StreamError::Timeout
                } else {
                    StreamError::Io
                }
            })
        }
    }

    pub struct HttpsChannel {
        config: Configuration,
    }

    impl HttpsChannel {
        pub fn new() -> Self {
            Self {
                config: Configuration {
                    crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
                    timeout: Some(READ_TIMEOUT),
                    buffer_size: Some(4096),
                    ..Default::default()
                },
            }
        }
    }

    impl Default for HttpsChannel {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SecureChannelFactory for HttpsChannel {
        fn open(&mut self, url: &str) -> Result<ChannelResponse, ChannelError> {
            let mut conn = EspHttpConnection::new(&self.config).map_err(|e| {
                warn!("HTTPS client init failed: {:?}", e);
                ChannelError::Connect
            })?;

            conn.initiate_request(Method::Get, url, &[]).map_err(|e| {
                warn!("HTTPS request failed: {:?}", e);
                ChannelError::Handshake
            })?;
            conn.initiate_response().map_err(|e| {
                warn!("HTTPS response failed: {:?}", e);
                ChannelError::Request
            })?;

            let status = conn.status();
            let content_length = conn
                .header("Content-Length")
                .and_then(|v| v.trim().parse::<i64>().ok());
            debug!("HTTPS {} -> {} ({:?} bytes)", url, status, content_length);

            Ok(ChannelResponse {
                status,
                content_length,
                body: Box::new(HttpsBody(conn)),
            })
        }
    }
}

#[cfg(target_os = "espidf")]
pub use platform::HttpsChannel;

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod simulation {
    use super::*;

    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// A resource served by the simulated channel.
    #[derive(Debug, Clone)]
    pub struct SimResource {
        pub status: u16,
        /// Declared `Content-Length`; `None` omits the header.
        pub declared_length: Option<i64>,
        pub body: Vec<u8>,
        /// Fail the read that would pass this offset.
        pub fail_at: Option<usize>,
    }

    impl SimResource {
        /// 200 OK, declared length equal to the body.
        pub fn ok(body: Vec<u8>) -> Self {
            Self {
                status: 200,
                declared_length: Some(body.len() as i64),
                body,
                fail_at: None,
            }
        }
    }

    struct SimBody {
        data: Vec<u8>,
        pos: usize,
        fail_at: Option<usize>,
        live: Rc<Cell<u32>>,
    }

    impl ImageStream for SimBody {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
            let n = buf.len().min(self.data.len() - self.pos);
            if self.fail_at.is_some_and(|at| self.pos + n > at) {
                return Err(StreamError::Timeout);
            }
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Drop for SimBody {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    #[derive(Default)]
    pub struct HttpsChannel {
        resources: HashMap<String, SimResource>,
        opens: u32,
        live: Rc<Cell<u32>>,
    }

    impl HttpsChannel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn serve(&mut self, url: impl Into<String>, resource: SimResource) {
            self.resources.insert(url.into(), resource);
        }

        /// Number of `open` calls that reached the transport.
        pub fn opens(&self) -> u32 {
            self.opens
        }

        /// Connections whose body stream has not been dropped yet.
        pub fn live_connections(&self) -> u32 {
            self.live.get()
        }
    }

    impl SecureChannelFactory for HttpsChannel {
        fn open(&mut self, url: &str) -> Result<ChannelResponse, ChannelError> {
            self.opens += 1;
            let Some(res) = self.resources.get(url) else {
                warn!("HTTPS (simulation): no route to {}", url);
                return Err(ChannelError::Connect);
            };
            self.live.set(self.live.get() + 1);
            debug!("HTTPS (simulation): {} -> {}", url, res.status);
            Ok(ChannelResponse {
                status: res.status,
                content_length: res.declared_length,
                body: Box::new(SimBody {
                    data: res.body.clone(),
                    pos: 0,
                    fail_at: res.fail_at,
                    live: Rc::clone(&self.live),
                }),
            })
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub use simulation::{HttpsChannel, SimResource};
