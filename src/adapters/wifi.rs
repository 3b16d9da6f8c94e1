//! WiFi station-mode adapter.
//!
//! Implements [`NetworkStatus`], the only view the agent core has of the
//! network: a single up/down bit.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `BlockingWifi<EspWifi>` in STA mode. A
//!   system event subscription re-issues `esp_wifi_connect` whenever the
//!   station drops, so the link heals on its own while the broker layer
//!   waits.
//! - **all other targets**: a shared flag tests flip to simulate outages.

use core::fmt;

#[cfg(target_os = "espidf")]
use log::{info, warn};

use crate::app::ports::NetworkStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiLink {
    wifi: esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>,
    _reconnect: esp_idf_svc::eventloop::EspSubscription<'static, esp_idf_svc::eventloop::System>,
}

#[cfg(target_os = "espidf")]
impl WifiLink {
    /// Associate with `ssid` and wait for an IP address.
    pub fn start(
        modem: esp_idf_hal::modem::Modem,
        sys_loop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
        ssid: &str,
        password: &str,
    ) -> anyhow::Result<Self> {
        use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi, WifiEvent};

        validate_ssid(ssid).map_err(|e| anyhow::anyhow!("{}", e))?;
        validate_password(password).map_err(|e| anyhow::anyhow!("{}", e))?;

        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop.clone())?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow::anyhow!("{}", WifiError::InvalidSsid))?,
            password: password
                .try_into()
                .map_err(|_| anyhow::anyhow!("{}", WifiError::InvalidPassword))?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }))?;

        wifi.start()?;
        info!("WiFi: connecting to '{}'", ssid);
        wifi.connect()
            .map_err(|e| anyhow::anyhow!("{}: {:?}", WifiError::ConnectionFailed, e))?;
        wifi.wait_netif_up()?;

        let ip = wifi.wifi().sta_netif().get_ip_info()?;
        info!("WiFi: up, IP {}", ip.ip);

        let reconnect = sys_loop.subscribe::<WifiEvent, _>(|event| {
            if matches!(event, WifiEvent::StaDisconnected { .. }) {
                warn!("WiFi: station dropped, reconnecting");
                // SAFETY: the driver is started; connect is safe to call from
                // the event task.
                unsafe {
                    esp_idf_svc::sys::esp_wifi_connect();
                }
            }
        })?;

        Ok(Self {
            wifi,
            _reconnect: reconnect,
        })
    }
}

#[cfg(target_os = "espidf")]
impl NetworkStatus for WifiLink {
    fn is_up(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Link flag shared between the agent and the test driving it.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub struct WifiLink {
    up: std::rc::Rc<core::cell::Cell<bool>>,
}

#[cfg(not(target_os = "espidf"))]
impl WifiLink {
    pub fn simulated(up: bool) -> Self {
        Self {
            up: std::rc::Rc::new(core::cell::Cell::new(up)),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.set(up);
    }
}

#[cfg(not(target_os = "espidf"))]
impl NetworkStatus for WifiLink {
    fn is_up(&self) -> bool {
        self.up.get()
    }
}
