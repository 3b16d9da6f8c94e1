//! Agent configuration.
//!
//! Loaded once at startup and shared read-only. On device the values come
//! from the build environment (`OTA_*` variables, see `build.rs`); tests and
//! provisioning fixtures use [`AgentConfig::from_json`].

use core::fmt;
use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::broker::{BrokerOptions, ReconnectPolicy};
use crate::version::VersionId;

/// Client id buffer. MQTT 3.1 brokers are only required to accept 23
/// characters; 32 leaves room for longer ids on brokers that allow them.
pub type ClientId = heapless::String<32>;

/// Version reported when the build does not set `OTA_FIRMWARE_VERSION`.
pub const DEFAULT_FIRMWARE_VERSION: &str = "v0.0.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    // --- Broker ---
    pub broker_host: String,
    pub broker_port: u16,
    /// `None` connects anonymously.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Empty means "derive from the factory MAC".
    pub client_id: ClientId,
    pub use_tls: bool,
    pub keep_alive_secs: u16,

    // --- Topics ---
    /// Announcements arrive here.
    pub command_topic: String,
    /// Status reports go here when set.
    pub status_topic: Option<String>,

    // --- Identity ---
    pub current_version: VersionId,

    // --- Timing ---
    /// Wait after a failed broker connect (milliseconds).
    pub reconnect_delay_ms: u32,
    /// When non-zero, the reconnect delay doubles per failure up to this cap.
    pub reconnect_max_delay_ms: u32,
    /// Grace period between commit and restart (milliseconds).
    pub restart_delay_ms: u32,
    /// Idle wait between broker polls when no message is pending.
    pub poll_interval_ms: u32,

    // --- Network ---
    pub wifi_ssid: String,
    pub wifi_password: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let mut client_id = ClientId::new();
        let _ = client_id.push_str("esp32-s3");
        Self {
            broker_host: String::new(),
            broker_port: 8883,
            username: None,
            password: None,
            client_id,
            use_tls: true,
            keep_alive_secs: 15,

            command_topic: "device/ota".into(),
            status_topic: None,

            current_version: VersionId::from(DEFAULT_FIRMWARE_VERSION),

            reconnect_delay_ms: 3000,
            reconnect_max_delay_ms: 0,
            restart_delay_ms: 1500,
            poll_interval_ms: 10,

            wifi_ssid: String::new(),
            wifi_password: String::new(),
        }
    }
}

/// Configuration rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    Parse,
    /// A required text field is empty.
    Empty(&'static str),
    /// A numeric field is outside its allowed range.
    OutOfRange(&'static str),
    /// A topic contains an MQTT wildcard (`+` or `#`).
    WildcardTopic(&'static str),
    /// The client id does not fit the fixed buffer.
    ClientIdTooLong(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "config is not valid JSON"),
            Self::Empty(field) => write!(f, "'{field}' must not be empty"),
            Self::OutOfRange(field) => write!(f, "'{field}' is out of range"),
            Self::WildcardTopic(field) => write!(f, "'{field}' must not contain wildcards"),
            Self::ClientIdTooLong(len) => {
                write!(f, "client id of {len} chars exceeds {}", ClientId::new().capacity())
            }
        }
    }
}

/// Treat empty build variables as unset.
fn non_empty(value: Option<&'static str>) -> Option<&'static str> {
    value.filter(|v| !v.is_empty())
}

impl AgentConfig {
    /// Build the configuration from `OTA_*` variables captured at compile
    /// time. Unset variables keep their defaults.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        let mut c = Self::default();

        if let Some(host) = non_empty(option_env!("OTA_MQTT_HOST")) {
            c.broker_host = host.into();
        }
        if let Some(port) = non_empty(option_env!("OTA_MQTT_PORT")) {
            c.broker_port = port
                .parse()
                .map_err(|_| ConfigError::OutOfRange("broker_port"))?;
        }
        c.username = non_empty(option_env!("OTA_MQTT_USER")).map(String::from);
        c.password = non_empty(option_env!("OTA_MQTT_PASS")).map(String::from);
        if let Some(id) = non_empty(option_env!("OTA_MQTT_CLIENT_ID")) {
            c.client_id = ClientId::try_from(id).map_err(|()| ConfigError::ClientIdTooLong(id.len()))?;
        }
        if let Some(topic) = non_empty(option_env!("OTA_MQTT_TOPIC_IN")) {
            c.command_topic = topic.into();
        }
        c.status_topic = non_empty(option_env!("OTA_MQTT_TOPIC_OUT")).map(String::from);
        if let Some(version) = non_empty(option_env!("OTA_FIRMWARE_VERSION")) {
            c.current_version = VersionId::from(version);
        }
        if let Some(ssid) = non_empty(option_env!("OTA_WIFI_SSID")) {
            c.wifi_ssid = ssid.into();
        }
        if let Some(pass) = non_empty(option_env!("OTA_WIFI_PASS")) {
            c.wifi_password = pass.into();
        }

        c.validate()?;
        Ok(c)
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut c: Self = serde_json::from_str(json).map_err(|_| ConfigError::Parse)?;
        // An empty username is the "anonymous" spelling in provisioning files.
        if c.username.as_deref() == Some("") {
            c.username = None;
            c.password = None;
        }
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_host.is_empty() {
            return Err(ConfigError::Empty("broker_host"));
        }
        if self.broker_port == 0 {
            return Err(ConfigError::OutOfRange("broker_port"));
        }
        if self.command_topic.is_empty() {
            return Err(ConfigError::Empty("command_topic"));
        }
        if has_wildcard(&self.command_topic) {
            return Err(ConfigError::WildcardTopic("command_topic"));
        }
        if let Some(topic) = &self.status_topic {
            if topic.is_empty() {
                return Err(ConfigError::Empty("status_topic"));
            }
            if has_wildcard(topic) {
                return Err(ConfigError::WildcardTopic("status_topic"));
            }
        }
        if self.current_version.is_empty() {
            return Err(ConfigError::Empty("current_version"));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::OutOfRange("reconnect_delay_ms"));
        }
        if self.reconnect_max_delay_ms != 0 && self.reconnect_max_delay_ms < self.reconnect_delay_ms {
            return Err(ConfigError::OutOfRange("reconnect_max_delay_ms"));
        }
        Ok(())
    }

    /// Session options, with `client_id` substituted when the configured one
    /// is empty.
    pub fn broker_options(&self, fallback_client_id: &str) -> BrokerOptions {
        let client_id = if self.client_id.is_empty() {
            fallback_client_id
        } else {
            self.client_id.as_str()
        };
        BrokerOptions {
            host: self.broker_host.clone(),
            port: self.broker_port,
            client_id: client_id.into(),
            username: self.username.clone(),
            password: self.password.clone(),
            keep_alive_secs: self.keep_alive_secs,
            use_tls: self.use_tls,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let initial = Duration::from_millis(u64::from(self.reconnect_delay_ms));
        if self.reconnect_max_delay_ms == 0 {
            ReconnectPolicy::Constant(initial)
        } else {
            ReconnectPolicy::Exponential {
                initial,
                max: Duration::from_millis(u64::from(self.reconnect_max_delay_ms)),
            }
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.restart_delay_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }
}

fn has_wildcard(topic: &str) -> bool {
    topic.contains(['+', '#'])
}
