//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements           | Connects to                    |
//! |-------------|----------------------|--------------------------------|
//! | `https`     | SecureChannelFactory | esp_http_client + cert bundle  |
//! | `partition` | UpdatePartition      | esp-ota inactive app slot      |
//! | `mqtt`      | BrokerPort           | esp-mqtt client                |
//! | `wifi`      | NetworkStatus        | ESP-IDF WiFi STA               |
//! | `time`      | Delay                | FreeRTOS delay                 |
//! | `system`    | SystemControl        | esp_restart                    |
//! | `log_sink`  | EventSink            | Serial log output              |
//! | `device_id` | —                    | eFuse factory MAC              |
//!
//! Every adapter also has a host simulation behind
//! `cfg(not(target_os = "espidf"))`, used by the integration tests.

pub mod device_id;
pub mod https;
pub mod log_sink;
pub mod mqtt;
pub mod partition;
pub mod system;
pub mod time;
pub mod wifi;
