//! OTA Agent Firmware: Main Entry Point
//!
//! Hexagonal architecture with a single cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  MqttBroker      WifiLink        HttpsChannel   OtaPartition   │
//! │  (BrokerPort)    (NetworkStatus) (SecureChannel)(UpdatePartition)│
//! │  SystemRestart   SystemDelay     LogEventSink                  │
//! │  (SystemControl) (Delay)         (EventSink)                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  AgentRuntime = ConnectivityManager + UpdateAgent      │    │
//! │  │  decode · compare · fetch · write · commit · restart   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{anyhow, Result};
use log::info;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use ota_agent::adapters::device_id;
use ota_agent::adapters::https::HttpsChannel;
use ota_agent::adapters::log_sink::LogEventSink;
use ota_agent::adapters::mqtt::MqttBroker;
use ota_agent::adapters::partition::OtaPartition;
use ota_agent::adapters::system::SystemRestart;
use ota_agent::adapters::time::SystemDelay;
use ota_agent::adapters::wifi::WifiLink;
use ota_agent::app::runtime::AgentRuntime;
use ota_agent::app::service::UpdateAgent;
use ota_agent::broker::ConnectivityManager;
use ota_agent::config::AgentConfig;
use ota_agent::ota;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  OTA Agent v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Keep the image we just booted ──────────────────────
    ota::check_rollback();

    // ── 3. Configuration ──────────────────────────────────────
    let config = AgentConfig::from_build_env().map_err(|e| anyhow!("config: {}", e))?;
    info!(
        "Firmware {} | broker {}:{} | topic '{}'",
        config.current_version, config.broker_host, config.broker_port, config.command_topic
    );

    // ── 4. Network bootstrap ──────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = WifiLink::start(
        peripherals.modem,
        sys_loop,
        Some(nvs),
        &config.wifi_ssid,
        &config.wifi_password,
    )?;

    // ── 5. Wire adapters into the core ────────────────────────
    let fallback_id = device_id::client_id(&device_id::read_mac());
    let connectivity = ConnectivityManager::new(
        MqttBroker::new(),
        wifi,
        SystemDelay::new(),
        config.broker_options(&fallback_id),
        config.command_topic.clone(),
        config.reconnect_policy(),
    );
    let agent = UpdateAgent::new(
        config.current_version.clone(),
        HttpsChannel::new(),
        OtaPartition::new(),
        SystemRestart::new(SystemDelay::new(), config.restart_delay()),
    );
    let mut runtime = AgentRuntime::new(
        connectivity,
        agent,
        config.status_topic.clone(),
        config.poll_interval(),
    );

    // ── 6. Run until an update restarts the chip ──────────────
    let mut sink = LogEventSink::new();
    runtime.run(&mut sink);
    Ok(())
}
