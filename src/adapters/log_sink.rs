//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured agent events to the
//! `log` facade (UART / USB-CDC on device, the test logger on host). The
//! status topic is fed separately by the runtime.

use log::{info, warn};

use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AgentEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            AgentEvent::AnnouncementReceived { version, url } => {
                info!("OTA | announcement version={} url={}", version, url);
            }
            AgentEvent::AlreadyCurrent(version) => {
                info!("OTA | already current ({})", version);
            }
            AgentEvent::UpdateStarted { from, to } => {
                info!("OTA | update {} -> {}", from, to);
            }
            AgentEvent::ImageOpened { content_length } => {
                info!("OTA | image {} bytes", content_length);
            }
            AgentEvent::WriteProgress { written, total } => {
                info!("OTA | {}% ({}/{})", written * 100 / (*total).max(1), written, total);
            }
            AgentEvent::UpdateFailed { stage, error } => {
                warn!("OTA | failed in {}: {}", stage.name(), error);
            }
            AgentEvent::UpdateCommitted(version) => {
                info!("OTA | committed {}", version);
            }
            AgentEvent::BrokerConnected { attempts } => {
                info!("MQTT | connected after {} attempt(s)", attempts);
            }
            AgentEvent::BrokerConnectFailed { attempt, error } => {
                warn!("MQTT | attempt {} failed: {}", attempt, error);
            }
            AgentEvent::BrokerDisconnected => {
                warn!("MQTT | disconnected");
            }
            AgentEvent::Subscribed(topic) => {
                info!("MQTT | subscribed '{}'", topic);
            }
            AgentEvent::NetworkDown => {
                warn!("NET | link down");
            }
        }
    }
}
