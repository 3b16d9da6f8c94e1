//! Messaging connectivity manager.
//!
//! ```text
//!  DISCONNECTED ──[network up, connect ok]──▶ CONNECTED ──[poll: message]──▶ deliver
//!       ▲   │                                     │
//!       │   └──[connect refused: log rc, wait]    │
//!       └────────────[broker close / keep-alive loss / network down]
//! ```
//!
//! One [`ConnectivityManager::tick`] does at most one connect attempt or one
//! poll, so the outer loop stays in control between messages. Retry is
//! unbounded; the wait after each failure comes from [`ReconnectPolicy`] and
//! goes through the [`Delay`] port.

pub mod backoff;

pub use backoff::ReconnectPolicy;

use log::{debug, info, warn};

use crate::app::events::AgentEvent;
use crate::app::ports::{BrokerError, BrokerEvent, BrokerPort, Delay, EventSink, NetworkStatus};

// ---------------------------------------------------------------------------
// Session options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u16,
    /// Connect over TLS (`mqtts://`).
    pub use_tls: bool,
}

impl BrokerOptions {
    /// Broker URI in the form the ESP-IDF MQTT client expects.
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "mqtts" } else { "mqtt" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A payload that arrived on the command topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// What a single [`ConnectivityManager::tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickResult {
    /// Nothing to hand over (no message, failed attempt, network down).
    Idle,
    /// A session was established and the command topic subscribed.
    Connected,
    Message(InboundMessage),
    /// The session dropped during this tick.
    Disconnected,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct ConnectivityManager<B, N, D> {
    broker: B,
    network: N,
    delay: D,
    options: BrokerOptions,
    topic: String,
    policy: ReconnectPolicy,
    state: ConnectionState,
    /// Consecutive failed connect attempts since the last success.
    failed_attempts: u32,
}

impl<B: BrokerPort, N: NetworkStatus, D: Delay> ConnectivityManager<B, N, D> {
    pub fn new(
        broker: B,
        network: N,
        delay: D,
        options: BrokerOptions,
        topic: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            broker,
            network,
            delay,
            options,
            topic: topic.into(),
            policy,
            state: ConnectionState::Disconnected,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Service the connection once.
    pub fn tick(&mut self, sink: &mut (impl EventSink + ?Sized)) -> TickResult {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Connecting => self.try_connect(sink),
            ConnectionState::Connected => self.service(sink),
        }
    }

    /// Publish on an arbitrary topic. Fails fast when not connected.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.broker.publish(topic, payload).inspect_err(|e| {
            warn!("MQTT: publish to '{}' failed: {}", topic, e);
        })
    }

    /// Drop the session; the next tick reconnects.
    pub fn disconnect(&mut self) {
        self.broker.disconnect();
        self.state = ConnectionState::Disconnected;
    }

    fn try_connect(&mut self, sink: &mut (impl EventSink + ?Sized)) -> TickResult {
        if !self.network.is_up() {
            debug!("MQTT: network down, skipping connect");
            sink.emit(&AgentEvent::NetworkDown);
            self.delay.delay(self.policy.delay_for(1));
            return TickResult::Idle;
        }

        self.state = ConnectionState::Connecting;
        info!("MQTT: connecting to {}", self.options.url());

        let result = self
            .broker
            .connect(&self.options)
            .and_then(|()| self.broker.subscribe(&self.topic));

        match result {
            Ok(()) => {
                let attempts = self.failed_attempts + 1;
                self.failed_attempts = 0;
                self.state = ConnectionState::Connected;
                info!("MQTT: connected, subscribed to '{}'", self.topic);
                sink.emit(&AgentEvent::BrokerConnected { attempts });
                sink.emit(&AgentEvent::Subscribed(self.topic.clone()));
                TickResult::Connected
            }
            Err(error) => {
                self.broker.disconnect();
                self.state = ConnectionState::Disconnected;
                self.failed_attempts = self.failed_attempts.saturating_add(1);
                let wait = self.policy.delay_for(self.failed_attempts);
                warn!(
                    "MQTT: connect failed ({}), retrying in {} ms",
                    error,
                    wait.as_millis()
                );
                sink.emit(&AgentEvent::BrokerConnectFailed {
                    attempt: self.failed_attempts,
                    error,
                });
                self.delay.delay(wait);
                TickResult::Idle
            }
        }
    }

    fn service(&mut self, sink: &mut (impl EventSink + ?Sized)) -> TickResult {
        if !self.network.is_up() {
            warn!("MQTT: network lost, dropping session");
            self.broker.disconnect();
            self.state = ConnectionState::Disconnected;
            sink.emit(&AgentEvent::NetworkDown);
            sink.emit(&AgentEvent::BrokerDisconnected);
            return TickResult::Disconnected;
        }

        match self.broker.poll() {
            Some(BrokerEvent::Message { topic, payload }) => {
                if topic == self.topic {
                    debug!("MQTT: {} bytes on '{}'", payload.len(), topic);
                    TickResult::Message(InboundMessage { topic, payload })
                } else {
                    debug!("MQTT: ignoring message on '{}'", topic);
                    TickResult::Idle
                }
            }
            Some(BrokerEvent::Disconnected) => {
                warn!("MQTT: connection lost");
                self.state = ConnectionState::Disconnected;
                sink.emit(&AgentEvent::BrokerDisconnected);
                TickResult::Disconnected
            }
            None => TickResult::Idle,
        }
    }
}
