//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`].
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` in callback mode. The
//!   callback runs on the ESP-IDF MQTT task and only forwards events into an
//!   `mpsc` channel; everything else happens on the agent loop when it calls
//!   `connect` or `poll`. A dropped session drops the client, so the
//!   connectivity manager stays the single owner of reconnect timing.
//! - **`not(target_os = "espidf")`**: a scripted broker: connect results
//!   are queued up front, messages are injected by the test, and
//!   subscriptions and publishes are recorded.

use core::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::{BrokerError, BrokerEvent, BrokerPort};
use crate::broker::BrokerOptions;

/// How long `connect` waits for the broker's CONNACK.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use super::*;

    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};

    use esp_idf_svc::mqtt::client::{
        Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
    };

    /// Events forwarded from the MQTT task.
    enum Inbound {
        Connected,
        Disconnected,
        Message { topic: String, payload: Vec<u8> },
        Error(i32),
    }

    pub struct MqttBroker {
        client: Option<EspMqttClient<'static>>,
        events: Option<Receiver<Inbound>>,
    }

    impl MqttBroker {
        pub fn new() -> Self {
            Self {
                client: None,
                events: None,
            }
        }

        fn drop_session(&mut self) {
            self.client = None;
            self.events = None;
        }
    }

    impl Default for MqttBroker {
        fn default() -> Self {
            Self::new()
        }
    }

    impl BrokerPort for MqttBroker {
        fn connect(&mut self, options: &BrokerOptions) -> Result<(), BrokerError> {
            self.drop_session();

            let conf = MqttClientConfiguration {
                client_id: Some(&options.client_id),
                username: options.username.as_deref(),
                password: options.password.as_deref(),
                keep_alive_interval: Some(Duration::from_secs(u64::from(options.keep_alive_secs))),
                crt_bundle_attach: if options.use_tls {
                    Some(esp_idf_svc::sys::esp_crt_bundle_attach)
                } else {
                    None
                },
                buffer_size: 4096,
                ..Default::default()
            };

            let (tx, rx) = mpsc::channel();
            let client = EspMqttClient::new_cb(&options.url(), &conf, move |event| {
                let inbound = match event.payload() {
                    EventPayload::Connected(_) => Inbound::Connected,
                    EventPayload::Disconnected => Inbound::Disconnected,
                    EventPayload::Received {
                        topic,
                        data,
                        details: Details::Complete,
                        ..
                    } => Inbound::Message {
                        topic: topic.unwrap_or_default().to_owned(),
                        payload: data.to_vec(),
                    },
                    EventPayload::Received { .. } => {
                        warn!("MQTT: dropping fragmented message");
                        return;
                    }
                    // Only the esp_err_t is exposed here, not the CONNACK code.
                    EventPayload::Error(e) => Inbound::Error(e.code()),
                    _ => return,
                };
                let _ = tx.send(inbound);
            })
            .map_err(|e| {
                warn!("MQTT: client init failed: {:?}", e);
                BrokerError::Transport
            })?;

            loop {
                match rx.recv_timeout(CONNECT_TIMEOUT) {
                    Ok(Inbound::Connected) => break,
                    Ok(Inbound::Error(code)) => return Err(BrokerError::Refused(code)),
                    Ok(Inbound::Disconnected) => return Err(BrokerError::Transport),
                    Ok(Inbound::Message { .. }) => {}
                    Err(RecvTimeoutError::Timeout) => return Err(BrokerError::Timeout),
                    Err(RecvTimeoutError::Disconnected) => return Err(BrokerError::Transport),
                }
            }

            info!("MQTT: session open as '{}'", options.client_id);
            self.client = Some(client);
            self.events = Some(rx);
            Ok(())
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
            let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
            client
                .subscribe(topic, QoS::AtMostOnce)
                .map(|_| ())
                .map_err(|e| {
                    warn!("MQTT: subscribe '{}' failed: {:?}", topic, e);
                    BrokerError::Refused(e.code())
                })
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
            let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
            client
                .publish(topic, QoS::AtMostOnce, false, payload)
                .map(|_| ())
                .map_err(|_| BrokerError::Transport)
        }

        fn poll(&mut self) -> Option<BrokerEvent> {
            loop {
                let next = self.events.as_ref()?.try_recv();
                match next {
                    Ok(Inbound::Message { topic, payload }) => {
                        return Some(BrokerEvent::Message { topic, payload });
                    }
                    Ok(Inbound::Disconnected) | Err(TryRecvError::Disconnected) => {
                        self.drop_session();
                        return Some(BrokerEvent::Disconnected);
                    }
                    Ok(Inbound::Error(code)) => debug!("MQTT: client error {}", code),
                    Ok(Inbound::Connected) => {}
                    Err(TryRecvError::Empty) => return None,
                }
            }
        }

        fn disconnect(&mut self) {
            self.drop_session();
        }
    }
}

#[cfg(target_os = "espidf")]
pub use platform::MqttBroker;

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod simulation {
    use super::*;

    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct MqttBroker {
        /// Results for upcoming `connect` calls; empty means accept.
        connect_script: VecDeque<Result<(), BrokerError>>,
        inbox: VecDeque<BrokerEvent>,
        connected: bool,
        connects: u32,
        last_options: Option<BrokerOptions>,
        subscriptions: Vec<String>,
        published: Vec<(String, Vec<u8>)>,
    }

    impl MqttBroker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script_connect(&mut self, results: impl IntoIterator<Item = Result<(), BrokerError>>) {
            self.connect_script.extend(results);
        }

        /// Queue a message for delivery on a later poll.
        pub fn inject(&mut self, topic: &str, payload: &[u8]) {
            self.inbox.push_back(BrokerEvent::Message {
                topic: topic.to_owned(),
                payload: payload.to_vec(),
            });
        }

        /// Simulate a keep-alive failure.
        pub fn drop_connection(&mut self) {
            self.inbox.push_back(BrokerEvent::Disconnected);
        }

        pub fn is_connected(&self) -> bool {
            self.connected
        }

        pub fn connects(&self) -> u32 {
            self.connects
        }

        pub fn last_options(&self) -> Option<&BrokerOptions> {
            self.last_options.as_ref()
        }

        pub fn subscriptions(&self) -> &[String] {
            &self.subscriptions
        }

        pub fn published(&self) -> &[(String, Vec<u8>)] {
            &self.published
        }

        pub fn pending(&self) -> usize {
            self.inbox.len()
        }
    }

    impl BrokerPort for MqttBroker {
        fn connect(&mut self, options: &BrokerOptions) -> Result<(), BrokerError> {
            self.connects += 1;
            self.last_options = Some(options.clone());
            let result = self.connect_script.pop_front().unwrap_or(Ok(()));
            self.connected = result.is_ok();
            if self.connected {
                info!("MQTT (simulation): connected to {}", options.url());
            }
            result
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
            if !self.connected {
                return Err(BrokerError::NotConnected);
            }
            self.subscriptions.push(topic.to_owned());
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
            if !self.connected {
                return Err(BrokerError::NotConnected);
            }
            debug!("MQTT (simulation): publish {} bytes to '{}'", payload.len(), topic);
            self.published.push((topic.to_owned(), payload.to_vec()));
            Ok(())
        }

        fn poll(&mut self) -> Option<BrokerEvent> {
            if !self.connected {
                return None;
            }
            let event = self.inbox.pop_front()?;
            if event == BrokerEvent::Disconnected {
                warn!("MQTT (simulation): connection dropped");
                self.connected = false;
            }
            Some(event)
        }

        fn disconnect(&mut self) {
            self.connected = false;
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub use simulation::MqttBroker;
