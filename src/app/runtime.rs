//! The cooperative main loop.
//!
//! One [`AgentRuntime::run_once`] = one connectivity tick, then at most one
//! update run to completion. Nothing else executes while an update is in
//! progress; messages that arrive meanwhile stay queued in the broker
//! adapter and are handled on later ticks.

use core::time::Duration;

use log::{info, warn};
use serde::Serialize;

use crate::broker::{ConnectivityManager, TickResult};
use crate::version::VersionId;

use super::ports::{
    BrokerPort, Delay, EventSink, NetworkStatus, SecureChannelFactory, SystemControl,
    UpdatePartition,
};
use super::service::{UpdateAgent, UpdateOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// A new image is committed and the restart was requested.
    Restarting,
}

/// Status document published on the status topic.
///
/// ```text
/// {"state":"failed","version":"v0.0.1","detail":"fetch: unexpected HTTP status 404"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport<'a> {
    pub state: &'static str,
    pub version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl<'a> StatusReport<'a> {
    pub fn online(version: &'a VersionId) -> Self {
        Self {
            state: "online",
            version: version.as_str(),
            detail: None,
        }
    }

    pub fn already_current(version: &'a VersionId) -> Self {
        Self {
            state: "already_current",
            version: version.as_str(),
            detail: None,
        }
    }

    pub fn failed(version: &'a VersionId, detail: String) -> Self {
        Self {
            state: "failed",
            version: version.as_str(),
            detail: Some(detail),
        }
    }
}

pub struct AgentRuntime<B, N, D, C, P, R> {
    connectivity: ConnectivityManager<B, N, D>,
    agent: UpdateAgent<C, P, R>,
    status_topic: Option<String>,
    /// Wait between polls of an idle, connected session.
    poll_interval: Duration,
}

impl<B, N, D, C, P, R> AgentRuntime<B, N, D, C, P, R>
where
    B: BrokerPort,
    N: NetworkStatus,
    D: Delay,
    C: SecureChannelFactory,
    P: UpdatePartition,
    R: SystemControl,
{
    pub fn new(
        connectivity: ConnectivityManager<B, N, D>,
        agent: UpdateAgent<C, P, R>,
        status_topic: Option<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            connectivity,
            agent,
            status_topic,
            poll_interval,
        }
    }

    pub fn connectivity(&self) -> &ConnectivityManager<B, N, D> {
        &self.connectivity
    }

    pub fn connectivity_mut(&mut self) -> &mut ConnectivityManager<B, N, D> {
        &mut self.connectivity
    }

    pub fn agent(&self) -> &UpdateAgent<C, P, R> {
        &self.agent
    }

    /// One tick of the loop.
    pub fn run_once(&mut self, sink: &mut (impl EventSink + ?Sized)) -> RunState {
        if self.agent.is_halted() {
            return RunState::Restarting;
        }

        match self.connectivity.tick(sink) {
            TickResult::Connected => {
                let report = StatusReport::online(self.agent.current_version());
                let bytes = encode_report(&report);
                self.publish_status(bytes);
            }
            TickResult::Message(msg) => {
                let outcome = self.agent.handle_message(&msg.payload, sink);
                let bytes = match &outcome {
                    UpdateOutcome::Restarting(_) => return RunState::Restarting,
                    UpdateOutcome::Ignored => None,
                    UpdateOutcome::AlreadyCurrent(v) => {
                        encode_report(&StatusReport::already_current(v))
                    }
                    UpdateOutcome::Rejected { error, .. } => encode_report(&StatusReport::failed(
                        self.agent.current_version(),
                        error.to_string(),
                    )),
                };
                self.publish_status(bytes);
            }
            TickResult::Idle => {
                if self.connectivity.is_connected() {
                    let wait = self.poll_interval;
                    self.connectivity.delay_mut().delay(wait);
                }
            }
            TickResult::Disconnected => {}
        }

        RunState::Running
    }

    /// Loop until an update commits.
    pub fn run(&mut self, sink: &mut (impl EventSink + ?Sized)) {
        info!("OTA agent loop started");
        while self.run_once(sink) == RunState::Running {}
        info!("OTA agent loop finished: restart requested");
    }

    fn publish_status(&mut self, bytes: Option<Vec<u8>>) {
        let (Some(topic), Some(bytes)) = (self.status_topic.as_deref(), bytes) else {
            return;
        };
        // Status is best effort; the connectivity manager logs failures.
        let _ = self.connectivity.publish(topic, &bytes);
    }
}

fn encode_report(report: &StatusReport<'_>) -> Option<Vec<u8>> {
    serde_json::to_vec(report)
        .inspect_err(|e| warn!("status report encode failed: {}", e))
        .ok()
}
