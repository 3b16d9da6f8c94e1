//! Integration tests for the connectivity manager: reconnect policy,
//! resubscription, network gating and message delivery.

use std::time::Duration;

use super::mock_ports::{broker_options, MockBroker, MockDelay, MockNetwork, RecordingSink};

use ota_agent::app::events::AgentEvent;
use ota_agent::app::ports::{BrokerError, BrokerEvent};
use ota_agent::broker::{ConnectionState, ConnectivityManager, ReconnectPolicy, TickResult};

const TOPIC: &str = "site/1/ota";

fn manager(
    broker: MockBroker,
    network: MockNetwork,
    policy: ReconnectPolicy,
) -> ConnectivityManager<MockBroker, MockNetwork, MockDelay> {
    ConnectivityManager::new(
        broker,
        network,
        MockDelay::default(),
        broker_options(),
        TOPIC,
        policy,
    )
}

fn constant_3s() -> ReconnectPolicy {
    ReconnectPolicy::Constant(Duration::from_millis(3000))
}

// ── Failures followed by one success ──────────────────────────

#[test]
fn failures_then_success_connects_and_subscribes() {
    let mut m = manager(MockBroker::failing(3, -2), MockNetwork::up(), constant_3s());
    let mut sink = RecordingSink::new();

    for _ in 0..3 {
        assert_eq!(m.tick(&mut sink), TickResult::Idle);
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }
    assert_eq!(m.tick(&mut sink), TickResult::Connected);

    assert_eq!(m.state(), ConnectionState::Connected);
    assert_eq!(m.broker().connects, 4);
    assert_eq!(m.broker().subscriptions, vec![TOPIC.to_owned()]);
    assert_eq!(m.delay_mut().waits, vec![Duration::from_millis(3000); 3]);
    assert!(sink.contains(&AgentEvent::BrokerConnectFailed {
        attempt: 3,
        error: BrokerError::Refused(-2),
    }));
    assert!(sink.contains(&AgentEvent::BrokerConnected { attempts: 4 }));
    assert_eq!(m.failed_attempts(), 0);
}

#[test]
fn exponential_policy_grows_between_attempts() {
    let policy = ReconnectPolicy::Exponential {
        initial: Duration::from_millis(1000),
        max: Duration::from_millis(3000),
    };
    let mut m = manager(MockBroker::failing(4, 5), MockNetwork::up(), policy);
    let mut sink = RecordingSink::new();
    for _ in 0..5 {
        m.tick(&mut sink);
    }
    assert!(m.is_connected());
    assert_eq!(
        m.delay_mut().waits,
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(3000),
            Duration::from_millis(3000),
        ]
    );
}

// ── Disconnect and resubscribe ────────────────────────────────

#[test]
fn lost_session_resubscribes_on_reconnect() {
    let mut m = manager(MockBroker::default(), MockNetwork::up(), constant_3s());
    let mut sink = RecordingSink::new();
    assert_eq!(m.tick(&mut sink), TickResult::Connected);

    m.broker_mut().events.push_back(BrokerEvent::Disconnected);
    assert_eq!(m.tick(&mut sink), TickResult::Disconnected);
    assert!(sink.contains(&AgentEvent::BrokerDisconnected));

    assert_eq!(m.tick(&mut sink), TickResult::Connected);
    assert_eq!(m.broker().subscriptions, vec![TOPIC.to_owned(), TOPIC.to_owned()]);
}

#[test]
fn network_outage_defers_connect_until_link_returns() {
    let network = MockNetwork::up();
    network.0.set(false);
    let mut m = manager(MockBroker::default(), network.clone(), constant_3s());
    let mut sink = RecordingSink::new();

    assert_eq!(m.tick(&mut sink), TickResult::Idle);
    assert_eq!(m.tick(&mut sink), TickResult::Idle);
    assert_eq!(m.broker().connects, 0);
    assert!(sink.contains(&AgentEvent::NetworkDown));

    network.0.set(true);
    assert_eq!(m.tick(&mut sink), TickResult::Connected);
    assert_eq!(m.broker().connects, 1);
}

#[test]
fn link_loss_while_connected_drops_session_and_withholds_messages() {
    let network = MockNetwork::up();
    let mut m = manager(MockBroker::default(), network.clone(), constant_3s());
    let mut sink = RecordingSink::new();
    assert_eq!(m.tick(&mut sink), TickResult::Connected);

    network.0.set(false);
    m.broker_mut().events.push_back(BrokerEvent::Message {
        topic: TOPIC.into(),
        payload: br#"{"version":"v1.0.0","url":"https://host/fw.bin"}"#.to_vec(),
    });
    assert_eq!(m.tick(&mut sink), TickResult::Disconnected);
    assert_eq!(m.state(), ConnectionState::Disconnected);
    assert!(!m.broker().connected);
    assert!(sink.contains(&AgentEvent::NetworkDown));
    assert!(sink.contains(&AgentEvent::BrokerDisconnected));
    assert_eq!(m.publish("site/1/out", b"{}"), Err(BrokerError::NotConnected));

    // No connect attempt while the link is still down.
    assert_eq!(m.tick(&mut sink), TickResult::Idle);
    assert_eq!(m.broker().connects, 1);

    network.0.set(true);
    assert_eq!(m.tick(&mut sink), TickResult::Connected);
    assert_eq!(m.broker().subscriptions, vec![TOPIC.to_owned(), TOPIC.to_owned()]);
}

// ── Delivery ──────────────────────────────────────────────────

#[test]
fn one_message_per_tick_in_arrival_order() {
    let mut m = manager(MockBroker::default(), MockNetwork::up(), constant_3s());
    let mut sink = RecordingSink::new();
    m.tick(&mut sink);

    for body in [b"first".as_slice(), b"second".as_slice()] {
        m.broker_mut().events.push_back(BrokerEvent::Message {
            topic: TOPIC.into(),
            payload: body.to_vec(),
        });
    }

    let TickResult::Message(first) = m.tick(&mut sink) else {
        panic!("expected first message");
    };
    assert_eq!(first.payload, b"first");
    let TickResult::Message(second) = m.tick(&mut sink) else {
        panic!("expected second message");
    };
    assert_eq!(second.payload, b"second");
    assert_eq!(m.tick(&mut sink), TickResult::Idle);
}

#[test]
fn publish_goes_through_when_connected() {
    let mut m = manager(MockBroker::default(), MockNetwork::up(), constant_3s());
    assert_eq!(m.publish("site/1/out", b"{}"), Err(BrokerError::NotConnected));
    m.tick(&mut RecordingSink::new());
    assert_eq!(m.publish("site/1/out", b"{}"), Ok(()));
    assert_eq!(m.broker().published.len(), 1);
}
