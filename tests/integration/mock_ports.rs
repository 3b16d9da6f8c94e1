//! Mock port adapters for integration tests.
//!
//! Record every call so tests can assert on the full history without
//! touching flash, sockets or the chip.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use ota_agent::app::events::AgentEvent;
use ota_agent::app::ports::{
    BrokerError, BrokerEvent, BrokerPort, ChannelError, ChannelResponse, Delay, EventSink,
    ImageStream, NetworkStatus, PartitionError, SecureChannelFactory, StreamError, SystemControl,
    UpdatePartition,
};
use ota_agent::broker::BrokerOptions;
use ota_agent::fsm::UpdateState;

pub const RUNNING_IMAGE: &[u8] = b"running-image-v0.0.1";

/// `len` bytes starting with the ESP image magic.
pub fn firmware(len: usize) -> Vec<u8> {
    let mut img: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
    if let Some(first) = img.first_mut() {
        *first = 0xE9;
    }
    img
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AgentEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<UpdateState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::WriteProgress { written, .. } => Some(*written),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, event: &AgentEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AgentEvent) {
        self.events.push(event.clone());
    }
}

// ── Secure channel ────────────────────────────────────────────

#[derive(Clone)]
pub struct MockResource {
    pub status: u16,
    pub declared: Option<i64>,
    pub body: Vec<u8>,
    /// Largest slice a single read returns.
    pub max_read: usize,
    /// Fail the read that reaches this offset.
    pub fail_at: Option<usize>,
}

impl MockResource {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            declared: Some(body.len() as i64),
            body,
            max_read: 1000,
            fail_at: None,
        }
    }
}

struct MockBody {
    res: MockResource,
    pos: usize,
    live: Rc<Cell<i32>>,
}

impl ImageStream for MockBody {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let n = buf
            .len()
            .min(self.res.max_read)
            .min(self.res.body.len() - self.pos);
        if self.res.fail_at.is_some_and(|at| self.pos + n >= at && n > 0) {
            return Err(StreamError::Io);
        }
        buf[..n].copy_from_slice(&self.res.body[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for MockBody {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Default)]
pub struct MockChannel {
    routes: HashMap<String, MockResource>,
    pub opened: Vec<String>,
    live: Rc<Cell<i32>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(url: &str, res: MockResource) -> Self {
        let mut ch = Self::new();
        ch.routes.insert(url.to_owned(), res);
        ch
    }

    pub fn live_connections(&self) -> i32 {
        self.live.get()
    }
}

impl SecureChannelFactory for MockChannel {
    fn open(&mut self, url: &str) -> Result<ChannelResponse, ChannelError> {
        self.opened.push(url.to_owned());
        let res = self.routes.get(url).cloned().ok_or(ChannelError::Connect)?;
        self.live.set(self.live.get() + 1);
        Ok(ChannelResponse {
            status: res.status,
            content_length: res.declared,
            body: Box::new(MockBody {
                res,
                pos: 0,
                live: Rc::clone(&self.live),
            }),
        })
    }
}

// ── Update partition ──────────────────────────────────────────

pub struct MockPartition {
    pub capacity: u64,
    pub boot: Vec<u8>,
    pub staged: Vec<u8>,
    pub writing: bool,
    pub begins: u32,
    pub aborts: u32,
    /// `begin` calls made while a write was still open.
    pub overlapping_begins: u32,
    pub fail_write_after: Option<usize>,
    pub fail_complete: bool,
}

impl MockPartition {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            boot: RUNNING_IMAGE.to_vec(),
            staged: Vec::new(),
            writing: false,
            begins: 0,
            aborts: 0,
            overlapping_begins: 0,
            fail_write_after: None,
            fail_complete: false,
        }
    }

    pub fn boot_unchanged(&self) -> bool {
        self.boot == RUNNING_IMAGE
    }
}

impl UpdatePartition for MockPartition {
    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn begin(&mut self, _image_len: u64) -> Result<(), PartitionError> {
        if self.writing {
            self.overlapping_begins += 1;
        }
        self.begins += 1;
        self.writing = true;
        self.staged.clear();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), PartitionError> {
        if self
            .fail_write_after
            .is_some_and(|at| self.staged.len() + data.len() > at)
        {
            return Err(PartitionError::Io);
        }
        self.staged.extend_from_slice(data);
        Ok(())
    }

    fn complete(&mut self) -> Result<(), PartitionError> {
        self.writing = false;
        if self.fail_complete {
            Err(PartitionError::Validation)
        } else {
            Ok(())
        }
    }

    fn set_boot(&mut self) -> Result<(), PartitionError> {
        self.boot = std::mem::take(&mut self.staged);
        Ok(())
    }

    fn abort(&mut self) {
        self.aborts += 1;
        self.writing = false;
        self.staged.clear();
    }
}

// ── System control ────────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub restarts: u32,
}

impl SystemControl for MockSystem {
    fn restart(&mut self) {
        self.restarts += 1;
    }
}

// ── Broker, network, time ─────────────────────────────────────

#[derive(Default)]
pub struct MockBroker {
    pub connect_results: VecDeque<Result<(), BrokerError>>,
    pub events: VecDeque<BrokerEvent>,
    pub connects: u32,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub connected: bool,
}

impl MockBroker {
    pub fn failing(times: usize, code: i32) -> Self {
        let mut b = Self::default();
        b.connect_results
            .extend(std::iter::repeat_n(Err(BrokerError::Refused(code)), times));
        b
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self, _options: &BrokerOptions) -> Result<(), BrokerError> {
        self.connects += 1;
        let r = self.connect_results.pop_front().unwrap_or(Ok(()));
        self.connected = r.is_ok();
        r
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self) -> Option<BrokerEvent> {
        let ev = self.events.pop_front()?;
        if ev == BrokerEvent::Disconnected {
            self.connected = false;
        }
        Some(ev)
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[derive(Clone)]
pub struct MockNetwork(pub Rc<Cell<bool>>);

impl MockNetwork {
    pub fn up() -> Self {
        Self(Rc::new(Cell::new(true)))
    }
}

impl NetworkStatus for MockNetwork {
    fn is_up(&self) -> bool {
        self.0.get()
    }
}

#[derive(Default)]
pub struct MockDelay {
    pub waits: Vec<Duration>,
}

impl Delay for MockDelay {
    fn delay(&mut self, duration: Duration) {
        self.waits.push(duration);
    }
}

pub fn broker_options() -> BrokerOptions {
    BrokerOptions {
        host: "broker.local".into(),
        port: 8883,
        client_id: "esp32-s3".into(),
        username: Some("device".into()),
        password: Some("secret".into()),
        keep_alive_secs: 15,
        use_tls: true,
    }
}
