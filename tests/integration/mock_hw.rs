//! Mock adapters for integration tests.
//!
//! Every port the scheduler drives has a recording double here, so tests
//! can assert on the full broker-side history without a radio or a real
//! MQTT server.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use envnode::app::events::AppEvent;
use envnode::app::ports::{Clock, ConnectOptions, EventSink, LinkDriver, QoS, SensorPort, SessionTransport};
use envnode::error::{ConnectReturnCode, LinkError, SensorError, TransportError};
use envnode::reading::ClimateSample;

// ── Clock ─────────────────────────────────────────────────────

/// Manually driven millisecond clock. `delay_ms` advances it.
pub struct MockClock {
    pub now: u32,
    pub slept: u64,
}

impl MockClock {
    pub fn at(now: u32) -> Self {
        Self { now, slept: 0 }
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
        self.slept += u64::from(ms);
    }
}

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink {
    pub associated: bool,
    /// An association attempt succeeds immediately when set.
    pub reachable: bool,
    pub attempts: u32,
    pub rssi: i8,
}

impl MockLink {
    pub fn reachable() -> Self {
        Self {
            associated: false,
            reachable: true,
            attempts: 0,
            rssi: -58,
        }
    }

    pub fn out_of_range() -> Self {
        Self {
            reachable: false,
            ..Self::reachable()
        }
    }
}

impl LinkDriver for MockLink {
    fn is_associated(&self) -> bool {
        self.associated
    }

    fn begin_association(&mut self) -> Result<(), LinkError> {
        self.attempts += 1;
        self.associated = self.reachable;
        Ok(())
    }

    fn rssi_dbm(&self) -> Option<i8> {
        self.associated.then_some(self.rssi)
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Session transport backed by an in-memory broker with last-will
/// semantics: an unclean drop publishes the registered will.
#[derive(Default)]
pub struct MockBroker {
    pub connected: bool,
    /// Will armed for the current session; taken when it fires.
    pub will: Option<Delivered>,
    pub registered_will: Option<Delivered>,
    /// Sessions opened, by us or by the transport itself.
    pub epoch: u32,
    pub log: Vec<Delivered>,
    pub retained: HashMap<String, Vec<u8>>,
    pub subscriptions: Vec<String>,
    pub inbox: VecDeque<(String, Vec<u8>)>,
    pub connects: u32,
    pub last_client_id: String,
    pub last_username: Option<String>,
    pub last_keep_alive_secs: u16,
    /// Refuse this many connects before accepting.
    pub refuse_next: u32,
    pub refuse_with: Option<ConnectReturnCode>,
    /// Fail this many publishes before accepting.
    pub fail_publishes: u32,
}

impl MockBroker {
    fn deliver(&mut self, msg: Delivered) {
        if msg.retain {
            self.retained.insert(msg.topic.clone(), msg.payload.clone());
        }
        self.log.push(msg);
    }

    /// Connection dies without DISCONNECT.
    pub fn drop_unclean(&mut self) {
        self.connected = false;
        if let Some(will) = self.will.take() {
            self.deliver(will);
        }
    }

    /// Transport-side auto reconnect: a new session with the same will,
    /// opened without going through `connect`.
    pub fn reconnect_on_its_own(&mut self) {
        self.connected = true;
        self.will = self.registered_will.clone();
        self.epoch += 1;
    }

    pub fn on_topic(&self, topic: &str) -> Vec<&Delivered> {
        self.log.iter().filter(|m| m.topic == topic).collect()
    }
}

impl SessionTransport for MockBroker {
    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), ConnectReturnCode> {
        self.connects += 1;
        self.last_client_id = options.client_id.into();
        self.last_username = options.username.map(str::to_owned);
        self.last_keep_alive_secs = options.keep_alive_secs;
        if self.refuse_next > 0 {
            self.refuse_next -= 1;
            return Err(self.refuse_with.unwrap_or(ConnectReturnCode::ServerUnavailable));
        }
        self.registered_will = Some(Delivered {
            topic: options.will.topic.into(),
            payload: options.will.payload.to_vec(),
            qos: options.will.qos,
            retain: options.will.retain,
        });
        self.will = self.registered_will.clone();
        self.connected = true;
        self.epoch += 1;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.fail_publishes > 0 {
            self.fail_publishes -= 1;
            return Err(TransportError::BufferFull);
        }
        self.deliver(Delivered {
            topic: topic.into(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        while let Some((t, p)) = self.inbox.pop_front() {
            on_message(&t, &p);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn session_epoch(&self) -> u32 {
        self.epoch
    }
}

// ── Sensors ───────────────────────────────────────────────────

pub struct MockSensors {
    pub climate: Result<ClimateSample, SensorError>,
    pub motion: bool,
    pub soil_raw: u16,
    pub reads: u32,
}

impl Default for MockSensors {
    fn default() -> Self {
        Self {
            climate: Ok(ClimateSample {
                temperature_c: 22.5,
                humidity_pct: 41.0,
            }),
            motion: false,
            soil_raw: 2100,
            reads: 0,
        }
    }
}

impl SensorPort for MockSensors {
    fn read_climate(&mut self) -> Result<ClimateSample, SensorError> {
        self.reads += 1;
        self.climate
    }

    fn read_motion(&mut self) -> bool {
        self.motion
    }

    fn read_soil_raw(&mut self) -> u16 {
        self.soil_raw
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
