//! MQTT session adapter.
//!
//! Implements [`SessionTransport`] over the ESP-IDF MQTT client.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//!   The client runs its own task; events land in a shared inbox and a
//!   connection flag that [`poll`](SessionTransport::poll) and
//!   [`is_connected`](SessionTransport::is_connected) read.
//! - **all other targets**: an in-process broker simulation with retained
//!   messages and last-will delivery, for host-side tests.

use log::{info, warn};

use crate::app::ports::{ConnectOptions, QoS, SessionTransport};
use crate::error::{ConnectReturnCode, TransportError};

/// Inbound messages buffered between two polls.
const INBOX_CAPACITY: usize = 8;

#[cfg(any(target_os = "espidf", test))]
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

#[cfg(target_os = "espidf")]
use std::{sync::Arc, time::Duration};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration,
    QoS as EspQoS,
};

/// Poll step while waiting for the CONNACK.
#[cfg(any(target_os = "espidf", test))]
const HANDSHAKE_STEP_MS: u32 = 50;

#[cfg(target_os = "espidf")]
fn esp_qos(qos: QoS) -> EspQoS {
    match qos {
        QoS::AtMostOnce => EspQoS::AtMostOnce,
        QoS::AtLeastOnce => EspQoS::AtLeastOnce,
    }
}

/// State written by the client's event task and read by the adapter.
#[cfg(any(target_os = "espidf", test))]
#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    epoch: AtomicU32,
    /// First failure seen since the current handshake started.
    failure: Mutex<Option<ConnectReturnCode>>,
    inbox: Mutex<VecDeque<(String, Vec<u8>)>>,
}

#[cfg(any(target_os = "espidf", test))]
impl Shared {
    fn reset(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Ok(mut f) = self.failure.lock() {
            *f = None;
        }
    }

    fn on_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn on_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.record(ConnectReturnCode::ConnectionLost);
    }

    fn on_error(&self) {
        self.record(ConnectReturnCode::NetworkError);
    }

    fn record(&self, rc: ConnectReturnCode) {
        if let Ok(mut f) = self.failure.lock() {
            f.get_or_insert(rc);
        }
    }

    fn take_failure(&self) -> Option<ConnectReturnCode> {
        self.failure.lock().ok().and_then(|mut f| f.take())
    }

    fn push_inbound(&self, topic: &str, data: &[u8]) {
        if let Ok(mut inbox) = self.inbox.lock() {
            if inbox.len() < INBOX_CAPACITY {
                inbox.push_back((topic.to_owned(), data.to_vec()));
            }
        }
    }
}

/// Wait for the handshake to finish. Returns early on an error or a
/// disconnect reported by the event task, else gives up after `timeout_ms`.
#[cfg(any(target_os = "espidf", test))]
fn await_session(shared: &Shared, timeout_ms: u32, mut delay: impl FnMut(u32)) -> Result<(), ConnectReturnCode> {
    let mut waited = 0;
    loop {
        if shared.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(rc) = shared.take_failure() {
            return Err(rc);
        }
        if waited >= timeout_ms {
            return Err(ConnectReturnCode::Timeout);
        }
        delay(HANDSHAKE_STEP_MS);
        waited += HANDSHAKE_STEP_MS;
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttAdapter {
    url: String,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    shared: Arc<Shared>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

impl MqttAdapter {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            url: format!("mqtt://{}:{}", host, port),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            shared: Arc::new(Shared::default()),
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl SessionTransport for MqttAdapter {
    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), ConnectReturnCode> {
        // Dropping the old client tears its task down.
        self.client = None;
        self.shared.reset();

        let conf = MqttClientConfiguration {
            client_id: Some(options.client_id),
            username: options.username,
            password: options.password,
            keep_alive_interval: Some(Duration::from_secs(u64::from(options.keep_alive_secs))),
            network_timeout: Duration::from_millis(u64::from(options.timeout_ms)),
            // Every new session must go through the session manager so
            // that it is followed by an `online` announcement.
            disable_auto_reconnect: true,
            lwt: Some(LwtConfiguration {
                topic: options.will.topic,
                payload: options.will.payload,
                qos: esp_qos(options.will.qos),
                retain: options.will.retain,
            }),
            ..Default::default()
        };

        let shared = self.shared.clone();
        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => shared.on_connected(),
            EventPayload::Disconnected => shared.on_disconnected(),
            EventPayload::Received {
                topic: Some(topic),
                data,
                details: Details::Complete,
                ..
            } => shared.push_inbound(topic, data),
            EventPayload::Error(e) => {
                warn!("MQTT: client error: {:?}", e);
                shared.on_error();
            }
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            ConnectReturnCode::NetworkError
        })?;
        self.client = Some(client);

        match await_session(&self.shared, options.timeout_ms, esp_idf_svc::hal::delay::FreeRtos::delay_ms) {
            Ok(()) => {
                info!("MQTT: connected to {}", self.url);
                Ok(())
            }
            Err(rc) => {
                self.client = None;
                Err(rc)
            }
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .publish(topic, esp_qos(qos), retain, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to {} failed: {}", topic, e);
                TransportError::Io
            })
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .subscribe(topic, esp_qos(qos))
            .map(|_| ())
            .map_err(|_| TransportError::Io)
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        let drained: Vec<_> = match self.shared.inbox.lock() {
            Ok(mut inbox) => inbox.drain(..).collect(),
            Err(_) => return,
        };
        for (topic, payload) in drained {
            on_message(&topic, &payload);
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.shared.connected.load(Ordering::SeqCst)
    }

    fn session_epoch(&self) -> u32 {
        self.shared.epoch.load(Ordering::SeqCst)
    }
}

// ── Simulation ────────────────────────────────────────────────

/// Message as seen by the simulated broker.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimBroker {
    refuse_with: Option<ConnectReturnCode>,
    session: Option<SimMessage>,
    log: Vec<SimMessage>,
    retained: Vec<(String, Vec<u8>)>,
    subscriptions: Vec<String>,
    inbox: std::collections::VecDeque<(String, Vec<u8>)>,
    connects: u32,
    epoch: u32,
}

#[cfg(not(target_os = "espidf"))]
impl SimBroker {
    fn store(&mut self, msg: SimMessage) {
        if msg.retain {
            self.retained.retain(|(t, _)| *t != msg.topic);
            self.retained.push((msg.topic.clone(), msg.payload.clone()));
        }
        self.log.push(msg);
    }
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// Refuse every following connect with `rc`, or accept with `None`.
    pub fn sim_refuse(&mut self, rc: Option<ConnectReturnCode>) {
        self.sim.refuse_with = rc;
    }

    /// Kill the session without a DISCONNECT; the broker fires the will.
    pub fn sim_drop_unclean(&mut self) {
        if let Some(will) = self.sim.session.take() {
            info!("MQTT(sim): session dropped, delivering will on {}", will.topic);
            self.sim.store(will);
        }
    }

    /// Queue an inbound message for the next poll.
    pub fn sim_inject(&mut self, topic: &str, payload: &[u8]) {
        if self.sim.inbox.len() < INBOX_CAPACITY {
            self.sim.inbox.push_back((topic.into(), payload.to_vec()));
        }
    }

    /// Everything the broker received or generated, in order.
    pub fn sim_log(&self) -> &[SimMessage] {
        &self.sim.log
    }

    pub fn sim_retained(&self, topic: &str) -> Option<&[u8]> {
        self.sim
            .retained
            .iter()
            .find(|(t, _)| t == topic)
            .map(|(_, p)| p.as_slice())
    }

    pub fn sim_subscriptions(&self) -> &[String] {
        &self.sim.subscriptions
    }

    pub fn sim_connects(&self) -> u32 {
        self.sim.connects
    }
}

#[cfg(not(target_os = "espidf"))]
impl SessionTransport for MqttAdapter {
    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), ConnectReturnCode> {
        self.sim.connects += 1;
        if let Some(rc) = self.sim.refuse_with {
            warn!("MQTT(sim): refusing {} ({})", options.client_id, rc);
            return Err(rc);
        }
        self.sim.session = Some(SimMessage {
            topic: options.will.topic.into(),
            payload: options.will.payload.to_vec(),
            qos: options.will.qos,
            retain: options.will.retain,
        });
        self.sim.epoch = self.sim.epoch.wrapping_add(1);
        info!("MQTT(sim): {} connected to {}", options.client_id, self.url);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), TransportError> {
        if self.sim.session.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.sim.store(SimMessage {
            topic: topic.into(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), TransportError> {
        if self.sim.session.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.sim.subscriptions.push(topic.into());
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        while let Some((topic, payload)) = self.sim.inbox.pop_front() {
            on_message(&topic, &payload);
        }
    }

    fn is_connected(&self) -> bool {
        self.sim.session.is_some()
    }

    fn session_epoch(&self) -> u32 {
        self.sim.epoch
    }
}
