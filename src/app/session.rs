//! Session manager: broker session on top of the link.
//!
//! ```text
//!  Disconnected ──connect──▶ Connecting ──accepted──▶ Connected
//!       ▲                        │                        │
//!       └──────── refused ───────┘◀── transport reports ──┘
//!                                       session loss
//! ```
//!
//! Every connect registers `offline` as the last-will on the presence
//! topic; every establishment is followed by an explicit retained
//! `online`. Until that announcement has gone out, readings are refused so
//! that a subscriber never sees a reading before the presence flip.

use log::{debug, info, warn};

use crate::error::SessionError;
use crate::topics::{PRESENCE_OFFLINE, PRESENCE_ONLINE, Topics};

use super::ports::{Clock, ConnectOptions, InboundHandler, QoS, SessionTransport, Will};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Identity and protocol parameters for every session attempt.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u16,
    pub connect_timeout_ms: u32,
    pub topics: Topics,
    pub subscribe_commands: bool,
}

/// Default inbound handler: log and ignore.
#[derive(Debug, Default)]
pub struct LogInboundHandler;

impl InboundHandler for LogInboundHandler {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        info!(
            "MQTT: inbound on {} ({} bytes): {}",
            topic,
            payload.len(),
            String::from_utf8_lossy(payload)
        );
    }
}

pub struct SessionManager<T: SessionTransport, H: InboundHandler = LogInboundHandler> {
    transport: T,
    handler: H,
    settings: SessionSettings,
    state: SessionState,
    presence_pending: bool,
    established: u32,
    /// Transport epoch of the session we last announced on.
    epoch: u32,
}

impl<T: SessionTransport> SessionManager<T> {
    pub fn new(transport: T, settings: SessionSettings) -> Self {
        Self::with_handler(transport, settings, LogInboundHandler)
    }
}

impl<T: SessionTransport, H: InboundHandler> SessionManager<T, H> {
    pub fn with_handler(transport: T, settings: SessionSettings, handler: H) -> Self {
        Self {
            transport,
            handler,
            settings,
            state: SessionState::Disconnected,
            presence_pending: false,
            established: 0,
            epoch: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn topics(&self) -> &Topics {
        &self.settings.topics
    }

    /// Session is up but `online` has not been delivered yet.
    pub fn presence_pending(&self) -> bool {
        self.presence_pending
    }

    /// Sessions established since boot.
    pub fn sessions_established(&self) -> u32 {
        self.established
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    // ── Establishment ─────────────────────────────────────────

    /// One session attempt, with the last-will registered.
    ///
    /// On success the retained `online` is published before returning.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::Connecting;
        let s = &self.settings;
        let options = ConnectOptions {
            client_id: &s.client_id,
            username: s.username.as_deref(),
            password: s.password.as_deref(),
            keep_alive_secs: s.keep_alive_secs,
            timeout_ms: s.connect_timeout_ms,
            will: Will {
                topic: &s.topics.presence,
                payload: PRESENCE_OFFLINE,
                qos: QoS::AtLeastOnce,
                retain: true,
            },
        };
        info!("MQTT: connecting as {}", s.client_id);

        match self.transport.connect(&options) {
            Ok(()) => {
                self.on_established();
                Ok(())
            }
            Err(rc) => {
                warn!("MQTT: connect failed: {}", rc);
                self.state = SessionState::Disconnected;
                Err(SessionError::Refused(rc))
            }
        }
    }

    fn on_established(&mut self) {
        self.state = SessionState::Connected;
        self.epoch = self.transport.session_epoch();
        self.established = self.established.wrapping_add(1);
        info!("MQTT: session established (#{})", self.established);
        self.presence_pending = true;
        self.announce_presence();

        if self.settings.subscribe_commands {
            let topic = &self.settings.topics.command;
            match self.transport.subscribe(topic, QoS::AtMostOnce) {
                Ok(()) => info!("MQTT: subscribed to {}", topic),
                Err(e) => warn!("MQTT: subscribe to {} failed: {}", topic, e),
            }
        }
    }

    fn announce_presence(&mut self) {
        let topic = &self.settings.topics.presence;
        match self.transport.publish(topic, PRESENCE_ONLINE, QoS::AtLeastOnce, true) {
            Ok(()) => {
                info!("MQTT: presence online on {}", topic);
                self.presence_pending = false;
            }
            Err(e) => warn!("MQTT: presence announcement failed: {}", e),
        }
    }

    /// Make sure a session is up, retrying up to `max_attempts` times with
    /// `retry_delay_ms` between attempts. Gives up for this tick after the
    /// last attempt; there is no delay after it.
    pub fn ensure_connected(
        &mut self,
        link_up: bool,
        max_attempts: u8,
        retry_delay_ms: u32,
        clock: &mut impl Clock,
    ) -> Result<(), SessionError> {
        self.check_alive();
        if self.state == SessionState::Connected {
            return Ok(());
        }
        if !link_up {
            return Err(SessionError::LinkDown);
        }
        // Transports with their own reconnect logic may already be back.
        if self.transport.is_connected() {
            self.on_established();
            return Ok(());
        }

        let mut last = SessionError::NotConnected;
        for attempt in 1..=max_attempts {
            match self.connect() {
                Ok(()) => return Ok(()),
                Err(e) => last = e,
            }
            if attempt < max_attempts {
                debug!("MQTT: retry {}/{} in {} ms", attempt, max_attempts, retry_delay_ms);
                clock.delay_ms(retry_delay_ms);
            }
        }
        warn!("MQTT: giving up after {} attempts, retry next tick", max_attempts);
        Err(last)
    }

    fn check_alive(&mut self) {
        if self.state != SessionState::Connected {
            return;
        }
        if !self.transport.is_connected() {
            warn!("MQTT: session lost");
            self.state = SessionState::Disconnected;
            self.presence_pending = false;
        } else if self.transport.session_epoch() != self.epoch {
            // Lost and re-opened behind our back; the broker has already
            // fired the will.
            warn!("MQTT: session replaced by transport, re-announcing");
            self.on_established();
        }
    }

    // ── Traffic ───────────────────────────────────────────────

    /// Send one message at QoS 0. Failures are returned, never retried here.
    pub fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        self.ready()?;
        self.transport
            .publish(topic, payload, QoS::AtMostOnce, retain)
            .map_err(SessionError::from)
    }

    /// [`publish`](Self::publish) on the reading topic, not retained.
    pub fn publish_reading(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        self.ready()?;
        self.transport
            .publish(&self.settings.topics.reading, payload, QoS::AtMostOnce, false)
            .map_err(SessionError::from)
    }

    fn ready(&self) -> Result<(), SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        if self.presence_pending {
            return Err(SessionError::PresencePending);
        }
        Ok(())
    }

    /// Per-tick housekeeping: drive the transport, deliver inbound
    /// messages, detect loss, retry a pending presence announcement.
    pub fn service(&mut self) {
        let handler = &mut self.handler;
        self.transport
            .poll(&mut |topic: &str, payload: &[u8]| handler.on_message(topic, payload));

        self.check_alive();
        if self.state == SessionState::Connected && self.presence_pending {
            self.announce_presence();
        }
    }
}
