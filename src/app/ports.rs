//! Port traits: the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Link/Session managers, Sampler, Scheduler
//! ```
//!
//! Every port is synchronous. Blocking is allowed only where the method
//! documents its own bound; nothing here may block indefinitely.

use crate::error::{ConnectReturnCode, LinkError, SensorError, TransportError};
use crate::reading::ClimateSample;

// ───────────────────────────────────────────────────────────────
// Clock (monotonic, wrapping)
// ───────────────────────────────────────────────────────────────

/// Millisecond clock and delay.
///
/// `now_ms` wraps at `u32::MAX` (about 49.7 days); callers compare
/// timestamps with `wrapping_sub` only.
pub trait Clock {
    fn now_ms(&self) -> u32;

    /// Block the whole node for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Wireless link driver
// ───────────────────────────────────────────────────────────────

/// Station-mode radio driver. Owns association and signal telemetry.
pub trait LinkDriver {
    /// Associated with an AP and holding an IP address. Non-blocking.
    fn is_associated(&self) -> bool;

    /// Start an association attempt and return immediately. Progress is
    /// observed through [`is_associated`](Self::is_associated).
    fn begin_association(&mut self) -> Result<(), LinkError>;

    /// Received signal strength of the current AP, if associated.
    fn rssi_dbm(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Message transport session
// ───────────────────────────────────────────────────────────────

/// Delivery guarantee requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
}

/// Message the broker publishes on our behalf if the session dies uncleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Will<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
}

/// Everything a transport needs to open a session.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions<'a> {
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub keep_alive_secs: u16,
    /// Bound for the handshake; the transport gives up with
    /// [`ConnectReturnCode::Timeout`] after this long.
    pub timeout_ms: u32,
    pub will: Will<'a>,
}

/// Publish/subscribe session over the link.
pub trait SessionTransport {
    /// Open a session, registering `options.will` with the broker.
    /// Blocks up to `options.timeout_ms`.
    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), ConnectReturnCode>;

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), TransportError>;

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), TransportError>;

    /// Protocol housekeeping: keep-alive, inbound delivery. Every inbound
    /// message received since the last call is passed to `on_message`.
    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8]));

    /// Session currently open. Non-blocking.
    fn is_connected(&self) -> bool;

    /// Bumped on every session the transport opens, including ones it
    /// re-opened on its own between two calls. Transports that never
    /// reconnect by themselves can keep the default.
    fn session_epoch(&self) -> u32 {
        0
    }
}

/// Receives inbound session messages.
pub trait InboundHandler {
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → core)
// ───────────────────────────────────────────────────────────────

/// Read-side port over the four physical channels.
pub trait SensorPort {
    /// Combined temperature/humidity read. Bounded by the driver's own
    /// bus timeout.
    fn read_climate(&mut self) -> Result<ClimateSample, SensorError>;

    /// Instantaneous motion level.
    fn read_motion(&mut self) -> bool;

    /// Raw soil ADC count.
    fn read_soil_raw(&mut self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: core → logging)
// ───────────────────────────────────────────────────────────────

/// The scheduler emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
