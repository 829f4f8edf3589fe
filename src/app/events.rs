//! Outbound application events.
//!
//! The [`PublishScheduler`](crate::scheduler::PublishScheduler) emits these
//! through the [`EventSink`](super::ports::EventSink) port during each tick.
//! They are diagnostics only; nothing in the core reacts to them.

use crate::error::{EncodeError, SensorError, SessionError};

use super::link::LinkState;
use super::session::SessionState;

/// Structured events emitted by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Link manager changed state.
    LinkChanged { from: LinkState, to: LinkState },

    /// Session manager changed state.
    SessionChanged { from: SessionState, to: SessionState },

    /// A new broker session was established (count since boot).
    SessionEstablished { count: u32 },

    /// The climate sensor faulted; the reading goes out without climate.
    SensorFault(SensorError),

    /// A reading was handed to the transport.
    ReadingPublished { seq: u32, bytes: usize },

    /// A reading could not be delivered; it is dropped.
    PublishFailed { seq: u32, reason: SessionError },

    /// A reading could not be serialised; it is dropped.
    EncodeFailed { seq: u32, reason: EncodeError },
}
