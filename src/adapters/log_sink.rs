//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production), one line per event.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::LinkChanged { from, to } => {
                info!("LINK | {:?} -> {:?}", from, to);
            }
            AppEvent::SessionChanged { from, to } => {
                info!("SESSION | {:?} -> {:?}", from, to);
            }
            AppEvent::SessionEstablished { count } => {
                info!("SESSION | established #{}", count);
            }
            AppEvent::SensorFault(e) => {
                warn!("SENSOR | climate fault: {} (temperature/humidity omitted)", e);
            }
            AppEvent::ReadingPublished { seq, bytes } => {
                info!("PUB | #{} | {} bytes", seq, bytes);
            }
            AppEvent::PublishFailed { seq, reason } => {
                warn!("PUB | #{} | dropped: {}", seq, reason);
            }
            AppEvent::EncodeFailed { seq, reason } => {
                warn!("PUB | #{} | encode failed: {}", seq, reason);
            }
        }
    }
}
