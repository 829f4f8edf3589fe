//! Application core: connectivity upkeep and sampling, zero I/O.
//!
//! The link and session managers own the two connection state machines;
//! the sampler owns sensor acquisition. All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without a radio, broker or sensors.

pub mod events;
pub mod link;
pub mod ports;
pub mod sampler;
pub mod session;
