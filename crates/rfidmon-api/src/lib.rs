//! Transport layer for RFID access/alarm sensors.
//!
//! - [`wire`]: the JSON frames the sensor firmware sends and accepts, with
//!   schema validation at the parse boundary.
//! - [`websocket`]: [`ConnectionManager`], which owns the socket, its
//!   [`ConnectionState`], and the reconnect loop.
//!
//! `rfidmon-core` builds the domain model and derived views on top.

pub mod error;
pub mod websocket;
pub mod wire;

pub use error::Error;
pub use websocket::{
    Backoff, ConnectionManager, ConnectionState, ReconnectConfig, TransportEvent,
};
pub use wire::{DeviceCommand, ReceivedFrame, SensorFrame, parse_frame};
