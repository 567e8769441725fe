// ── Domain model ──
//
// Canonical types shared by the aggregator, the sources, and consumers.
// Pure data: no I/O, no channels.

pub mod sensor;

pub use rfidmon_api::ConnectionState;
pub use sensor::{SensorEvent, SensorState, StateTransition, countdown_progress};
