// ── Reactive sensor store ──
//
// Append-only event storage with push-based change notification.

mod journal;
mod sensor_store;

pub use sensor_store::{Retention, SensorStore};
