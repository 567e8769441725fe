// ── Sensor sources ──
//
// Common surface of the live monitor and the simulated source, so the
// presentation layer can render either one.

use std::sync::Arc;

use crate::command::CommandOutcome;
use crate::model::ConnectionState;
use crate::store::SensorStore;
use crate::stream::ViewStream;

/// Something that produces sensor events into a [`SensorStore`].
pub trait SensorSource: Send + Sync {
    /// The store this source feeds.
    fn store(&self) -> &Arc<SensorStore>;

    /// Subscribe to the source's connection state.
    fn connection_state(&self) -> ViewStream<ConnectionState>;

    /// Ask the device to deactivate its alarm.
    fn deactivate(&self) -> CommandOutcome;

    /// Drain warnings raised since the last call.
    fn take_warnings(&self) -> Vec<String>;

    /// Human-readable description, e.g. the endpoint URL.
    fn description(&self) -> &str;
}
