//! Reactive state layer between `rfidmon-api` and presentation consumers.
//!
//! - **[`Monitor`]**: facade over a live sensor. [`start()`](Monitor::start)
//!   opens the connection and spawns the bridge that folds transport events
//!   into the store; [`shutdown()`](Monitor::shutdown) tears both down.
//!
//! - **[`SimulatedSource`]**: plays a fixed demo script into its own store,
//!   with the same [`SensorSource`] surface as the monitor.
//!
//! - **[`SensorStore`]**: the aggregator. Publishes the current event
//!   (`None` while disconnected), the edge-detected transition history, the
//!   full event log, and countdown progress through `watch` channels.
//!
//! - **[`ViewStream<T>`]**: subscription handle vended by the store.
//!   Exposes `current()` / `latest()` / `changed()` or a `Stream`.

pub mod command;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod model;
pub mod simulation;
pub mod source;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{CommandChannel, CommandOutcome};
pub use config::MonitorConfig;
pub use controller::Monitor;
pub use error::CoreError;
pub use simulation::{DemoStep, SimulatedSource};
pub use source::SensorSource;
pub use store::{Retention, SensorStore};
pub use stream::ViewStream;

pub use model::{ConnectionState, SensorEvent, SensorState, StateTransition, countdown_progress};
pub use rfidmon_api::{Backoff, ReconnectConfig};
