// ── Monitor abstraction ──
//
// Full lifecycle management for a live sensor: owns the connection
// manager, the store, and the bridge task that folds transport events
// into the store.

use std::sync::Arc;

use rfidmon_api::{ConnectionManager, TransportEvent};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::command::{CommandChannel, CommandOutcome};
use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{ConnectionState, SensorEvent};
use crate::source::SensorSource;
use crate::store::SensorStore;
use crate::stream::ViewStream;

// ── Monitor ──────────────────────────────────────────────────────────

/// The main entry point for watching a real sensor.
///
/// Cheaply cloneable via `Arc<MonitorInner>`.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: MonitorConfig,
    description: String,
    manager: ConnectionManager,
    store: Arc<SensorStore>,
    commands: CommandChannel,
    bridge: Mutex<Option<Bridge>>,
}

struct Bridge {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Monitor {
    /// Create a monitor from configuration. Does NOT connect; call
    /// [`start()`](Self::start) to open the link.
    pub fn new(config: MonitorConfig) -> Result<Self, CoreError> {
        let url = config.ws_url()?;
        let manager = ConnectionManager::new(url.clone(), config.reconnect.clone());
        let store = Arc::new(SensorStore::new(config.retention));

        Ok(Self {
            inner: Arc::new(MonitorInner {
                description: url.to_string(),
                commands: CommandChannel::new(manager.clone()),
                config,
                manager,
                store,
                bridge: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn url(&self) -> &Url {
        self.inner.manager.url()
    }

    /// Transport handle, for connection statistics.
    pub fn manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the bridge (once) and (re)open the connection.
    ///
    /// Calling this while already running restarts the session; the
    /// previous socket is closed first.
    pub async fn start(&self) {
        {
            let mut bridge = self.inner.bridge.lock().await;
            if bridge.is_none() {
                // Attach before connecting so no early frame is missed.
                let rx = self.inner.manager.attach();
                let cancel = CancellationToken::new();
                let task = tokio::spawn(bridge_task(
                    rx,
                    Arc::clone(&self.inner.store),
                    cancel.clone(),
                ));
                *bridge = Some(Bridge { cancel, task });
            }
        }

        self.inner.manager.connect().await;
        info!(url = %self.url(), "monitor started");
    }

    /// Close the connection and stop the bridge.
    pub async fn shutdown(&self) {
        self.inner.manager.shutdown().await;

        if let Some(bridge) = self.inner.bridge.lock().await.take() {
            bridge.cancel.cancel();
            let _ = bridge.task.await;
        }

        // The bridge may have been cancelled before it saw the final
        // disconnect notice.
        self.inner.store.clear_current();
        debug!("monitor stopped");
    }

    /// Wait until the link reaches `Connected`, or the manager goes away.
    pub async fn wait_connected(&self) -> bool {
        let mut state = self.inner.manager.state();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .is_ok()
    }

    pub fn current_connection_state(&self) -> ConnectionState {
        self.inner.manager.current_state()
    }

    /// Why the connection was abandoned, once `max_retries` is exhausted.
    pub fn failure(&self) -> Option<CoreError> {
        self.inner
            .manager
            .final_error()
            .map(|err| CoreError::from_transport(self.url(), &err))
    }

    /// Resolve once the connection manager gives up for good. Never
    /// resolves with unlimited retries.
    pub async fn wait_failure(&self) -> CoreError {
        let mut gave_up = self.inner.manager.gave_up();
        let final_error = match gave_up.wait_for(Option::is_some).await {
            Ok(err) => err.clone(),
            Err(_) => None,
        };
        match final_error {
            Some(err) => CoreError::from_transport(self.url(), &err),
            None => std::future::pending().await,
        }
    }
}

impl SensorSource for Monitor {
    fn store(&self) -> &Arc<SensorStore> {
        &self.inner.store
    }

    fn connection_state(&self) -> ViewStream<ConnectionState> {
        ViewStream::new(self.inner.manager.state())
    }

    fn deactivate(&self) -> CommandOutcome {
        self.inner.commands.send_deactivate()
    }

    fn take_warnings(&self) -> Vec<String> {
        self.inner.commands.take_warnings()
    }

    fn description(&self) -> &str {
        &self.inner.description
    }
}

// ── Bridge ───────────────────────────────────────────────────────────

/// Fold transport events into the store, in arrival order. The channel
/// is lossless: the transport waits for this task rather than dropping.
async fn bridge_task(
    mut rx: mpsc::Receiver<TransportEvent>,
    store: Arc<SensorStore>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Some(TransportEvent::Frame(frame)) => {
                store.ingest(Some(SensorEvent::from(frame.as_ref())));
            }
            Some(TransportEvent::Disconnected) => store.ingest(None),
            None => break,
        }
    }
    debug!("event bridge exited");
}
