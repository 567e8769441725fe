//! Sensor connection manager with auto-reconnect.
//!
//! Owns the WebSocket to the sensor and its [`ConnectionState`]. Parsed
//! frames and disconnect notices are delivered as [`TransportEvent`]s to
//! two kinds of consumer: attached `mpsc` sinks, which apply backpressure
//! to the reader and never miss an event, and [`tokio::sync::broadcast`]
//! subscribers, which may lag. Each session
//! runs as a single task: connect → read until the link drops → publish
//! the disconnect → wait out the reconnect delay → connect again.
//!
//! # Example
//!
//! ```rust,ignore
//! use rfidmon_api::websocket::{ConnectionManager, ReconnectConfig, TransportEvent};
//! use url::Url;
//!
//! let url = Url::parse("ws://192.168.0.234:81/")?;
//! let manager = ConnectionManager::new(url, ReconnectConfig::default());
//! let mut rx = manager.attach();
//! manager.connect().await;
//!
//! while let Some(event) = rx.recv().await {
//!     if let TransportEvent::Frame(f) = event {
//!         println!("{}: {}", f.frame.state, f.frame.message);
//!     }
//! }
//!
//! manager.shutdown().await;
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::wire::{DeviceCommand, ReceivedFrame, parse_frame};

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const OUTBOUND_CHANNEL_CAPACITY: usize = 8;
const SINK_CHANNEL_CAPACITY: usize = 256;

/// How long `shutdown()` waits for a full sink to take the final
/// disconnect notice.
const SHUTDOWN_PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle phase of the transport, independent of the device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        })
    }
}

// ── TransportEvent ───────────────────────────────────────────────────

/// What the manager publishes downstream.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A frame that passed schema validation, stamped on arrival.
    Frame(Arc<ReceivedFrame>),
    /// The link went down; consumers should drop their "current" view.
    Disconnected,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// How the delay between reconnection attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Always wait `initial_delay`.
    #[default]
    Fixed,
    /// Double the delay per consecutive failure, capped at `max_delay`,
    /// with +-25% jitter.
    Exponential,
}

/// Reconnection policy for the sensor link.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 5s.
    pub initial_delay: Duration,

    /// Upper bound on the backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Fixed or exponential. Default: fixed.
    pub backoff: Backoff,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,

    /// Limit on a single connection attempt. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(5000),
            max_delay: Duration::from_secs(60),
            backoff: Backoff::Fixed,
            max_retries: None,
            connect_timeout: None,
        }
    }
}

// ── ConnectionManager ────────────────────────────────────────────────

/// Handle to the sensor connection.
///
/// Cheaply cloneable. The socket itself lives inside the session task and
/// is never shared; outbound frames reach it through a per-session `mpsc`
/// queue.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    url: Url,
    reconnect: ReconnectConfig,
    state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<TransportEvent>,
    /// Lossless consumers. The session task waits for room in each.
    sinks: ArcSwap<Vec<mpsc::Sender<TransportEvent>>>,
    /// Last error of a session loop that hit `max_retries` and stopped.
    final_error: watch::Sender<Option<Arc<Error>>>,
    /// Writer queue of the currently open socket, if any.
    outbound: ArcSwapOption<mpsc::Sender<String>>,
    session: Mutex<Option<Session>>,
    reconnects_scheduled: watch::Sender<u64>,
    sessions_started: AtomicU64,
    frames_parsed: AtomicU64,
    frames_rejected: AtomicU64,
}

/// One running session loop and the token that stops it.
struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a manager for `url`. Does NOT connect. Call
    /// [`connect()`](Self::connect) to spawn the session loop.
    pub fn new(url: Url, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (reconnects_scheduled, _) = watch::channel(0);
        let (final_error, _) = watch::channel(None);

        Self {
            inner: Arc::new(ManagerInner {
                url,
                reconnect,
                state,
                event_tx,
                sinks: ArcSwap::from_pointee(Vec::new()),
                final_error,
                outbound: ArcSwapOption::empty(),
                session: Mutex::new(None),
                reconnects_scheduled,
                sessions_started: AtomicU64::new(0),
                frames_parsed: AtomicU64::new(0),
                frames_rejected: AtomicU64::new(0),
            }),
        }
    }

    /// Endpoint this manager connects to.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Reconnection policy in effect.
    pub fn reconnect_config(&self) -> &ReconnectConfig {
        &self.inner.reconnect
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start (or restart) the session loop.
    ///
    /// Idempotent: a running session is cancelled and joined first, so its
    /// socket is closed before the new one is opened. Returns once the new
    /// loop is spawned; the handshake happens in the background.
    pub async fn connect(&self) {
        let mut session = self.inner.session.lock().await;

        if let Some(old) = session.take() {
            debug!("closing existing sensor session before reconnecting");
            old.cancel.cancel();
            let _ = old.task.await;
        }

        self.inner.final_error.send_replace(None);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            session_loop(inner, task_cancel).await;
        });

        self.inner.sessions_started.fetch_add(1, Ordering::Relaxed);
        *session = Some(Session { cancel, task });
    }

    /// Stop the session loop and any pending reconnect timer.
    ///
    /// Publishes [`TransportEvent::Disconnected`] so consumers drop their
    /// current view.
    pub async fn shutdown(&self) {
        let session = self.inner.session.lock().await.take();
        if let Some(session) = session {
            session.cancel.cancel();
            let _ = session.task.await;
        }

        self.inner.outbound.store(None);
        self.inner.state.send_replace(ConnectionState::Disconnected);

        let stop = CancellationToken::new();
        let publish = self.inner.publish(TransportEvent::Disconnected, &stop);
        if tokio::time::timeout(SHUTDOWN_PUBLISH_TIMEOUT, publish).await.is_err() {
            warn!("sensor event sink full, final disconnect notice not delivered");
        }
        debug!("sensor connection shut down");
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Queue a command for the open socket.
    ///
    /// Only succeeds while [`Connected`](ConnectionState::Connected).
    /// Otherwise nothing is transmitted and [`Error::NotConnected`] is
    /// returned. There is no queueing across reconnects.
    pub fn send(&self, command: DeviceCommand) -> Result<(), Error> {
        if *self.inner.state.borrow() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }

        let writer = self.inner.outbound.load();
        let Some(tx) = writer.as_ref() else {
            return Err(Error::NotConnected);
        };

        let text = command.encode()?;
        tx.try_send(text).map_err(|e| Error::Send(e.to_string()))?;
        debug!(?command, "queued outbound command");
        Ok(())
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Current connection state.
    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Attach a lossless consumer of parsed frames and disconnect notices.
    ///
    /// When the returned channel is full the session task stops reading the
    /// socket until there is room, so every event is delivered in order.
    /// Drop the receiver to detach.
    pub fn attach(&self) -> mpsc::Receiver<TransportEvent> {
        let (tx, rx) = mpsc::channel(SINK_CHANNEL_CAPACITY);
        self.inner.sinks.rcu(|sinks| {
            let mut next = Vec::clone(sinks);
            next.push(tx.clone());
            next
        });
        rx
    }

    /// Subscribe to parsed frames and disconnect notices without holding
    /// the reader back.
    ///
    /// A consumer that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`] and misses events. Use
    /// [`attach()`](Self::attach) when every event matters.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Watch for the session loop giving up after `max_retries`.
    pub fn gave_up(&self) -> watch::Receiver<Option<Arc<Error>>> {
        self.inner.final_error.subscribe()
    }

    /// The error that ended the session loop, if it gave up.
    pub fn final_error(&self) -> Option<Arc<Error>> {
        self.inner.final_error.borrow().clone()
    }

    /// Number of reconnect timers scheduled so far.
    pub fn reconnects_scheduled(&self) -> u64 {
        *self.inner.reconnects_scheduled.borrow()
    }

    /// Watch the reconnect counter.
    pub fn reconnects(&self) -> watch::Receiver<u64> {
        self.inner.reconnects_scheduled.subscribe()
    }

    /// Number of times [`connect()`](Self::connect) started a session loop.
    pub fn sessions_started(&self) -> u64 {
        self.inner.sessions_started.load(Ordering::Relaxed)
    }

    /// Frames that passed validation.
    pub fn frames_parsed(&self) -> u64 {
        self.inner.frames_parsed.load(Ordering::Relaxed)
    }

    /// Frames discarded as malformed.
    pub fn frames_rejected(&self) -> u64 {
        self.inner.frames_rejected.load(Ordering::Relaxed)
    }
}

// ── Session loop ─────────────────────────────────────────────────────

/// connect → read → on drop, publish disconnect, wait, reconnect.
///
/// This is the only place a reconnect is scheduled. Errors and clean
/// closes both return from [`connect_and_read`] and land here once.
async fn session_loop(inner: Arc<ManagerInner>, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    loop {
        inner.state.send_replace(ConnectionState::Connecting);

        let result = connect_and_read(&inner, &cancel, &mut attempt).await;

        inner.outbound.store(None);
        if cancel.is_cancelled() {
            break;
        }

        let failure = match result {
            Ok(()) => {
                info!("sensor connection closed");
                None
            }
            Err(e) => {
                warn!(error = %e, attempt, "sensor connection lost");
                Some(e)
            }
        };

        inner.state.send_replace(ConnectionState::Disconnected);
        if !inner.publish(TransportEvent::Disconnected, &cancel).await {
            break;
        }

        if let Some(max) = inner.reconnect.max_retries {
            if attempt >= max {
                error!(max_retries = max, "sensor reconnection limit reached, giving up");
                let failure = failure.unwrap_or_else(|| Error::WebSocketClosed {
                    code: 1000,
                    reason: "closed by sensor".into(),
                });
                inner.final_error.send_replace(Some(Arc::new(failure)));
                break;
            }
        }

        let delay = calculate_backoff(attempt, &inner.reconnect);
        inner.reconnects_scheduled.send_modify(|n| *n += 1);
        info!(delay_ms = millis(delay), attempt, "waiting before reconnect");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    inner.outbound.store(None);
    debug!("sensor session loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one socket and pump it until it drops.
///
/// `Ok(())` means the peer closed normally (or the session was cancelled);
/// `Err` means the link failed. On a read or write error the socket is
/// closed here before returning.
async fn connect_and_read(
    inner: &ManagerInner,
    cancel: &CancellationToken,
    attempt: &mut u32,
) -> Result<(), Error> {
    info!(url = %inner.url, "connecting to sensor");

    let uri: tungstenite::http::Uri = inner
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let handshake = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri));
    let handshake = async {
        match inner.reconnect.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| Error::Timeout {
                    timeout_ms: millis(limit),
                }),
            None => Ok(handshake.await),
        }
    };
    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        connected = handshake => connected?,
    };
    let (ws_stream, _response) = connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    info!("sensor connected");
    *attempt = 0;

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_CAPACITY);
    inner.outbound.store(Some(Arc::new(out_tx)));
    inner.state.send_replace(ConnectionState::Connected);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Commands queued before shutdown still go out.
                while let Ok(text) = out_rx.try_recv() {
                    if write.send(tungstenite::Message::text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = write.close().await;
                return Ok(());
            }
            Some(text) = out_rx.recv() => {
                if let Err(e) = write.send(tungstenite::Message::text(text)).await {
                    let _ = write.close().await;
                    return Err(Error::WebSocketConnect(e.to_string()));
                }
                trace!("outbound frame written");
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        // A `false` here means cancellation; the next pass
                        // takes the shutdown branch.
                        handle_text(inner, text.as_str(), cancel).await;
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong itself
                        trace!("sensor ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return match frame {
                            Some(cf) if cf.code != CloseCode::Normal => {
                                Err(Error::WebSocketClosed {
                                    code: u16::from(cf.code),
                                    reason: cf.reason.as_str().to_owned(),
                                })
                            }
                            _ => Ok(()),
                        };
                    }
                    Some(Err(e)) => {
                        let _ = write.close().await;
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        debug!("sensor stream ended without close frame");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, raw Frame
                    }
                }
            }
        }
    }
}

// ── Frame handling ───────────────────────────────────────────────────

impl ManagerInner {
    /// Deliver `event` to every sink, waiting for room, then to broadcast
    /// subscribers. Returns `false` if `cancel` fired while waiting.
    async fn publish(&self, event: TransportEvent, cancel: &CancellationToken) -> bool {
        let sinks = self.sinks.load_full();
        let mut detached = false;

        for sink in sinks.iter() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return false,
                sent = sink.send(event.clone()) => detached |= sent.is_err(),
            }
        }

        if detached {
            self.sinks.rcu(|sinks| {
                sinks
                    .iter()
                    .filter(|tx| !tx.is_closed())
                    .cloned()
                    .collect::<Vec<_>>()
            });
            debug!("dropped detached sensor event sink");
        }

        // Err just means nobody is subscribed right now
        let _ = self.event_tx.send(event);
        true
    }
}

/// Parse one text frame and publish it. Malformed frames are logged and
/// dropped; they never affect the link. Returns `false` if cancelled while
/// waiting on a full sink.
async fn handle_text(inner: &ManagerInner, text: &str, cancel: &CancellationToken) -> bool {
    match parse_frame(text) {
        Ok(frame) => {
            inner.frames_parsed.fetch_add(1, Ordering::Relaxed);
            trace!(state = %frame.state, "sensor frame");
            let event = TransportEvent::Frame(Arc::new(ReceivedFrame::now(frame)));
            inner.publish(event, cancel).await
        }
        Err(e) => {
            inner.frames_rejected.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "discarding malformed sensor frame");
            true
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Delay before reconnect attempt number `attempt` (0-based).
///
/// Exponential: `min(initial * 2^attempt, max)` with +-25% jitter
/// derived from the attempt number.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    match config.backoff {
        Backoff::Fixed => config.initial_delay,
        Backoff::Exponential => {
            let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
            let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
            let capped = base.min(config.max_delay.as_secs_f64());

            let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
            Duration::from_secs_f64((capped * jitter_factor).max(0.0))
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Tests ────────────────────────────────────────────────────────────
