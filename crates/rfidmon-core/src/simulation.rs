// ── Simulated sensor ──
//
// A deterministic stand-in for real hardware. Plays a fixed, cyclic
// script into its own store so the presentation layer can be exercised
// without a device on the network.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{CommandOutcome, Warnings};
use crate::model::{ConnectionState, SensorEvent, SensorState};
use crate::source::SensorSource;
use crate::store::{Retention, SensorStore};
use crate::stream::ViewStream;

/// Pause between the final countdown tick and the next step.
pub const COUNTDOWN_SETTLE: Duration = Duration::from_millis(500);

/// Pause after a manual deactivation before the script restarts.
pub const DEACTIVATE_RESUME: Duration = Duration::from_secs(2);

pub const DEACTIVATED_MESSAGE: &str = "Alarm manually deactivated by user";

/// One step of the demo script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoStep {
    pub state: SensorState,
    pub message: String,
    /// Initial countdown. The step ticks down to 0 over `dwell`.
    pub countdown: Option<u32>,
    pub uid_status: Option<String>,
    /// How long the step lasts before the next one starts.
    pub dwell: Duration,
}

impl DemoStep {
    fn new(state: SensorState, message: &str, dwell_ms: u64) -> Self {
        Self {
            state,
            message: message.to_owned(),
            countdown: None,
            uid_status: None,
            dwell: Duration::from_millis(dwell_ms),
        }
    }

    fn countdown(mut self, countdown: u32) -> Self {
        self.countdown = Some(countdown);
        self
    }

    fn uid(mut self, uid_status: &str) -> Self {
        self.uid_status = Some(uid_status.to_owned());
        self
    }

    fn event(&self) -> SensorEvent {
        SensorEvent {
            countdown: self.countdown,
            uid_status: self.uid_status.clone(),
            ..SensorEvent::new(self.state.clone(), self.message.clone())
        }
    }
}

/// The stock ten-step script: idle, an unauthorized card that escalates
/// to an alarm, an authorized card, and an unknown card whose countdown
/// is cancelled.
pub fn default_script() -> Vec<DemoStep> {
    use SensorState::{Alarm, Authorized, Countdown, Sensing};

    vec![
        DemoStep::new(Sensing, "System started - waiting for RFID card", 3000),
        DemoStep::new(Sensing, "Scanning...", 2000),
        DemoStep::new(Countdown, "Unauthorized card detected!", 10_000)
            .countdown(10)
            .uid("INVALID_UID_A3B2C1"),
        DemoStep::new(Alarm, "ALARM ACTIVATED! Unauthorized access", 5000),
        DemoStep::new(Sensing, "Alarm deactivated - system on standby", 3000),
        DemoStep::new(Sensing, "New card detected", 2000),
        DemoStep::new(Authorized, "Access granted - welcome!", 4000).uid("VALID_UID_F4E3D2"),
        DemoStep::new(Sensing, "System in surveillance mode", 5000),
        DemoStep::new(Countdown, "Unknown card", 8000)
            .countdown(8)
            .uid("UNKNOWN_UID_789ABC"),
        DemoStep::new(Sensing, "Countdown cancelled by user", 3000),
    ]
}

// ── SimulatedSource ──────────────────────────────────────────────────

/// Scripted sensor. Cheaply cloneable.
///
/// Methods that start a runner spawn onto the current tokio runtime.
#[derive(Clone)]
pub struct SimulatedSource {
    inner: Arc<SimInner>,
}

struct SimInner {
    script: Vec<DemoStep>,
    store: Arc<SensorStore>,
    state: watch::Sender<ConnectionState>,
    /// Token of the live runner. Emission happens under this lock so a
    /// cancelled runner can never interleave with its replacement.
    runner: Mutex<Option<CancellationToken>>,
    warnings: Warnings,
}

impl SimulatedSource {
    pub fn new(retention: Retention) -> Self {
        Self::with_script(default_script(), retention)
    }

    pub fn with_script(script: Vec<DemoStep>, retention: Retention) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(SimInner {
                script,
                store: Arc::new(SensorStore::new(retention)),
                state,
                runner: Mutex::new(None),
                warnings: Warnings::default(),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.runner().is_some()
    }

    /// Clear history and log, then play the script from step 0.
    /// No-op if already running.
    pub fn start(&self) {
        let mut runner = self.inner.runner();
        if runner.is_some() {
            debug!("simulation already running");
            return;
        }

        self.inner.store.reset();
        self.inner.state.send_replace(ConnectionState::Connected);
        *runner = Some(spawn_runner(&self.inner, Duration::ZERO));
        info!(steps = self.inner.script.len(), "simulation started");
    }

    /// Cancel the runner and publish the null current event.
    pub fn stop(&self) {
        if let Some(token) = self.inner.runner().take() {
            token.cancel();
        }
        self.inner.state.send_replace(ConnectionState::Disconnected);
        self.inner.store.ingest(None);
        info!("simulation stopped");
    }
}

impl SimInner {
    fn runner(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.runner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingest on behalf of the runner owning `token`. Returns `false` once
    /// that runner has been superseded.
    fn emit(&self, token: &CancellationToken, event: SensorEvent) -> bool {
        let _guard = self.runner();
        if token.is_cancelled() {
            return false;
        }
        self.store.ingest(Some(event));
        true
    }
}

impl SensorSource for SimulatedSource {
    fn store(&self) -> &Arc<SensorStore> {
        &self.inner.store
    }

    fn connection_state(&self) -> ViewStream<ConnectionState> {
        ViewStream::new(self.inner.state.subscribe())
    }

    /// Interrupt the script with a manual deactivation, then restart it
    /// from step 0.
    fn deactivate(&self) -> CommandOutcome {
        let mut runner = self.inner.runner();
        let Some(old) = runner.take() else {
            warn!("deactivate ignored, simulation not running");
            self.inner
                .warnings
                .push("deactivate not sent: simulation is not running");
            return CommandOutcome::NotConnected;
        };

        old.cancel();
        self.inner
            .store
            .ingest(Some(SensorEvent::new(SensorState::Sensing, DEACTIVATED_MESSAGE)));
        *runner = Some(spawn_runner(&self.inner, DEACTIVATE_RESUME));
        info!("simulated deactivate applied");
        CommandOutcome::Sent
    }

    fn take_warnings(&self) -> Vec<String> {
        self.inner.warnings.take()
    }

    fn description(&self) -> &str {
        "simulated sensor"
    }
}

// ── Runner ───────────────────────────────────────────────────────────

fn spawn_runner(inner: &Arc<SimInner>, resume_after: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    tokio::spawn(run_script(Arc::clone(inner), token.clone(), resume_after));
    token
}

/// Sleep unless cancelled first. Returns `false` on cancellation.
async fn pause(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        () = token.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

async fn run_script(inner: Arc<SimInner>, token: CancellationToken, resume_after: Duration) {
    if inner.script.is_empty() || !pause(&token, resume_after).await {
        return;
    }

    let mut index = 0;
    loop {
        let step = &inner.script[index];
        let event = step.event();
        if !inner.emit(&token, event.clone()) {
            return;
        }

        match step.countdown {
            Some(initial) if initial > 0 => {
                let tick = step.dwell / initial;
                for remaining in (0..initial).rev() {
                    if !pause(&token, tick).await {
                        return;
                    }
                    let update = SensorEvent::new(event.state.clone(), event.message.clone());
                    let update = SensorEvent {
                        countdown: Some(remaining),
                        uid_status: event.uid_status.clone(),
                        ..update
                    };
                    if !inner.emit(&token, update) {
                        return;
                    }
                }
                if !pause(&token, COUNTDOWN_SETTLE).await {
                    return;
                }
            }
            _ => {
                if !pause(&token, step.dwell).await {
                    return;
                }
            }
        }

        index = (index + 1) % inner.script.len();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn advance_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn current_message(sim: &SimulatedSource) -> String {
        sim.store().current().unwrap().message.clone()
    }

    #[test]
    fn default_script_has_ten_steps() {
        let script = default_script();
        assert_eq!(script.len(), 10);
        assert_eq!(script[2].countdown, Some(10));
        assert_eq!(script[8].uid_status.as_deref(), Some("UNKNOWN_UID_789ABC"));
    }

    #[tokio::test(start_paused = true)]
    async fn start_emits_first_step_immediately() {
        let sim = SimulatedSource::new(Retention::UNBOUNDED);
        sim.start();
        advance_ms(1).await;

        assert!(sim.is_running());
        assert_eq!(current_message(&sim), "System started - waiting for RFID card");
        assert_eq!(*sim.connection_state().current(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_then_advances() {
        let sim = SimulatedSource::new(Retention::UNBOUNDED);
        sim.start();

        // Steps 0 and 1 dwell 3s + 2s.
        advance_ms(5001).await;
        let current = sim.store().current().unwrap();
        assert_eq!(current.state, SensorState::Countdown);
        assert_eq!(current.countdown, Some(10));

        // One tick per second.
        advance_ms(3000).await;
        assert_eq!(sim.store().current().unwrap().countdown, Some(7));
        assert_eq!(sim.store().countdown_progress(), 30);

        // Reaches 0 at 15s, then ALARM 500ms later.
        advance_ms(7500).await;
        let current = sim.store().current().unwrap();
        assert_eq!(current.state, SensorState::Alarm);
        assert_eq!(sim.store().countdown_progress(), 100);

        let history: Vec<_> = sim
            .store()
            .history_snapshot()
            .iter()
            .map(|t| t.state.clone())
            .collect();
        assert_eq!(
            history,
            [SensorState::Sensing, SensorState::Countdown, SensorState::Alarm]
        );
        // 2 idle steps + initial countdown + 10 ticks + alarm.
        assert_eq!(sim.store().log_len(), 14);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_keep_uid_status() {
        let sim = SimulatedSource::new(Retention::UNBOUNDED);
        sim.start();
        advance_ms(6001).await;

        let current = sim.store().current().unwrap();
        assert_eq!(current.countdown, Some(9));
        assert_eq!(current.uid_status.as_deref(), Some("INVALID_UID_A3B2C1"));
    }

    #[tokio::test(start_paused = true)]
    async fn deactivate_interrupts_and_restarts_script() {
        let sim = SimulatedSource::new(Retention::UNBOUNDED);
        sim.start();
        advance_ms(6001).await;

        assert_eq!(sim.deactivate(), CommandOutcome::Sent);
        assert_eq!(current_message(&sim), DEACTIVATED_MESSAGE);
        let log_after_deactivate = sim.store().log_len();

        // No stray countdown ticks from the cancelled runner.
        advance_ms(1500).await;
        assert_eq!(sim.store().log_len(), log_after_deactivate);
        assert_eq!(current_message(&sim), DEACTIVATED_MESSAGE);

        advance_ms(501).await;
        assert_eq!(current_message(&sim), "System started - waiting for RFID card");
        assert!(sim.take_warnings().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_current_and_keeps_log() {
        let sim = SimulatedSource::new(Retention::UNBOUNDED);
        sim.start();
        advance_ms(3001).await;
        let logged = sim.store().log_len();

        sim.stop();
        advance_ms(10_000).await;

        assert!(!sim.is_running());
        assert!(sim.store().current().is_none());
        assert_eq!(sim.store().log_len(), logged);
        assert_eq!(*sim.connection_state().current(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn deactivate_while_stopped_is_a_warning() {
        let sim = SimulatedSource::new(Retention::UNBOUNDED);

        assert_eq!(sim.deactivate(), CommandOutcome::NotConnected);
        assert_eq!(sim.take_warnings().len(), 1);
        assert_eq!(sim.store().log_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_a_noop_and_restart_resets() {
        let sim = SimulatedSource::new(Retention::UNBOUNDED);
        sim.start();
        advance_ms(3001).await;
        sim.start();
        advance_ms(1).await;
        assert_eq!(sim.store().log_len(), 2);

        sim.stop();
        sim.start();
        advance_ms(1).await;
        assert_eq!(sim.store().log_len(), 1);
        assert_eq!(sim.store().history_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn script_wraps_around() {
        let script = vec![
            DemoStep::new(SensorState::Sensing, "a", 100),
            DemoStep::new(SensorState::Alarm, "b", 100),
        ];
        let sim = SimulatedSource::with_script(script, Retention::UNBOUNDED);
        sim.start();
        advance_ms(201).await;

        assert_eq!(current_message(&sim), "a");
        assert_eq!(sim.store().log_len(), 3);
    }
}
