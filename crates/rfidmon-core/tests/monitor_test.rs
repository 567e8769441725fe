//! End-to-end tests for `Monitor` against a local WebSocket server
//! standing in for the sensor.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use rfidmon_core::{
    CommandOutcome, ConnectionState, CoreError, Monitor, MonitorConfig, ReconnectConfig, Retention,
    SensorSource, SensorState,
};

/// Sensor stand-in: sends `frames` to the first client, then closes the
/// socket once `hangup` is notified. Forwards anything the client sends,
/// before or after the hangup, to the returned receiver.
async fn sensor(
    frames: Vec<&'static str>,
    hangup: Arc<Notify>,
) -> (MonitorConfig, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let mut ws = accept_async(stream).await.unwrap();
        for frame in frames {
            ws.send(Message::text(frame.to_owned())).await.unwrap();
        }
        loop {
            tokio::select! {
                () = hangup.notified() => {
                    let _ = ws.close(None).await;
                    while let Some(Ok(msg)) = ws.next().await {
                        if let Message::Text(text) = msg {
                            let _ = tx.send(text.as_str().to_owned());
                        }
                    }
                    return;
                }
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = tx.send(text.as_str().to_owned());
                    }
                    Some(Ok(_)) => {}
                    _ => return,
                },
            }
        }
    });

    let config = MonitorConfig {
        host: "127.0.0.1".into(),
        port,
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_secs(30),
            ..ReconnectConfig::default()
        },
        ..MonitorConfig::default()
    };
    (config, rx)
}

async fn wait_until(check: impl FnMut() -> bool) {
    wait_until_within(Duration::from_secs(5), check).await;
}

async fn wait_until_within(limit: Duration, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn frames_flow_into_views() {
    let hangup = Arc::new(Notify::new());
    let (config, _rx) = sensor(
        vec![
            r#"{"state":"SENSING","message":"ready"}"#,
            r#"{"state":"SENSING","message":"ready"}"#,
            r#"{"state":"COUNTDOWN","message":"card?","countdown":10}"#,
            "not json",
            r#"{"state":"ALARM","message":"intruder"}"#,
        ],
        Arc::clone(&hangup),
    )
    .await;

    let monitor = Monitor::new(config).unwrap();
    monitor.start().await;
    let store = Arc::clone(monitor.store());
    wait_until(|| store.log_len() == 4).await;

    let states: Vec<_> = store
        .history_snapshot()
        .iter()
        .map(|t| t.state.clone())
        .collect();
    assert_eq!(
        states,
        [SensorState::Sensing, SensorState::Countdown, SensorState::Alarm]
    );
    assert_eq!(store.current().unwrap().state, SensorState::Alarm);
    assert_eq!(store.countdown_progress(), 0);
    assert_eq!(monitor.manager().frames_rejected(), 1);

    monitor.shutdown().await;
}

#[tokio::test]
async fn disconnect_clears_current_but_keeps_log() {
    let hangup = Arc::new(Notify::new());
    let (config, _rx) = sensor(
        vec![
            r#"{"state":"SENSING","message":"ready"}"#,
            r#"{"state":"COUNTDOWN","message":"x","countdown":7}"#,
        ],
        Arc::clone(&hangup),
    )
    .await;

    let monitor = Monitor::new(config).unwrap();
    let connection = monitor.connection_state();
    monitor.start().await;
    let store = Arc::clone(monitor.store());
    wait_until(|| store.log_len() == 2).await;

    hangup.notify_one();
    wait_until(|| store.current().is_none()).await;

    assert_eq!(store.log_len(), 2);
    assert_eq!(store.history_len(), 2);
    assert_eq!(store.countdown_progress(), 30);
    assert_eq!(monitor.current_connection_state(), ConnectionState::Disconnected);
    assert_eq!(connection.latest(), ConnectionState::Disconnected);
    wait_until(|| monitor.manager().reconnects_scheduled() == 1).await;

    monitor.shutdown().await;
}

#[tokio::test]
async fn deactivate_round_trip() {
    let hangup = Arc::new(Notify::new());
    let (config, mut rx) = sensor(vec![], Arc::clone(&hangup)).await;

    let monitor = Monitor::new(config).unwrap();
    monitor.start().await;
    assert!(
        tokio::time::timeout(Duration::from_secs(5), monitor.wait_connected())
            .await
            .unwrap()
    );

    assert_eq!(monitor.deactivate(), CommandOutcome::Sent);
    let sent = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent, r#"{"command":"deactivate"}"#);
    assert!(monitor.take_warnings().is_empty());

    monitor.shutdown().await;
}

#[tokio::test]
async fn deactivate_while_disconnected_warns() {
    let hangup = Arc::new(Notify::new());
    let (config, mut rx) = sensor(vec![], Arc::clone(&hangup)).await;

    let monitor = Monitor::new(config).unwrap();
    monitor.start().await;
    assert!(
        tokio::time::timeout(Duration::from_secs(5), monitor.wait_connected())
            .await
            .unwrap()
    );

    hangup.notify_one();
    wait_until(|| monitor.current_connection_state() == ConnectionState::Disconnected).await;

    assert_eq!(monitor.deactivate(), CommandOutcome::NotConnected);
    let warnings = monitor.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("not open"));
    assert!(monitor.store().log_snapshot().is_empty());

    // Give a stray frame time to arrive before checking nothing came.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "sensor received a frame while disconnected");

    monitor.shutdown().await;
    assert!(monitor.store().current().is_none());
}

#[tokio::test]
async fn flood_of_frames_is_logged_without_loss() {
    const FRAMES: usize = 5000;
    let frames: Vec<&'static str> = (0..FRAMES)
        .map(|n| {
            if n % 2 == 0 {
                r#"{"state":"SENSING","message":"idle"}"#
            } else {
                r#"{"state":"ALARM","message":"intruder"}"#
            }
        })
        .collect();
    let hangup = Arc::new(Notify::new());
    let (config, _rx) = sensor(frames, Arc::clone(&hangup)).await;

    let monitor = Monitor::new(MonitorConfig {
        retention: Retention::UNBOUNDED,
        ..config
    })
    .unwrap();
    monitor.start().await;
    let store = Arc::clone(monitor.store());
    wait_until_within(Duration::from_secs(30), || store.log_len() == FRAMES).await;

    assert_eq!(
        u64::try_from(store.log_len()).unwrap(),
        monitor.manager().frames_parsed()
    );
    assert_eq!(store.history_len(), FRAMES);
    assert_eq!(store.total_events(), u64::try_from(FRAMES).unwrap());
    assert_eq!(store.current().unwrap().state, SensorState::Alarm);

    hangup.notify_one();
    wait_until(|| store.current().is_none()).await;
    assert_eq!(store.log_len(), FRAMES);

    monitor.shutdown().await;
}

#[tokio::test]
async fn retry_limit_surfaces_a_connection_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let monitor = Monitor::new(MonitorConfig {
        host: "127.0.0.1".into(),
        port,
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_retries: Some(1),
            ..ReconnectConfig::default()
        },
        ..MonitorConfig::default()
    })
    .unwrap();
    assert!(monitor.failure().is_none());
    monitor.start().await;

    let err = tokio::time::timeout(Duration::from_secs(5), monitor.wait_failure())
        .await
        .unwrap();
    match err {
        CoreError::ConnectionFailed { url, .. } => assert!(url.contains(&port.to_string())),
        other => panic!("unexpected error: {other}"),
    }
    assert!(monitor.failure().is_some());
    assert_eq!(monitor.manager().reconnects_scheduled(), 1);

    monitor.shutdown().await;
}
