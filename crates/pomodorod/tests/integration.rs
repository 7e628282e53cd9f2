//! Integration tests for pomodorod
//!
//! These wire the real store, clock and IPC layer together the way the
//! daemon does and check the end-to-end behavior.

use pomo_api::{
    ClientRole, Command, EngineSnapshot, ErrorCode, EventPayload, ResponsePayload,
    ResponseResult, SessionKind, TimerSettings,
};
use pomo_core::{CoreEvent, SessionEngine};
use pomo_host_api::{Clock, ClockEvent, MockClock, RecordingNotifier};
use pomo_host_linux::TokioClock;
use pomo_ipc::{IpcClient, IpcServer, ServerMessage};
use pomo_store::{SqliteStore, Store};
use pomo_util::database_path;
use pomodorod::Dispatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn open_store(dir: &Path) -> Arc<dyn Store> {
    Arc::new(SqliteStore::open(database_path(dir)).unwrap())
}

fn engine_with_clock(
    settings: TimerSettings,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
) -> SessionEngine {
    SessionEngine::new(
        settings,
        store,
        clock,
        Arc::new(RecordingNotifier::new()),
        None,
    )
}

#[test]
fn test_settings_and_statistics_survive_restart() {
    let dir = tempdir().unwrap();

    {
        let clock = Arc::new(MockClock::new());
        let mut engine =
            engine_with_clock(TimerSettings::default(), open_store(dir.path()), clock.clone());

        engine.update_settings(TimerSettings {
            work_duration: 50,
            short_break_duration: 10,
            ..TimerSettings::default()
        });
        engine.start();
        let subscription = clock.active_subscription().unwrap();
        for _ in 0..5 {
            engine.handle_clock_event(ClockEvent::Tick(subscription));
        }
        engine.shutdown();
    }

    // the config default is ignored once settings were stored
    let clock = Arc::new(MockClock::new());
    let engine = engine_with_clock(TimerSettings::default(), open_store(dir.path()), clock);

    assert_eq!(engine.settings().work_duration, 50);
    assert_eq!(engine.settings().short_break_duration, 10);
    assert_eq!(engine.current_session(), SessionKind::Work);
    assert_eq!(engine.time_left(), 50 * 60 - 5);
    assert_eq!(engine.total_work_time(), 5);
    assert!(!engine.is_running());
}

#[test]
fn test_full_cycle_reaches_long_break() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(MockClock::new());
    let settings = TimerSettings {
        sessions_until_long_break: 2,
        ..TimerSettings::default()
    };
    let mut engine = engine_with_clock(settings, open_store(dir.path()), clock);

    let mut kinds = vec![engine.current_session()];
    for _ in 0..4 {
        engine.skip();
        kinds.push(engine.current_session());
    }

    assert_eq!(
        kinds,
        vec![
            SessionKind::Work,
            SessionKind::ShortBreak,
            SessionKind::Work,
            SessionKind::LongBreak,
            SessionKind::Work,
        ]
    );
    assert_eq!(engine.session_count(), 2);
    // skipped time is never counted
    assert_eq!(engine.total_work_time(), 0);
}

#[test]
fn test_audit_history_records_operations() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let clock = Arc::new(MockClock::new());
    let mut engine = engine_with_clock(TimerSettings::default(), store.clone(), clock);

    engine.start();
    engine.pause();
    engine.skip();

    let history: Vec<String> = store
        .get_recent_audits(10)
        .unwrap()
        .iter()
        .map(|a| a.to_history_entry().event_type)
        .collect();

    assert_eq!(
        history,
        vec!["session_completed", "timer_paused", "timer_started"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_tokio_clock_drives_countdown() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(TokioClock::new().unwrap());
    let mut clock_events = clock.subscribe().unwrap();
    let mut engine =
        engine_with_clock(TimerSettings::default(), open_store(dir.path()), clock.clone());

    engine.start();
    tokio::time::sleep(Duration::from_millis(3500)).await;

    while let Ok(event) = clock_events.try_recv() {
        engine.handle_clock_event(event);
    }

    assert_eq!(engine.time_left(), 25 * 60 - 3);
    assert_eq!(engine.total_work_time(), 3);

    // ticks already queued after a pause are dropped
    engine.pause();
    tokio::time::sleep(Duration::from_secs(2)).await;
    while let Ok(event) = clock_events.try_recv() {
        assert!(engine.handle_clock_event(event).is_empty());
    }
    assert_eq!(engine.time_left(), 25 * 60 - 3);
}

#[tokio::test(start_paused = true)]
async fn test_auto_start_fires_after_delay() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(TokioClock::new().unwrap());
    let mut clock_events = clock.subscribe().unwrap();
    let settings = TimerSettings {
        auto_start_breaks: true,
        ..TimerSettings::default()
    };
    let mut engine = engine_with_clock(settings, open_store(dir.path()), clock.clone());

    engine.skip();
    assert!(engine.auto_start_pending());
    assert!(!engine.is_running());

    let event = tokio::time::timeout(Duration::from_secs(10), clock_events.recv())
        .await
        .unwrap()
        .unwrap();
    let events = engine.handle_clock_event(event);

    assert_eq!(
        events,
        vec![CoreEvent::TimerStarted {
            session: SessionKind::ShortBreak,
            time_left: 5 * 60,
            automatic: true,
        }]
    );
    assert!(engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_manual_reset_cancels_auto_start() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(TokioClock::new().unwrap());
    let mut clock_events = clock.subscribe().unwrap();
    let settings = TimerSettings {
        auto_start_breaks: true,
        ..TimerSettings::default()
    };
    let mut engine = engine_with_clock(settings, open_store(dir.path()), clock.clone());

    engine.skip();
    engine.reset();

    let event = tokio::time::timeout(Duration::from_secs(10), clock_events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ClockEvent::Wakeup(_)));
    assert!(engine.handle_clock_event(event).is_empty());
    assert!(!engine.is_running());
}

/// Socket server driven by the real dispatcher, as the daemon loop does
async fn spawn_service(dir: &Path) -> (Arc<IpcServer>, PathBuf) {
    let socket_path = dir.join("pomodorod.sock");

    let mut server = IpcServer::new(&socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);
    let mut messages = server.take_message_receiver().await.unwrap();

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let store = open_store(dir);
    let engine = engine_with_clock(
        TimerSettings::default(),
        store.clone(),
        Arc::new(MockClock::new()),
    );
    let mut dispatcher = Dispatcher::new(engine, store, server.event_sender(), false);

    let service = server.clone();
    tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            match msg {
                ServerMessage::Request { client_id, request } => {
                    let role = service
                        .get_client_info(&client_id)
                        .await
                        .map(|info| info.role)
                        .unwrap_or(ClientRole::Observer);
                    let response = dispatcher.handle_request(&client_id, role, request);
                    let _ = service.send_response(&client_id, response).await;
                }
                ServerMessage::ClientConnected { client_id, info } => {
                    dispatcher.client_connected(&client_id, &info);
                }
                ServerMessage::ClientDisconnected { client_id } => {
                    dispatcher.client_disconnected(&client_id);
                }
            }
        }
    });

    (server, socket_path)
}

#[tokio::test]
async fn test_ipc_start_updates_state_and_notifies_watchers() {
    let dir = tempdir().unwrap();
    let (_server, socket_path) = spawn_service(dir.path()).await;

    let mut watcher = IpcClient::connect(&socket_path)
        .await
        .unwrap()
        .subscribe()
        .await
        .unwrap();

    // the test runs as the socket owner, so it may control the timer
    let mut controller = IpcClient::connect(&socket_path).await.unwrap();
    let ResponsePayload::State(EngineSnapshot { state, countdown, .. }) =
        controller.request(Command::Start).await.unwrap()
    else {
        panic!("expected a state response");
    };
    assert!(state.is_running);
    assert_eq!(countdown, "25:00");

    let first = tokio::time::timeout(Duration::from_secs(2), watcher.next())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        first.payload,
        EventPayload::TimerStarted {
            session: SessionKind::Work,
            time_left: 1500,
            automatic: false,
        }
    ));

    let second = tokio::time::timeout(Duration::from_secs(2), watcher.next())
        .await
        .unwrap()
        .unwrap();
    let EventPayload::StateChanged(snapshot) = second.payload else {
        panic!("expected state_changed, got {:?}", second.payload);
    };
    assert!(snapshot.state.is_running);
}

#[tokio::test]
async fn test_ipc_rejects_out_of_range_settings() {
    let dir = tempdir().unwrap();
    let (_server, socket_path) = spawn_service(dir.path()).await;

    let mut client = IpcClient::connect(&socket_path).await.unwrap();
    let response = client
        .send(Command::UpdateSettings {
            settings: TimerSettings {
                work_duration: 0,
                ..TimerSettings::default()
            },
        })
        .await
        .unwrap();

    let ResponseResult::Err(info) = response.result else {
        panic!("expected an error response");
    };
    assert_eq!(info.code, ErrorCode::InvalidSettings);

    let ResponsePayload::State(snapshot) = client.request(Command::GetState).await.unwrap() else {
        panic!("expected a state response");
    };
    assert_eq!(snapshot.settings.work_duration, 25);
}
