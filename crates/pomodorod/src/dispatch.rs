//! Request dispatch: rate limiting, authorization, validation, and the
//! events that follow each change

use pomo_api::{
    ClientInfo, ClientRole, Command, Event, EventPayload, HealthStatus, Request, Response,
    ResponsePayload,
};
use pomo_config::{describe_errors, validate_settings};
use pomo_core::{CoreEvent, SessionEngine};
use pomo_host_api::ClockEvent;
use pomo_store::{AuditEvent, AuditEventType, Store};
use pomo_util::{ClientId, PomoError, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const HISTORY_LIMIT_MAX: usize = 500;
const RATE_LIMIT_REQUESTS: u32 = 30;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);

/// Owns the engine and answers every client request and clock delivery.
///
/// Lives on the daemon's event loop; nothing else touches the engine.
pub struct Dispatcher {
    engine: SessionEngine,
    store: Arc<dyn Store>,
    events: broadcast::Sender<Event>,
    rate_limiter: RateLimiter,
    desktop_available: bool,
}

impl Dispatcher {
    pub fn new(
        engine: SessionEngine,
        store: Arc<dyn Store>,
        events: broadcast::Sender<Event>,
        desktop_available: bool,
    ) -> Self {
        Self {
            engine,
            store,
            events,
            rate_limiter: RateLimiter::new(RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW),
            desktop_available,
        }
    }

    /// Start the countdown on behalf of the service itself (`--autostart`)
    pub fn autostart(&mut self) {
        if let Some(event) = self.engine.start() {
            self.publish(event);
        }
    }

    pub fn handle_clock_event(&mut self, event: ClockEvent) {
        for event in self.engine.handle_clock_event(event) {
            self.publish(event);
        }
    }

    /// Answer one request. A successful mutating command is followed by a
    /// `state_changed` event carrying the new snapshot.
    pub fn handle_request(
        &mut self,
        client_id: &ClientId,
        role: ClientRole,
        request: Request,
    ) -> Response {
        if !self.rate_limiter.check(client_id) {
            debug!(client_id = %client_id, "Request rate limited");
            return Response::error(request.request_id, PomoError::RateLimited.into());
        }

        let mutating = request.command.is_mutating();
        match self.execute(client_id, role, request.command) {
            Ok(payload) => {
                if mutating {
                    let snapshot = self.engine.snapshot();
                    self.broadcast(EventPayload::StateChanged(snapshot));
                }
                Response::success(request.request_id, payload)
            }
            Err(err) => {
                debug!(client_id = %client_id, error = %err, "Request refused");
                Response::error(request.request_id, err.into())
            }
        }
    }

    pub fn client_connected(&self, client_id: &ClientId, info: &ClientInfo) {
        info!(
            client_id = %client_id,
            role = ?info.role,
            uid = ?info.uid,
            "Client connected"
        );

        self.audit(AuditEventType::ClientConnected {
            client_id: client_id.to_string(),
            role: format!("{:?}", info.role),
            uid: info.uid,
        });
    }

    pub fn client_disconnected(&mut self, client_id: &ClientId) {
        debug!(client_id = %client_id, "Client disconnected");

        self.audit(AuditEventType::ClientDisconnected {
            client_id: client_id.to_string(),
        });
        self.rate_limiter.remove_client(client_id);
    }

    /// Forget rate-limit state for clients idle longer than `stale_after`
    pub fn cleanup(&mut self, stale_after: Duration) {
        self.rate_limiter.cleanup(stale_after);
    }

    /// Stop the clock, write the final state and tell subscribers
    pub fn shutdown(&mut self) {
        self.engine.shutdown();
        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }
        self.broadcast(EventPayload::Shutdown);
    }

    fn execute(
        &mut self,
        client_id: &ClientId,
        role: ClientRole,
        command: Command,
    ) -> Result<ResponsePayload, PomoError> {
        if command.is_mutating() && !role.can_control() {
            return Err(PomoError::permission_denied(
                "Observers cannot control the timer",
            ));
        }

        let payload = match command {
            Command::GetState => self.state(),

            Command::Start => {
                if let Some(event) = self.engine.start() {
                    self.publish(event);
                }
                self.state()
            }

            Command::Pause => {
                if let Some(event) = self.engine.pause() {
                    self.publish(event);
                }
                self.state()
            }

            Command::Toggle => {
                if let Some(event) = self.engine.toggle() {
                    self.publish(event);
                }
                self.state()
            }

            Command::Reset => {
                let event = self.engine.reset();
                self.publish(event);
                self.state()
            }

            Command::Skip => {
                let event = self.engine.skip();
                self.publish(event);
                self.state()
            }

            Command::UpdateSettings { settings } => {
                let errors = validate_settings(&settings);
                if !errors.is_empty() {
                    return Err(PomoError::invalid_settings(describe_errors(&errors)));
                }
                let event = self.engine.update_settings(settings);
                self.publish(event);
                self.state()
            }

            Command::ResetStatistics => {
                let event = self.engine.reset_statistics();
                self.publish(event);
                self.state()
            }

            Command::GetRecentHistory { limit } => {
                let audits = self
                    .store
                    .get_recent_audits(limit.min(HISTORY_LIMIT_MAX))
                    .map_err(|e| PomoError::store(e.to_string()))?;
                ResponsePayload::History {
                    entries: audits.iter().map(AuditEvent::to_history_entry).collect(),
                }
            }

            Command::SubscribeEvents => ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            },

            Command::UnsubscribeEvents => ResponsePayload::Unsubscribed,

            Command::GetHealth => ResponsePayload::Health(HealthStatus {
                live: true,
                ready: true,
                store_ok: self.store.is_healthy(),
                desktop_notifications: self.desktop_available
                    && self.engine.settings().show_desktop_notifications,
            }),

            Command::Ping => ResponsePayload::Pong,
        };

        Ok(payload)
    }

    fn state(&self) -> ResponsePayload {
        ResponsePayload::State(self.engine.snapshot())
    }

    fn publish(&self, event: CoreEvent) {
        self.broadcast(event_payload(event));
    }

    fn broadcast(&self, payload: EventPayload) {
        // no subscribers is fine
        let _ = self.events.send(Event::new(payload));
    }

    fn audit(&self, event: AuditEventType) {
        let _ = self.store.append_audit(AuditEvent::new(event));
    }
}

pub fn event_payload(event: CoreEvent) -> EventPayload {
    match event {
        CoreEvent::TimerStarted {
            session,
            time_left,
            automatic,
        } => EventPayload::TimerStarted {
            session,
            time_left,
            automatic,
        },
        CoreEvent::TimerPaused { session, time_left } => {
            EventPayload::TimerPaused { session, time_left }
        }
        CoreEvent::TimerReset { session, time_left } => {
            EventPayload::TimerReset { session, time_left }
        }
        CoreEvent::Tick {
            session,
            time_left,
            total_work_time,
        } => EventPayload::Tick {
            session,
            time_left,
            total_work_time,
        },
        CoreEvent::SessionCompleted {
            finished,
            next,
            session_count,
            skipped,
            auto_start_pending,
        } => EventPayload::SessionCompleted {
            finished,
            next,
            session_count,
            skipped,
            auto_start_pending,
        },
        CoreEvent::SettingsUpdated { settings } => EventPayload::SettingsUpdated { settings },
        CoreEvent::StatisticsReset => EventPayload::StatisticsReset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_api::{ErrorCode, ResponseResult, SessionKind, TimerSettings};
    use pomo_host_api::{MockClock, RecordingNotifier};
    use pomo_store::SqliteStore;

    struct Harness {
        dispatcher: Dispatcher,
        events: broadcast::Receiver<Event>,
        clock: Arc<MockClock>,
        store: Arc<dyn Store>,
        client: ClientId,
    }

    fn harness() -> Harness {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = Arc::new(MockClock::new());
        let engine = SessionEngine::new(
            TimerSettings::default(),
            store.clone(),
            clock.clone(),
            Arc::new(RecordingNotifier::new()),
            None,
        );
        let (tx, events) = broadcast::channel(64);

        Harness {
            dispatcher: Dispatcher::new(engine, store.clone(), tx, false),
            events,
            clock,
            store,
            client: ClientId::new(),
        }
    }

    impl Harness {
        fn send(&mut self, role: ClientRole, command: Command) -> Response {
            self.dispatcher
                .handle_request(&self.client, role, Request::new(1, command))
        }

        fn drain(&mut self) -> Vec<EventPayload> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event.payload);
            }
            out
        }
    }

    fn error_code(response: &Response) -> Option<ErrorCode> {
        match &response.result {
            ResponseResult::Err(info) => Some(info.code),
            ResponseResult::Ok(_) => None,
        }
    }

    #[test]
    fn start_is_followed_by_state_changed() {
        let mut h = harness();

        let response = h.send(ClientRole::Controller, Command::Start);
        let ResponseResult::Ok(ResponsePayload::State(snapshot)) = response.result else {
            panic!("expected a state response");
        };
        assert!(snapshot.state.is_running);

        let events = h.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            EventPayload::TimerStarted {
                session: SessionKind::Work,
                time_left: 1500,
                automatic: false,
            }
        ));
        let EventPayload::StateChanged(snapshot) = &events[1] else {
            panic!("expected state_changed, got {:?}", events[1]);
        };
        assert!(snapshot.state.is_running);
        assert_eq!(snapshot.countdown, "25:00");
    }

    #[test]
    fn reads_do_not_broadcast_state() {
        let mut h = harness();
        h.send(ClientRole::Controller, Command::GetState);
        h.send(ClientRole::Controller, Command::Ping);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn observers_cannot_mutate() {
        let mut h = harness();

        let response = h.send(ClientRole::Observer, Command::Start);
        assert_eq!(error_code(&response), Some(ErrorCode::PermissionDenied));
        assert!(h.clock.active_subscription().is_none());
        assert!(h.drain().is_empty());

        // but may look
        let response = h.send(ClientRole::Observer, Command::GetState);
        assert_eq!(error_code(&response), None);
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        let mut h = harness();

        let response = h.send(
            ClientRole::Controller,
            Command::UpdateSettings {
                settings: TimerSettings {
                    work_duration: 0,
                    ..TimerSettings::default()
                },
            },
        );

        let ResponseResult::Err(info) = &response.result else {
            panic!("expected an error response");
        };
        assert_eq!(info.code, ErrorCode::InvalidSettings);
        assert!(info.message.contains("work_duration"));
        assert!(h.drain().is_empty());

        let ResponseResult::Ok(ResponsePayload::State(snapshot)) =
            h.send(ClientRole::Controller, Command::GetState).result
        else {
            panic!("expected a state response");
        };
        assert_eq!(snapshot.settings.work_duration, 25);
    }

    #[test]
    fn requests_past_the_limit_are_refused() {
        let mut h = harness();

        for _ in 0..RATE_LIMIT_REQUESTS {
            let response = h.send(ClientRole::Controller, Command::Ping);
            assert_eq!(error_code(&response), None);
        }
        let response = h.send(ClientRole::Controller, Command::Ping);
        assert_eq!(error_code(&response), Some(ErrorCode::RateLimited));

        // limits are per client
        let other = ClientId::new();
        let response =
            h.dispatcher
                .handle_request(&other, ClientRole::Controller, Request::new(2, Command::Ping));
        assert_eq!(error_code(&response), None);
    }

    #[test]
    fn history_is_newest_first() {
        let mut h = harness();
        h.send(ClientRole::Controller, Command::Start);
        h.send(ClientRole::Controller, Command::Pause);

        let ResponseResult::Ok(ResponsePayload::History { entries }) = h
            .send(
                ClientRole::Controller,
                Command::GetRecentHistory { limit: 10_000 },
            )
            .result
        else {
            panic!("expected history");
        };

        let kinds: Vec<&str> = entries.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["timer_paused", "timer_started"]);
    }

    #[test]
    fn clock_ticks_are_broadcast() {
        let mut h = harness();
        h.send(ClientRole::Controller, Command::Start);
        h.drain();

        let subscription = h.clock.active_subscription().unwrap();
        h.dispatcher.handle_clock_event(ClockEvent::Tick(subscription));

        let events = h.drain();
        assert!(matches!(
            events.as_slice(),
            [EventPayload::Tick {
                time_left: 1499,
                total_work_time: 1,
                ..
            }]
        ));
    }

    #[test]
    fn client_lifecycle_is_audited() {
        let h = harness();
        let mut dispatcher = h.dispatcher;
        let info = ClientInfo::new(ClientRole::Observer);

        dispatcher.client_connected(&info.client_id, &info);
        dispatcher.client_disconnected(&info.client_id);

        let kinds: Vec<String> = h
            .store
            .get_recent_audits(10)
            .unwrap()
            .iter()
            .map(|a| a.to_history_entry().event_type)
            .collect();
        assert_eq!(kinds, vec!["client_disconnected", "client_connected"]);
    }

    #[test]
    fn shutdown_notifies_subscribers() {
        let mut h = harness();
        h.dispatcher.shutdown();

        assert!(matches!(h.drain().as_slice(), [EventPayload::Shutdown]));
        let last = h.store.get_recent_audits(1).unwrap();
        assert_eq!(last[0].to_history_entry().event_type, "service_stopped");
    }
}
