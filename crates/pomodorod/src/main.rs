//! pomodorod - The Pomodoro timer service
//!
//! This is the main entry point for the pomodorod service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Session engine
//! - Clock and desktop notifications (Linux)
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use pomo_api::{ClientRole, NotifyLevel};
use pomo_config::load_config_or_default;
use pomo_core::SessionEngine;
use pomo_host_api::{Clock, DesktopNotifier, NotificationSink};
use pomo_host_linux::{NotifySendNotifier, TokioClock};
use pomo_ipc::{IpcServer, ServerMessage};
use pomo_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use pomo_util::{
    data_dir_without_env, database_path, default_config_path, socket_path_without_env,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pomodorod::{BroadcastSink, Dispatcher};

/// pomodorod - Pomodoro work/break timer service
#[derive(Parser, Debug)]
#[command(name = "pomodorod")]
#[command(about = "Pomodoro work/break timer service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/pomodorod/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set POMODOROD_SOCKET env var)
    #[arg(short, long, env = "POMODOROD_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set POMODOROD_DATA_DIR env var)
    #[arg(short, long, env = "POMODOROD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Start the countdown as soon as the service is up
    #[arg(long)]
    autostart: bool,
}

/// Main service state. Owned by the event loop.
struct Service {
    dispatcher: Dispatcher,
    clock: Arc<TokioClock>,
    ipc: Arc<IpcServer>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let config = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(config_path = %args.config.display(), "Configuration loaded");

        let socket_path = args
            .socket
            .clone()
            .or_else(|| config.daemon.socket_path.clone())
            .unwrap_or_else(socket_path_without_env);

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| config.daemon.data_dir.clone())
            .unwrap_or_else(data_dir_without_env);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = database_path(&data_dir);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to bind socket {:?}", socket_path))?;

        let clock = Arc::new(TokioClock::new()?);
        let desktop = Arc::new(NotifySendNotifier::detect());
        let sink: Arc<dyn NotificationSink> = Arc::new(BroadcastSink::new(ipc.event_sender()));

        let engine = SessionEngine::new(
            config.timer,
            store.clone(),
            clock.clone(),
            sink.clone(),
            Some(desktop.clone() as Arc<dyn DesktopNotifier>),
        );

        sink.notify(
            "Pomodoro timer ready",
            NotifyLevel::Success,
            Some(Duration::from_millis(3000)),
        );

        let dispatcher = Dispatcher::new(
            engine,
            store,
            ipc.event_sender(),
            desktop.is_available(),
        );

        Ok(Self {
            dispatcher,
            clock,
            ipc: Arc::new(ipc),
        })
    }

    async fn run(mut self, autostart: bool) -> Result<()> {
        let mut clock_events = self
            .clock
            .subscribe()
            .context("Clock event receiver already taken")?;
        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut cleanup_timer = tokio::time::interval(Duration::from_secs(60));

        if autostart {
            self.dispatcher.autostart();
        }

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(clock_event) = clock_events.recv() => {
                    self.dispatcher.handle_clock_event(clock_event);
                }

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }

                _ = cleanup_timer.tick() => {
                    self.dispatcher.cleanup(Duration::from_secs(300));
                }
            }
        }

        info!("Shutting down pomodorod");

        self.dispatcher.shutdown();
        // let writers flush the shutdown event
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let role = self
                    .ipc
                    .get_client_info(&client_id)
                    .await
                    .map(|info| info.role)
                    .unwrap_or(ClientRole::Observer);

                let response = self.dispatcher.handle_request(&client_id, role, request);
                let _ = self.ipc.send_response(&client_id, response).await;
            }

            ServerMessage::ClientConnected { client_id, info } => {
                self.dispatcher.client_connected(&client_id, &info);
            }

            ServerMessage::ClientDisconnected { client_id } => {
                self.dispatcher.client_disconnected(&client_id);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "pomodorod starting");

    let service = Service::new(&args).await?;
    service.run(args.autostart).await
}
