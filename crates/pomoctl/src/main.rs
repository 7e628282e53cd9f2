//! pomoctl - control a running pomodorod
//!
//! Usage:
//!   pomoctl status              Show the countdown and statistics
//!   pomoctl start|pause|toggle  Drive the countdown
//!   pomoctl reset               Refill the current session
//!   pomoctl skip                Finish the current session now
//!   pomoctl set --work 50       Change settings
//!   pomoctl history [N]         Show recent activity
//!   pomoctl watch               Follow events as they happen

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pomo_api::{
    Command, EngineSnapshot, EventPayload, HealthStatus, HistoryEntry, ResponsePayload,
    TimerSettings,
};
use pomo_ipc::{IpcClient, IpcError};
use pomo_util::{format_countdown, format_datetime_full, format_duration, socket_path_without_env};
use std::path::PathBuf;
use std::time::Duration;

/// pomoctl - control the Pomodoro timer service
#[derive(Parser, Debug)]
#[command(name = "pomoctl")]
#[command(about = "Control the pomodorod Pomodoro timer", long_about = None)]
#[command(version)]
struct Cli {
    /// Socket path override (or set POMODOROD_SOCKET env var)
    #[arg(short, long, env = "POMODOROD_SOCKET")]
    socket: Option<PathBuf>,

    /// Print raw JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the countdown, settings and statistics (default)
    #[command(alias = "st")]
    Status,

    /// Start counting down
    Start,

    /// Pause the countdown
    Pause,

    /// Pause if running, start otherwise
    Toggle,

    /// Stop and refill the current session
    Reset,

    /// Finish the current session now
    Skip,

    /// Zero the completed-session count and work time
    StatsReset,

    /// Change timer settings; unspecified values are kept
    Set(SetArgs),

    /// Show recent activity, newest first
    History {
        #[arg(default_value = "20")]
        limit: usize,
    },

    /// Print events until the service stops
    Watch,

    /// Check service health
    Health,
}

#[derive(Args, Debug, Default)]
struct SetArgs {
    /// Work session length in minutes
    #[arg(long)]
    work: Option<u32>,

    /// Short break length in minutes
    #[arg(long)]
    short_break: Option<u32>,

    /// Long break length in minutes
    #[arg(long)]
    long_break: Option<u32>,

    /// Work sessions before a long break
    #[arg(long)]
    sessions_until_long_break: Option<u32>,

    /// Start breaks automatically
    #[arg(long)]
    auto_start_breaks: Option<bool>,

    /// Start work sessions automatically
    #[arg(long)]
    auto_start_work: Option<bool>,

    /// Show desktop notifications on completion
    #[arg(long)]
    desktop_notifications: Option<bool>,
}

impl SetArgs {
    fn is_empty(&self) -> bool {
        self.work.is_none()
            && self.short_break.is_none()
            && self.long_break.is_none()
            && self.sessions_until_long_break.is_none()
            && self.auto_start_breaks.is_none()
            && self.auto_start_work.is_none()
            && self.desktop_notifications.is_none()
    }

    /// Overlay the given values onto the current settings
    fn apply(&self, current: &TimerSettings) -> TimerSettings {
        TimerSettings {
            work_duration: self.work.unwrap_or(current.work_duration),
            short_break_duration: self.short_break.unwrap_or(current.short_break_duration),
            long_break_duration: self.long_break.unwrap_or(current.long_break_duration),
            sessions_until_long_break: self
                .sessions_until_long_break
                .unwrap_or(current.sessions_until_long_break),
            auto_start_breaks: self.auto_start_breaks.unwrap_or(current.auto_start_breaks),
            auto_start_work: self.auto_start_work.unwrap_or(current.auto_start_work),
            show_desktop_notifications: self
                .desktop_notifications
                .unwrap_or(current.show_desktop_notifications),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let socket = cli.socket.clone().unwrap_or_else(socket_path_without_env);

    let mut client = IpcClient::connect(&socket)
        .await
        .with_context(|| format!("Could not connect to pomodorod at {:?}", socket))?;

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            let payload = client.request(Command::GetState).await?;
            print_payload(&payload, cli.json)?;
        }
        Commands::Start => run_simple(&mut client, Command::Start, cli.json).await?,
        Commands::Pause => run_simple(&mut client, Command::Pause, cli.json).await?,
        Commands::Toggle => run_simple(&mut client, Command::Toggle, cli.json).await?,
        Commands::Reset => run_simple(&mut client, Command::Reset, cli.json).await?,
        Commands::Skip => run_simple(&mut client, Command::Skip, cli.json).await?,
        Commands::StatsReset => {
            run_simple(&mut client, Command::ResetStatistics, cli.json).await?
        }
        Commands::Set(args) => {
            if args.is_empty() {
                bail!("Nothing to change; see `pomoctl set --help`");
            }
            let ResponsePayload::State(snapshot) = client.request(Command::GetState).await?
            else {
                bail!("Unexpected response to get_state");
            };
            let settings = args.apply(&snapshot.settings);
            run_simple(&mut client, Command::UpdateSettings { settings }, cli.json).await?;
        }
        Commands::History { limit } => {
            let payload = client
                .request(Command::GetRecentHistory { limit })
                .await?;
            print_payload(&payload, cli.json)?;
        }
        Commands::Watch => watch(client, cli.json).await?,
        Commands::Health => {
            let payload = client.request(Command::GetHealth).await?;
            print_payload(&payload, cli.json)?;
        }
    }

    Ok(())
}

async fn run_simple(client: &mut IpcClient, command: Command, json: bool) -> Result<()> {
    let payload = client.request(command).await?;
    print_payload(&payload, json)
}

async fn watch(mut client: IpcClient, json: bool) -> Result<()> {
    // current state first, then changes
    let payload = client.request(Command::GetState).await?;
    print_payload(&payload, json)?;

    let mut events = client.subscribe().await?;
    loop {
        let event = match events.next().await {
            Ok(event) => event,
            Err(IpcError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else if let Some(line) = describe_event(&event.payload) {
            println!("[{}] {}", event.timestamp.format("%H:%M:%S"), line);
        }

        if matches!(event.payload, EventPayload::Shutdown) {
            return Ok(());
        }
    }
}

fn print_payload(payload: &ResponsePayload, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(payload)?);
        return Ok(());
    }

    match payload {
        ResponsePayload::State(snapshot) => print_snapshot(snapshot),
        ResponsePayload::History { entries } => print_history(entries),
        ResponsePayload::Health(health) => print_health(health),
        ResponsePayload::Pong => println!("pong"),
        ResponsePayload::Subscribed { .. } | ResponsePayload::Unsubscribed => {}
    }
    Ok(())
}

fn print_snapshot(snapshot: &EngineSnapshot) {
    let state = &snapshot.state;
    let status = if state.is_running {
        "running"
    } else if state.is_paused {
        "paused"
    } else {
        "stopped"
    };

    println!(
        "{}  {}  ({}, {:.0}% done)",
        state.current_session.display_name(),
        snapshot.countdown,
        status,
        snapshot.progress * 100.0
    );
    println!(
        "Completed: {} sessions, {} of work",
        state.session_count,
        format_duration(Duration::from_secs(state.total_work_time))
    );

    let s = &snapshot.settings;
    println!(
        "Settings: work {}m, short break {}m, long break {}m every {} sessions",
        s.work_duration, s.short_break_duration, s.long_break_duration, s.sessions_until_long_break
    );
}

fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No history yet");
        return;
    }
    for entry in entries {
        let details = match &entry.details {
            serde_json::Value::Object(map) if map.is_empty() => String::new(),
            other => other.to_string(),
        };
        println!(
            "{}  {:<20} {}",
            format_datetime_full(&entry.timestamp),
            entry.event_type,
            details
        );
    }
}

fn print_health(health: &HealthStatus) {
    println!("live: {}", health.live);
    println!("ready: {}", health.ready);
    println!("store: {}", if health.store_ok { "ok" } else { "failing" });
    println!(
        "desktop notifications: {}",
        if health.desktop_notifications {
            "on"
        } else {
            "off"
        }
    );
}

/// One-line rendering of an event; `None` for events not worth a line
fn describe_event(payload: &EventPayload) -> Option<String> {
    let line = match payload {
        EventPayload::StateChanged(snapshot) => format!(
            "{} {}",
            snapshot.state.current_session.display_name(),
            snapshot.countdown
        ),
        EventPayload::TimerStarted {
            session,
            time_left,
            automatic,
        } => format!(
            "{} started at {}{}",
            session.display_name(),
            format_countdown(*time_left),
            if *automatic { " (auto)" } else { "" }
        ),
        EventPayload::TimerPaused { session, time_left } => format!(
            "{} paused at {}",
            session.display_name(),
            format_countdown(*time_left)
        ),
        EventPayload::TimerReset { session, time_left } => format!(
            "{} reset to {}",
            session.display_name(),
            format_countdown(*time_left)
        ),
        EventPayload::Tick { .. } => return None,
        EventPayload::SessionCompleted {
            finished,
            next,
            session_count,
            skipped,
            ..
        } => format!(
            "{} {} (completed: {}), next: {}",
            finished.display_name(),
            if *skipped { "skipped" } else { "finished" },
            session_count,
            next.display_name()
        ),
        EventPayload::SettingsUpdated { .. } => "Settings updated".to_string(),
        EventPayload::StatisticsReset => "Statistics reset".to_string(),
        EventPayload::Notification { message, level, .. } => format!("{}: {}", level, message),
        EventPayload::Shutdown => "Service stopped".to_string(),
    };
    Some(line)
}
