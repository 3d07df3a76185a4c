pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    AppState, DurationUpdate, DurationView, SessionView, add_blocked_domain_impl,
    end_break_impl, get_duration_impl, get_session_impl, get_subject_impl, list_blocklist_impl,
    refresh_session_impl, remove_blocked_domain_impl, set_duration_impl, set_subject_impl,
    skip_break_impl, start_break_impl, start_session_impl, stop_session_impl,
    watch_session_impl,
};
use application::session_sync::Visibility;
use clap::{Args, Parser, Subcommand};
use domain::models::{Blocklist, DURATION_PRESETS, SessionStatus};
use infrastructure::config::{load_client_config, load_relay_config};
use infrastructure::error::InfraError;
use serde::Serialize;
use std::io::Write;
use std::process::ExitCode;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lockin", version, about = "Focus timer with HIA accountability relay")]
pub struct Cli {
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HIA relay server.
    Relay,
    #[command(flatten)]
    Client(ClientCommand),
}

#[derive(Debug, Subcommand)]
enum ClientCommand {
    /// Sync with the server once and show the session.
    Status,
    /// Start a focus session.
    Start {
        #[arg(long)]
        subject: Option<String>,
        #[command(flatten)]
        duration: DurationArgs,
    },
    /// Stop the focus session.
    Stop {
        #[arg(long)]
        reason: Option<String>,
    },
    /// Take a break and queue the next session.
    Break {
        /// Minutes (5, 10 or 15, or any custom value).
        #[arg(long)]
        minutes: Option<String>,
        /// Subject of the session after the break.
        #[arg(long)]
        next_subject: Option<String>,
    },
    /// End the break. A reason is required unless the break has run out.
    EndBreak {
        #[arg(long)]
        reason: Option<String>,
    },
    /// Skip the rest of the break.
    Skip,
    /// Keep the session in sync and show a live countdown.
    Watch,
    /// Show or set the stored subject.
    Subject { value: Option<String> },
    /// Show or set the stored duration.
    Duration {
        #[command(flatten)]
        duration: DurationArgs,
    },
    /// Manage blocked domains.
    Blocklist {
        #[command(subcommand)]
        action: BlocklistAction,
    },
}

#[derive(Debug, Args)]
struct DurationArgs {
    /// One of 25m, 50m, "1h 30m", 2h.
    #[arg(long)]
    preset: Option<String>,
    #[arg(long)]
    hours: Option<String>,
    #[arg(long)]
    minutes: Option<String>,
    #[arg(long)]
    seconds: Option<String>,
}

impl From<DurationArgs> for DurationUpdate {
    fn from(args: DurationArgs) -> Self {
        Self {
            preset: args.preset,
            hours: args.hours,
            minutes: args.minutes,
            seconds: args.seconds,
        }
    }
}

#[derive(Debug, Subcommand)]
enum BlocklistAction {
    Add { domain: String },
    Remove { domain: String },
    List,
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOCKIN_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn run() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            error!(%error, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(dispatch(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Relay => relay().await,
        Command::Client(command) => run_client_command(command, cli.json).await,
    }
}

async fn run_client_command(command: ClientCommand, json: bool) -> Result<(), String> {
    let state = load_client_config()
        .and_then(AppState::new)
        .map_err(|error| {
            error!(%error, "failed to initialize client state");
            error.to_string()
        })?;

    match command {
        ClientCommand::Status => {
            let view = refresh_session_impl(&state)
                .await
                .map_err(|error| state.command_error("status", &error))?;
            print_session(&view, json);
            Ok(())
        }
        ClientCommand::Start { subject, duration } => {
            let view = start_session_impl(&state, subject, duration.into())
                .await
                .map_err(|error| state.command_error("start", &error))?;
            print_session(&view, json);
            Ok(())
        }
        ClientCommand::Stop { reason } => {
            let view = stop_session_impl(&state, reason)
                .await
                .map_err(|error| state.command_error("stop", &error))?;
            print_session(&view, json);
            Ok(())
        }
        ClientCommand::Break {
            minutes,
            next_subject,
        } => {
            let view = start_break_impl(&state, minutes, next_subject)
                .await
                .map_err(|error| state.command_error("break", &error))?;
            print_session(&view, json);
            Ok(())
        }
        ClientCommand::EndBreak { reason } => {
            let view = end_break_impl(&state, reason)
                .await
                .map_err(|error| state.command_error("end_break", &error))?;
            print_session(&view, json);
            Ok(())
        }
        ClientCommand::Skip => {
            let view = skip_break_impl(&state)
                .await
                .map_err(|error| state.command_error("skip", &error))?;
            print_session(&view, json);
            Ok(())
        }
        ClientCommand::Watch => watch_session(&state)
            .await
            .map_err(|error| state.command_error("watch", &error)),
        ClientCommand::Subject { value } => {
            let subject = match value {
                Some(value) => set_subject_impl(&state, value),
                None => get_subject_impl(&state),
            }
            .map_err(|error| state.command_error("subject", &error))?;
            print_value(&subject, json, |subject| subject.clone());
            Ok(())
        }
        ClientCommand::Duration { duration } => {
            let update = DurationUpdate::from(duration);
            let view = if update == DurationUpdate::default() {
                get_duration_impl(&state)
            } else {
                set_duration_impl(&state, update)
            }
            .map_err(|error| state.command_error("duration", &error))?;
            print_value(&view, json, render_duration);
            Ok(())
        }
        ClientCommand::Blocklist { action } => {
            let blocklist = match action {
                BlocklistAction::Add { domain } => add_blocked_domain_impl(&state, domain),
                BlocklistAction::Remove { domain } => remove_blocked_domain_impl(&state, domain),
                BlocklistAction::List => list_blocklist_impl(&state),
            }
            .map_err(|error| state.command_error("blocklist", &error))?;
            print_value(&blocklist, json, render_blocklist);
            Ok(())
        }
    }
}

async fn relay() -> Result<(), String> {
    let config = load_relay_config().map_err(|error| {
        error!(%error, "invalid relay configuration");
        error.to_string()
    })?;
    info!(?config, "starting relay");
    application::relay_server::serve(config).await.map_err(|error| {
        error!(%error, "relay stopped with an error");
        error.to_string()
    })
}

async fn watch_session(state: &AppState) -> Result<(), InfraError> {
    let (_visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);
    let sync = watch_session_impl(state, visibility_rx, async {
        let _ = tokio::signal::ctrl_c().await;
    });

    tokio::select! {
        _ = sync => {
            println!();
            Ok(())
        }
        result = render_countdown(state) => result,
    }
}

async fn render_countdown(state: &AppState) -> Result<(), InfraError> {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let view = get_session_impl(state)?;
        print!("\r\x1b[2K{}", render_session(&view));
        std::io::stdout().flush()?;
    }
}

fn print_session(view: &SessionView, json: bool) {
    print_value(view, json, render_session);
}

fn print_value<T, F>(value: &T, json: bool, render: F)
where
    T: Serialize,
    F: Fn(&T) -> String,
{
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(payload) => println!("{payload}"),
            Err(error) => error!(%error, "failed to serialize output"),
        }
    } else {
        println!("{}", render(value));
    }
}

fn render_session(view: &SessionView) -> String {
    match view.status {
        SessionStatus::Idle => "IDLE".to_string(),
        SessionStatus::Focusing => format!(
            "FOCUSING  {}  {}{}  [{:.0}%]",
            view.subject.as_deref().unwrap_or_default(),
            view.countdown,
            if view.overtime { " (overtime)" } else { "" },
            view.progress_percent,
        ),
        SessionStatus::Break => format!(
            "BREAK  {}{}  next: {}",
            view.countdown,
            if view.overtime { " (overtime)" } else { "" },
            view.next_subject.as_deref().unwrap_or_default(),
        ),
    }
}

fn render_duration(view: &DurationView) -> String {
    let presets: Vec<&str> = DURATION_PRESETS.iter().map(|preset| preset.label).collect();
    format!(
        "{}:{}:{}  preset: {}  (presets: {})",
        view.hours,
        view.minutes,
        view.seconds,
        view.active_preset.as_deref().unwrap_or("custom"),
        presets.join(", "),
    )
}

fn render_blocklist(blocklist: &Blocklist) -> String {
    if blocklist.is_empty() {
        return "(empty)".to_string();
    }
    blocklist.as_slice().join("\n")
}
