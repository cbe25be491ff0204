#![forbid(unsafe_code)]

mod appearance;
mod clock;
mod color;
mod config;
mod constants;
mod control;
mod display;
mod poll;
mod render;
mod signals;
mod store;
mod timer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use config::AppConfig;
use store::schema::keys;
use store::{FileStore, MemoryHub, SharedState, SharedStore};

#[derive(Parser, Debug)]
#[command(version, about = "Countdown timer shared between a display and a control surface")]
struct Cli {
    /// Shared store directory (overrides the config file)
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Show the countdown, following the shared timer
    Display,
    /// Interactive prompt that sets and drives the timer
    Control,
    /// Run one control command and exit, e.g. `send start 5 0`
    Send {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print every shared key and its raw value
    Inspect,
}

fn parse_level(raw: &str) -> TraceLevel {
    match raw.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "info" => TraceLevel::INFO,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::WARN,
    }
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    // LOG_LEVEL wins over the config file
    let raw = std::env::var("LOG_LEVEL").unwrap_or_else(|_| config.log_level.clone());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&raw))
        // stdout belongs to the surfaces
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

fn run_mode<S: SharedStore>(mode: Mode, store: S, config: &AppConfig) -> Result<()> {
    let timings = config.timings();
    match mode {
        Mode::Display => {
            let shutdown = signals::shutdown_flag()?;
            display::run_display_surface(store, &timings, &shutdown)
        }
        Mode::Control => {
            let shutdown = signals::shutdown_flag()?;
            control::run_control_surface(store, &timings, &shutdown)
        }
        Mode::Send { command } => control::send_command(store, &timings, &command),
        Mode::Inspect => {
            let state = SharedState::new(store);
            for key in keys::ALL {
                let value = state.read(key);
                println!("{key:<24} {}", value.as_deref().unwrap_or("-"));
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path)?;
    if let Some(dir) = cli.store {
        config.store_dir = Some(dir);
    }
    init_tracing(&config)?;

    let store_dir = config.store_dir();
    match FileStore::open(&store_dir, Duration::from_millis(config.watch_interval_ms)) {
        Ok(store) => {
            info!(path = %store_dir.display(), "Opened shared store");
            run_mode(cli.command, store, &config)
        }
        Err(e) => {
            // Nothing is shared with other processes, but the surface still works
            warn!(
                path = %store_dir.display(),
                error = %e,
                "Shared store unavailable, running in memory-only mode"
            );
            let hub = MemoryHub::new();
            run_mode(cli.command, hub.context(), &config)
        }
    }
}
