//! Control surface - edits the duration, drives the timer, sets appearance

pub mod command;
pub mod controller;
mod input;

pub use command::Command;
pub use controller::ControlController;

use anyhow::Result;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use tracing::{info, warn};

use crate::appearance::Theme;
use crate::clock;
use crate::config::Timings;
use crate::constants::timing::IDLE_WAIT_MS;
use crate::store::{SharedState, SharedStore};
use crate::timer::ToggleOutcome;

/// Result of applying one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to show the user
    Message(String),
    Quit,
}

/// Apply a parsed command to the controller
pub fn execute<S: SharedStore>(
    control: &mut ControlController<S>,
    command: Command,
    now_ms: i64,
) -> Reply {
    let status = |control: &ControlController<S>| {
        control.status(now_ms).unwrap_or_default().to_string()
    };

    let message = match command {
        Command::Minutes(text) => {
            control.set_minutes_input(&text);
            format!("minutes field: {text}")
        }
        Command::Seconds(text) => {
            control.set_seconds_input(&text);
            format!("seconds field: {text}")
        }
        Command::Save(fields) => {
            apply_fields(control, fields);
            control.save(now_ms);
            format!("{} -> {}", status(control), control.preview().text)
        }
        Command::Start(fields) => {
            apply_fields(control, fields);
            control.start(now_ms);
            format!("{} -> {}", status(control), control.preview().text)
        }
        Command::Pause => {
            let outcome = control.toggle_pause(now_ms);
            match outcome {
                ToggleOutcome::NothingToToggle => status(control),
                _ => format!("{} [button: {}]", status(control), control.pause_label()),
            }
        }
        Command::Reset => {
            control.reset(now_ms);
            status(control)
        }
        Command::Dark(on) => {
            control.set_theme(if on { Theme::Dark } else { Theme::Light }, now_ms);
            status(control)
        }
        Command::ToggleTheme => {
            let theme = control.toggle_theme(now_ms);
            format!("{} ({})", status(control), theme.as_tag())
        }
        Command::ColorNormal(raw) => {
            control.set_color_normal(&raw, now_ms);
            status(control)
        }
        Command::ColorOvertime(raw) => {
            control.set_color_overtime(&raw, now_ms);
            status(control)
        }
        Command::FontLarger => {
            let size = control.change_font_size(1, now_ms);
            format!("{} ({size})", status(control))
        }
        Command::FontSmaller => {
            let size = control.change_font_size(-1, now_ms);
            format!("{} ({size})", status(control))
        }
        Command::Show => describe(control),
        Command::Help => command::HELP.to_string(),
        Command::Quit => return Reply::Quit,
    };
    Reply::Message(message)
}

fn apply_fields<S: SharedStore>(control: &mut ControlController<S>, fields: Option<(String, String)>) {
    if let Some((minutes, seconds)) = fields {
        control.set_minutes_input(&minutes);
        control.set_seconds_input(&seconds);
    }
}

/// Multi-line summary for the `show` command
pub fn describe<S: SharedStore>(control: &ControlController<S>) -> String {
    let (minutes, seconds) = control.inputs();
    let saved = control.saved_config();
    let prefs = control.preferences();
    let mut out = String::new();
    // Writing to a String can't fail
    let _ = writeln!(out, "preview:  {} ({})", control.preview().text, control.mode().describe());
    let _ = writeln!(out, "fields:   {minutes} min, {seconds} sec");
    let _ = writeln!(out, "saved:    {:02}:{:02}", saved.minutes, saved.seconds);
    let _ = writeln!(out, "timer:    {}", control.run_state().as_tag());
    let _ = writeln!(
        out,
        "display:  {}",
        control.display_mirror().unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(out, "button:   {}", control.pause_label());
    let _ = write!(
        out,
        "theme:    {} normal {} overtime {} font {}",
        prefs.theme.as_tag(),
        prefs.color_normal,
        prefs.color_overtime,
        prefs.font_size
    );
    out
}

/// Run the interactive control prompt until quit, end of input or `shutdown`
pub fn run_control_surface<S: SharedStore>(
    store: S,
    timings: &Timings,
    shutdown: &AtomicBool,
) -> Result<()> {
    let state = SharedState::new(store);
    let changes = state.subscribe();
    let mut control = ControlController::new(state, timings);
    control.initialize(clock::now_ms());

    let (line_tx, line_rx) = mpsc::channel();
    let _listener = input::spawn_listener(line_tx)?;

    info!("Control surface running");
    println!("{}", describe(&control));
    println!("Type 'help' for commands.");

    let mut shown = control.preview().text.clone();
    while !shutdown.load(Ordering::SeqCst) {
        let wait = clock::wait_until(control.next_deadline(), IDLE_WAIT_MS);
        match line_rx.recv_timeout(wait) {
            Ok(line) => match Command::parse(&line) {
                Ok(command) => match execute(&mut control, command, clock::now_ms()) {
                    Reply::Message(text) => println!("{text}"),
                    Reply::Quit => break,
                },
                Err(e) => println!("error: {e:#}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("End of input, leaving control surface");
                break;
            }
        }

        while let Ok(change) = changes.try_recv() {
            control.handle_change(&change);
        }

        let now = clock::now_ms();
        if control.tick(now) && control.preview().text != shown {
            shown = control.preview().text.clone();
            println!("preview {shown}");
        }
    }

    info!("Control surface shutting down");
    Ok(())
}

/// Run a single command against the store and print the reply
pub fn send_command<S: SharedStore>(store: S, timings: &Timings, words: &[String]) -> Result<()> {
    let command = Command::parse(&words.join(" "))?;
    let mut control = ControlController::new(SharedState::new(store), timings);
    let now = clock::now_ms();
    control.initialize(now);

    match execute(&mut control, command, now) {
        Reply::Message(text) => println!("{text}"),
        Reply::Quit => warn!("'quit' has no effect outside the interactive prompt"),
    }
    Ok(())
}
