//! Display surface - shows the countdown, adopting the shared timer state

pub mod controller;
pub mod terminal;

pub use controller::{DisplayController, FrameSink};
pub use terminal::TerminalSink;

use anyhow::Result;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use tracing::{error, info, warn};

use crate::clock;
use crate::config::Timings;
use crate::constants::timing::IDLE_WAIT_MS;
use crate::store::{SharedState, SharedStore};

/// Run the display surface until `shutdown` is set
pub fn run_display_surface<S: SharedStore>(
    store: S,
    timings: &Timings,
    shutdown: &AtomicBool,
) -> Result<()> {
    let state = SharedState::new(store);
    let changes = state.subscribe();
    let sink = TerminalSink::new(io::stdout());
    let mut display = DisplayController::new(state, sink, timings);

    display.initialize(clock::now_ms());
    info!("Display surface running");

    let mut notifications = true;
    while !shutdown.load(Ordering::SeqCst) {
        let wait = clock::wait_until(display.next_deadline(), IDLE_WAIT_MS);

        if notifications {
            match changes.recv_timeout(wait) {
                Ok(change) => {
                    // Handle a burst of writes in one pass before ticking
                    display.handle_change(&change, clock::now_ms());
                    while let Ok(change) = changes.try_recv() {
                        display.handle_change(&change, clock::now_ms());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Store notifications ended, display falls back to re-reading the store");
                    notifications = false;
                }
            }
        } else {
            thread::sleep(wait);
        }

        display.tick(clock::now_ms());
    }

    info!("Display surface shutting down");
    display
        .finish()
        .inspect_err(|e| error!(error = %e, "Failed to restore terminal"))
}
