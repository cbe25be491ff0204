//! Stdin listener feeding control commands to the surface loop

use anyhow::{Context, Result};
use std::io::{self, BufRead};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, error, info};

/// Spawn a thread that forwards each stdin line. The sender is dropped at
/// end of input, which the receiver sees as a disconnect.
pub fn spawn_listener(sender: Sender<String>) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("control-input".into())
        .spawn(move || {
            info!("Command listener started");
            if let Err(e) = forward_lines(io::stdin().lock(), &sender) {
                error!(error = %e, "Command listener error");
            }
            debug!("Command listener finished");
        })
        .context("Failed to spawn command listener thread")
}

fn forward_lines<R: BufRead>(reader: R, sender: &Sender<String>) -> Result<()> {
    for line in reader.lines() {
        let line = line.context("Failed to read command line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if sender.send(line.to_string()).is_err() {
            // Surface loop is gone
            break;
        }
    }
    Ok(())
}
