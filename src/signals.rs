//! Shutdown on SIGINT/SIGTERM

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Flag that flips to true when the process is asked to stop
pub fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    register(&flag)?;
    Ok(flag)
}

#[cfg(unix)]
fn register(flag: &Arc<AtomicBool>) -> Result<()> {
    use anyhow::Context;
    use signal_hook::consts::signal::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(flag))
            .with_context(|| format!("Failed to register handler for signal {signal}"))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn register(_flag: &Arc<AtomicBool>) -> Result<()> {
    Ok(())
}
