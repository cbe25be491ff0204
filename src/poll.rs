//! Periodic render tick owned by a surface
//!
//! A [`PollLoop`] is the surface's only tick schedule. Starting it while it is
//! already active replaces the old schedule, so a surface can never end up
//! with two overlapping loops.

use tracing::debug;

#[derive(Debug)]
pub struct PollLoop {
    name: &'static str,
    period_ms: i64,
    next_due_ms: Option<i64>,
}

impl PollLoop {
    pub fn new(name: &'static str, period_ms: u64) -> Self {
        Self {
            name,
            period_ms: (period_ms as i64).max(1),
            next_due_ms: None,
        }
    }

    /// (Re)start ticking, first tick one period from `now_ms`
    pub fn start(&mut self, now_ms: i64) {
        if self.next_due_ms.is_some() {
            debug!(poll = self.name, "Replacing active poll loop");
        }
        self.next_due_ms = Some(now_ms + self.period_ms);
    }

    pub fn cancel(&mut self) {
        if self.next_due_ms.take().is_some() {
            debug!(poll = self.name, "Poll loop cancelled");
        }
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.next_due_ms.is_some()
    }

    pub fn next_due(&self) -> Option<i64> {
        self.next_due_ms
    }

    /// True when a tick is due at `now_ms`; schedules the following tick.
    /// Ticks missed during a stall collapse into one.
    pub fn fire(&mut self, now_ms: i64) -> bool {
        let Some(due) = self.next_due_ms else {
            return false;
        };
        if now_ms < due {
            return false;
        }
        let mut next = due + self.period_ms;
        if next <= now_ms {
            next = now_ms + self.period_ms;
        }
        self.next_due_ms = Some(next);
        true
    }
}
