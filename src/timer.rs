//! Countdown state machine
//!
//! Run state and timing live in the shared store as independent keys. This
//! module owns the arithmetic that turns them into a remaining-time value and
//! the transitions that rewrite them. Transitions write the `timerState` tag
//! last when entering `Running`/`Paused`, so a reader that sees the new tag
//! also sees the timing field that goes with it.

use tracing::info;

use crate::constants::timer::{MAX_SECONDS_FIELD, RESET_DEFAULT_MINUTES, RESET_DEFAULT_SECONDS};
use crate::constants::timing::MS_PER_SEC;
use crate::store::schema::parse_leading_int;
use crate::store::{SharedState, SharedStore};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl RunState {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "stopped" => Some(RunState::Stopped),
            "running" => Some(RunState::Running),
            "paused" => Some(RunState::Paused),
            _ => None,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            RunState::Stopped => "stopped",
            RunState::Running => "running",
            RunState::Paused => "paused",
        }
    }
}

/// Configured countdown duration
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TimerConfig {
    pub minutes: u32,
    pub seconds: u32,
}

impl TimerConfig {
    /// Minutes below zero become 0, seconds are clamped to the field range
    pub fn new(minutes: i64, seconds: i64) -> Self {
        Self {
            minutes: minutes.clamp(0, i64::from(u32::MAX)) as u32,
            seconds: seconds.clamp(0, i64::from(MAX_SECONDS_FIELD)) as u32,
        }
    }

    /// Build from the raw text of the minutes/seconds input fields
    pub fn from_input(minutes: &str, seconds: &str) -> Self {
        Self::new(
            parse_leading_int(minutes).unwrap_or(0),
            parse_leading_int(seconds).unwrap_or(0),
        )
    }

    /// What Reset leaves behind for the next Start
    pub const fn reset_default() -> Self {
        Self {
            minutes: RESET_DEFAULT_MINUTES,
            seconds: RESET_DEFAULT_SECONDS,
        }
    }

    pub fn target_secs(&self) -> i64 {
        i64::from(self.minutes) * 60 + i64::from(self.seconds)
    }
}

/// Whole seconds elapsed since `origin_ms`, rounded down
pub fn elapsed_secs(origin_ms: i64, now_ms: i64) -> i64 {
    now_ms.saturating_sub(origin_ms).div_euclid(MS_PER_SEC)
}

/// Origin that makes `elapsed_secs(origin, now) == elapsed`, saturating for
/// elapsed counts no clock can reach
pub fn resume_origin(now_ms: i64, elapsed: i64) -> i64 {
    now_ms.saturating_sub(elapsed.saturating_mul(MS_PER_SEC))
}

/// Where a running surface got its origin from
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OriginSource {
    /// Re-derived from `pausedElapsed` (resume without an explicit start)
    PausedElapsed,
    /// Taken as-is from `stateTimestamp`
    Stored,
    /// Neither key usable, continued from the surface's own elapsed count
    LocalElapsed,
}

/// Pick the origin a surface should count from when the shared state says
/// `Running`
pub fn resolve_running_origin(
    paused_elapsed: i64,
    stored_origin: Option<i64>,
    local_elapsed: i64,
    now_ms: i64,
) -> (i64, OriginSource) {
    if paused_elapsed > 0 {
        (resume_origin(now_ms, paused_elapsed), OriginSource::PausedElapsed)
    } else if let Some(origin) = stored_origin {
        (origin, OriginSource::Stored)
    } else {
        (resume_origin(now_ms, local_elapsed), OriginSource::LocalElapsed)
    }
}

/// Every timer key, read in one pass
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimerSnapshot {
    pub config: TimerConfig,
    pub run_state: RunState,
    pub origin_ms: Option<i64>,
    pub paused_elapsed: i64,
}

impl TimerSnapshot {
    /// Elapsed seconds, `None` when stopped or running without an origin yet
    pub fn elapsed_secs(&self, now_ms: i64) -> Option<i64> {
        match self.run_state {
            RunState::Running => self.origin_ms.map(|origin| elapsed_secs(origin, now_ms)),
            RunState::Paused => Some(self.paused_elapsed),
            RunState::Stopped => None,
        }
    }

    /// Remaining seconds, negative in overtime
    pub fn diff_secs(&self, now_ms: i64) -> Option<i64> {
        self.elapsed_secs(now_ms)
            .map(|elapsed| self.config.target_secs().saturating_sub(elapsed))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ToggleOutcome {
    Paused { elapsed_secs: i64 },
    Resumed { origin_ms: i64 },
    NothingToToggle,
}

/// Transitions over the shared timer keys
pub struct TimerStateMachine<'a, S> {
    state: &'a SharedState<S>,
}

impl<'a, S: SharedStore> TimerStateMachine<'a, S> {
    pub fn new(state: &'a SharedState<S>) -> Self {
        Self { state }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            config: self.state.timer_config(),
            run_state: self.state.run_state(),
            origin_ms: self.state.origin_ms(),
            paused_elapsed: self.state.paused_elapsed(),
        }
    }

    /// Start a fresh run of `config` at `now_ms`, returning the origin
    pub fn start(&self, config: TimerConfig, now_ms: i64) -> i64 {
        self.state.write_timer_config(config);
        self.state.clear_paused_elapsed();
        self.state.write_origin_ms(now_ms);
        self.state.write_run_state(RunState::Running);
        info!(
            minutes = config.minutes,
            seconds = config.seconds,
            origin_ms = now_ms,
            "Timer started"
        );
        now_ms
    }

    /// Freeze a running timer. `None` when nothing is running.
    pub fn pause(&self, now_ms: i64) -> Option<i64> {
        if self.state.run_state() != RunState::Running {
            return None;
        }
        let origin = self.state.origin_ms().unwrap_or(now_ms);
        let elapsed = elapsed_secs(origin, now_ms).max(0);
        self.state.write_paused_elapsed(elapsed);
        self.state.write_run_state(RunState::Paused);
        info!(elapsed_secs = elapsed, "Timer paused");
        Some(elapsed)
    }

    /// Continue a paused timer from its accumulated elapsed. `None` when
    /// nothing is paused.
    pub fn resume(&self, now_ms: i64) -> Option<i64> {
        if self.state.run_state() != RunState::Paused {
            return None;
        }
        let elapsed = self.state.paused_elapsed();
        let origin = resume_origin(now_ms, elapsed);
        self.state.write_origin_ms(origin);
        self.state.write_run_state(RunState::Running);
        self.state.clear_paused_elapsed();
        info!(elapsed_secs = elapsed, origin_ms = origin, "Timer resumed");
        Some(origin)
    }

    pub fn toggle_pause(&self, now_ms: i64) -> ToggleOutcome {
        match self.state.run_state() {
            RunState::Running => self
                .pause(now_ms)
                .map_or(ToggleOutcome::NothingToToggle, |elapsed_secs| {
                    ToggleOutcome::Paused { elapsed_secs }
                }),
            RunState::Paused => self
                .resume(now_ms)
                .map_or(ToggleOutcome::NothingToToggle, |origin_ms| {
                    ToggleOutcome::Resumed { origin_ms }
                }),
            RunState::Stopped => ToggleOutcome::NothingToToggle,
        }
    }

    /// Stop and clear timing. The configured duration is left alone.
    pub fn reset(&self) {
        self.state.write_run_state(RunState::Stopped);
        self.state.clear_origin();
        self.state.clear_paused_elapsed();
        info!("Timer reset");
    }
}
