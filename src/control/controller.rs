//! Control surface state: input fields, preview lock and commands

use tracing::{debug, info, warn};

use crate::appearance::{DisplayPreferences, Theme, clamp_font_size};
use crate::color::HexColor;
use crate::config::Timings;
use crate::constants::appearance::FONT_SIZE_STEP;
use crate::constants::labels;
use crate::constants::timer::ZERO_PREVIEW;
use crate::constants::timing::{BUTTON_PULSE_MS, NOTHING_TO_TOGGLE_STATUS_MS};
use crate::poll::PollLoop;
use crate::render::{Frame, Pulse, format_countdown};
use crate::store::{KeyClass, SharedState, SharedStore, StoreChange};
use crate::timer::{RunState, TimerConfig, TimerStateMachine, ToggleOutcome};

/// What the control surface's own preview shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewMode {
    /// Follows the shared timer, like the display does
    Mirroring,
    /// Shows the saved duration, ignoring whatever is running
    LockedToSaved,
    /// Shows 00:00 until the next Save or Start
    LockedToZero,
}

impl PreviewMode {
    pub fn describe(self) -> &'static str {
        match self {
            PreviewMode::Mirroring => "mirroring shared timer",
            PreviewMode::LockedToSaved => "locked to saved duration",
            PreviewMode::LockedToZero => "locked to 00:00",
        }
    }
}

/// Transient message that disappears after its deadline
#[derive(Debug, Default)]
pub struct StatusLine {
    text: Option<&'static str>,
    until_ms: i64,
}

impl StatusLine {
    pub fn set(&mut self, text: &'static str, now_ms: i64, ttl_ms: u64) {
        self.text = Some(text);
        self.until_ms = now_ms + ttl_ms as i64;
    }

    pub fn current(&self, now_ms: i64) -> Option<&'static str> {
        self.text.filter(|_| now_ms < self.until_ms)
    }
}

pub struct ControlController<S> {
    state: SharedState<S>,
    minutes_input: String,
    seconds_input: String,
    /// Last duration seen in or written to the store
    saved: TimerConfig,
    mode: PreviewMode,
    poll: PollLoop,
    preview: Frame,
    prefs: DisplayPreferences,
    status: StatusLine,
    status_ms: u64,
    pause_label: &'static str,
    pause_feedback: Pulse,
}

impl<S: SharedStore> ControlController<S> {
    pub fn new(state: SharedState<S>, timings: &Timings) -> Self {
        Self {
            state,
            minutes_input: String::new(),
            seconds_input: String::new(),
            saved: TimerConfig::default(),
            mode: PreviewMode::LockedToSaved,
            poll: PollLoop::new("control", timings.tick_interval_ms),
            preview: Frame::new(ZERO_PREVIEW, false, false),
            prefs: DisplayPreferences::default(),
            status: StatusLine::default(),
            status_ms: timings.status_ms,
            pause_label: labels::PAUSE,
            pause_feedback: Pulse::new(BUTTON_PULSE_MS),
        }
    }

    /// Load the saved duration into the fields and lock the preview to it.
    /// A timer running elsewhere is left alone.
    pub fn initialize(&mut self, now_ms: i64) {
        self.prefs = self.state.preferences();
        self.saved = self.state.timer_config();
        self.minutes_input = self.saved.minutes.to_string();
        self.seconds_input = self.saved.seconds.to_string();
        self.mode = PreviewMode::LockedToSaved;
        if self.state.run_state() == RunState::Paused {
            self.pause_label = labels::CONTINUE;
        }
        self.poll.start(now_ms);
        self.refresh_preview(now_ms);
        debug!(minutes = self.saved.minutes, seconds = self.saved.seconds, "Control surface initialized");
    }

    pub fn set_minutes_input(&mut self, text: &str) {
        self.minutes_input = text.to_string();
    }

    pub fn set_seconds_input(&mut self, text: &str) {
        self.seconds_input = text.to_string();
    }

    pub fn inputs(&self) -> (&str, &str) {
        (&self.minutes_input, &self.seconds_input)
    }

    fn input_config(&self) -> TimerConfig {
        TimerConfig::from_input(&self.minutes_input, &self.seconds_input)
    }

    /// Persist the fields as the duration without touching the run state
    pub fn save(&mut self, now_ms: i64) -> TimerConfig {
        let config = self.input_config();
        self.state.write_timer_config(config);
        self.saved = config;
        self.mode = PreviewMode::LockedToSaved;
        self.refresh_preview(now_ms);
        self.status.set(labels::SAVED, now_ms, self.status_ms);
        info!(minutes = config.minutes, seconds = config.seconds, "Duration saved");
        config
    }

    /// Start a fresh run from the fields
    pub fn start(&mut self, now_ms: i64) -> TimerConfig {
        let config = self.input_config();
        TimerStateMachine::new(&self.state).start(config, now_ms);
        self.saved = config;
        self.mode = PreviewMode::Mirroring;
        self.pause_label = labels::PAUSE;
        self.poll.start(now_ms);
        self.refresh_preview(now_ms);
        self.status.set(labels::STARTED, now_ms, self.status_ms);
        config
    }

    pub fn toggle_pause(&mut self, now_ms: i64) -> ToggleOutcome {
        let outcome = TimerStateMachine::new(&self.state).toggle_pause(now_ms);
        match outcome {
            ToggleOutcome::Paused { .. } => {
                self.pause_label = labels::CONTINUE;
                self.status.set(labels::PAUSED, now_ms, self.status_ms);
            }
            ToggleOutcome::Resumed { .. } => {
                self.pause_label = labels::PAUSE;
                self.status.set(labels::CONTINUED, now_ms, self.status_ms);
            }
            ToggleOutcome::NothingToToggle => {
                self.pause_feedback.trigger(now_ms);
                self.status
                    .set(labels::NOTHING_TO_TOGGLE, now_ms, NOTHING_TO_TOGGLE_STATUS_MS);
                warn!("Pause requested with no active timer");
            }
        }
        self.refresh_preview(now_ms);
        outcome
    }

    /// Stop the timer, leave 1:00 as the next duration and show 00:00
    pub fn reset(&mut self, now_ms: i64) {
        let next = TimerConfig::reset_default();
        // Config first so the run-state change is the last thing the display sees
        self.state.write_timer_config(next);
        TimerStateMachine::new(&self.state).reset();
        self.saved = next;
        self.minutes_input = next.minutes.to_string();
        self.seconds_input = next.seconds.to_string();
        self.mode = PreviewMode::LockedToZero;
        self.pause_label = labels::PAUSE;
        self.refresh_preview(now_ms);
        self.status.set(labels::RESET, now_ms, self.status_ms);
    }

    pub fn set_theme(&mut self, theme: Theme, now_ms: i64) {
        self.state.write_theme(theme);
        self.prefs.theme = theme;
        self.status.set(labels::THEME_UPDATED, now_ms, self.status_ms);
    }

    pub fn toggle_theme(&mut self, now_ms: i64) -> Theme {
        let theme = self.prefs.theme.toggled();
        self.set_theme(theme, now_ms);
        theme
    }

    /// Returns false, writing nothing, when `raw` is not a hex color
    pub fn set_color_normal(&mut self, raw: &str, now_ms: i64) -> bool {
        let Some(color) = self.accept_color(raw, now_ms) else {
            return false;
        };
        self.state.write_color_normal(&color.to_string());
        self.prefs.color_normal = color;
        true
    }

    pub fn set_color_overtime(&mut self, raw: &str, now_ms: i64) -> bool {
        let Some(color) = self.accept_color(raw, now_ms) else {
            return false;
        };
        self.state.write_color_overtime(&color.to_string());
        self.prefs.color_overtime = color;
        true
    }

    fn accept_color(&mut self, raw: &str, now_ms: i64) -> Option<HexColor> {
        match HexColor::parse(raw) {
            Some(color) => {
                self.status.set(labels::COLOR_UPDATED, now_ms, self.status_ms);
                Some(color)
            }
            None => {
                self.status.set(labels::INVALID_COLOR, now_ms, self.status_ms);
                None
            }
        }
    }

    /// Step the display font size by `steps` increments; returns the new size
    pub fn change_font_size(&mut self, steps: i32, now_ms: i64) -> f64 {
        let current = self.state.preferences().font_size;
        let size = clamp_font_size(current + f64::from(steps) * FONT_SIZE_STEP);
        self.state.write_font_size(size, now_ms);
        self.prefs.font_size = size;
        self.status.set(labels::FONT_UPDATED, now_ms, self.status_ms);
        size
    }

    /// Advance the preview if a tick is due. True when the preview changed.
    pub fn tick(&mut self, now_ms: i64) -> bool {
        let feedback_done = self.pause_feedback.take_expired(now_ms);
        let ticked = self.poll.fire(now_ms) && self.refresh_preview(now_ms);
        ticked || feedback_done
    }

    pub fn next_deadline(&self) -> Option<i64> {
        match (self.poll.next_due(), self.pause_feedback.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Only preference and config keys matter here; run state is read by
    /// polling, and only while mirroring
    pub fn handle_change(&mut self, change: &StoreChange) {
        match KeyClass::of(&change.key) {
            KeyClass::Preferences => {
                self.prefs = self.state.preferences();
                debug!(key = %change.key, "Control surface reapplied preferences");
            }
            KeyClass::Config => self.saved = self.state.timer_config(),
            _ => {}
        }
    }

    fn refresh_preview(&mut self, now_ms: i64) -> bool {
        let frame = match self.mode {
            PreviewMode::LockedToZero => Frame::new(ZERO_PREVIEW, false, false),
            PreviewMode::LockedToSaved => self.saved_frame(),
            PreviewMode::Mirroring => {
                let snapshot = TimerStateMachine::new(&self.state).snapshot();
                match snapshot.diff_secs(now_ms) {
                    Some(diff) => Frame::new(format_countdown(diff), diff < 0, false),
                    // Not started yet, or stopped elsewhere
                    None => self.saved_frame(),
                }
            }
        };
        let changed = frame != self.preview;
        self.preview = frame;
        changed
    }

    fn saved_frame(&self) -> Frame {
        Frame::new(format_countdown(self.saved.target_secs()), false, false)
    }

    pub fn preview(&self) -> &Frame {
        &self.preview
    }

    pub fn mode(&self) -> PreviewMode {
        self.mode
    }

    pub fn status(&self, now_ms: i64) -> Option<&'static str> {
        self.status.current(now_ms)
    }

    pub fn pause_label(&self) -> &'static str {
        self.pause_label
    }

    /// True while the "nothing to pause" feedback is showing
    #[cfg(test)]
    pub fn pause_feedback_active(&self, now_ms: i64) -> bool {
        self.pause_feedback.is_active(now_ms)
    }

    /// What the display last rendered. Informational only.
    pub fn display_mirror(&self) -> Option<String> {
        self.state.rendered_preview()
    }

    pub fn saved_config(&self) -> TimerConfig {
        self.saved
    }

    pub fn run_state(&self) -> RunState {
        self.state.run_state()
    }

    pub fn preferences(&self) -> &DisplayPreferences {
        &self.prefs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::keys;
    use crate::store::MemoryHub;
    use crate::store::memory::MemoryStore;

    const T0: i64 = 1_700_000_000_000;

    fn controller() -> (MemoryHub, SharedState<MemoryStore>, ControlController<MemoryStore>) {
        let hub = MemoryHub::new();
        let other = SharedState::new(hub.context());
        let control = ControlController::new(SharedState::new(hub.context()), &Timings::default());
        (hub, other, control)
    }

    #[test]
    fn test_initial_load_locks_to_saved() {
        let (_hub, other, mut control) = controller();
        other.write_timer_config(TimerConfig::new(4, 5));
        TimerStateMachine::new(&other).start(TimerConfig::new(9, 0), T0);
        other.write_timer_config(TimerConfig::new(4, 5));

        control.initialize(T0 + 1000);
        assert_eq!(control.mode(), PreviewMode::LockedToSaved);
        assert_eq!(control.inputs(), ("4", "5"));
        assert_eq!(control.preview().text, "04:05");
        // Loading never disturbs a running timer
        assert_eq!(other.run_state(), RunState::Running);
    }

    #[test]
    fn test_save_locks_preview_against_running_timer() {
        let (_hub, other, mut control) = controller();
        control.initialize(T0);
        TimerStateMachine::new(&other).start(TimerConfig::new(5, 0), T0);

        control.set_minutes_input("2");
        control.set_seconds_input("0");
        control.save(T0 + 1000);
        assert_eq!(control.preview().text, "02:00");
        assert_eq!(control.status(T0 + 1000), Some(labels::SAVED));

        for t in (T0 + 1100..T0 + 10_000).step_by(100) {
            control.tick(t);
        }
        assert_eq!(control.preview().text, "02:00");
        // Save leaves the running timer alone
        assert_eq!(other.run_state(), RunState::Running);
        assert_eq!(other.origin_ms(), Some(T0));
    }

    #[test]
    fn test_start_uses_fields_and_mirrors() {
        let (_hub, other, mut control) = controller();
        control.initialize(T0);
        control.set_minutes_input("0");
        control.set_seconds_input("90");

        let config = control.start(T0);
        assert_eq!(config, TimerConfig::new(0, 59));
        assert_eq!(control.mode(), PreviewMode::Mirroring);
        assert_eq!(other.timer_config(), config);
        assert_eq!(other.read(keys::PAUSED_ELAPSED), None);

        control.tick(T0 + 10_000);
        assert_eq!(control.preview().text, "00:49");
        control.tick(T0 + 60_000);
        assert_eq!(control.preview().text, "-00:01");
        assert!(control.preview().overtime);
    }

    #[test]
    fn test_mirroring_without_origin_shows_saved() {
        let (_hub, other, mut control) = controller();
        control.initialize(T0);
        control.set_minutes_input("1");
        control.start(T0);
        other.clear_origin();

        control.tick(T0 + 5000);
        assert_eq!(control.preview().text, "01:00");
    }

    #[test]
    fn test_pause_toggle_labels() {
        let (_hub, other, mut control) = controller();
        control.initialize(T0);
        control.set_minutes_input("1");
        control.start(T0);

        assert_eq!(
            control.toggle_pause(T0 + 10_000),
            ToggleOutcome::Paused { elapsed_secs: 10 }
        );
        assert_eq!(control.pause_label(), labels::CONTINUE);
        assert_eq!(other.paused_elapsed(), 10);
        control.tick(T0 + 25_000);
        assert_eq!(control.preview().text, "00:50");

        assert_eq!(
            control.toggle_pause(T0 + 30_000),
            ToggleOutcome::Resumed { origin_ms: T0 + 20_000 }
        );
        assert_eq!(control.pause_label(), labels::PAUSE);
        assert_eq!(control.status(T0 + 30_000), Some(labels::CONTINUED));
    }

    #[test]
    fn test_nothing_to_toggle() {
        let (hub, _other, mut control) = controller();
        control.initialize(T0);
        let before = hub.snapshot();

        assert_eq!(control.toggle_pause(T0), ToggleOutcome::NothingToToggle);
        assert_eq!(hub.snapshot(), before);
        assert_eq!(control.status(T0 + 1799), Some(labels::NOTHING_TO_TOGGLE));
        assert_eq!(control.status(T0 + 1800), None);
        assert!(control.pause_feedback_active(T0 + 299));
        assert!(!control.pause_feedback_active(T0 + 300));
    }

    #[test]
    fn test_reset_decouples_preview_from_next_duration() {
        let (_hub, other, mut control) = controller();
        control.initialize(T0);
        control.set_minutes_input("7");
        control.start(T0);

        control.reset(T0 + 3000);
        assert_eq!(control.preview().text, "00:00");
        assert_eq!(control.mode(), PreviewMode::LockedToZero);
        assert_eq!(control.inputs(), ("1", "0"));
        assert_eq!(other.timer_config(), TimerConfig::new(1, 0));
        assert_eq!(other.run_state(), RunState::Stopped);
        assert_eq!(other.origin_ms(), None);

        control.tick(T0 + 3100);
        assert_eq!(control.preview().text, "00:00");

        control.start(T0 + 4000);
        assert_eq!(control.preview().text, "01:00");
    }

    #[test]
    fn test_status_expires() {
        let (_hub, _other, mut control) = controller();
        control.initialize(T0);
        control.save(T0);
        assert_eq!(control.status(T0 + 1999), Some(labels::SAVED));
        assert_eq!(control.status(T0 + 2000), None);
    }

    #[test]
    fn test_font_size_steps_and_clamps() {
        let (_hub, other, mut control) = controller();
        control.initialize(T0);

        assert_eq!(control.change_font_size(1, T0), 70.0);
        assert_eq!(other.preferences().font_size, 70.0);
        assert_eq!(other.read(keys::INDEX_FONT_SIZE_UPDATED_AT), Some(T0.to_string()));

        for _ in 0..20 {
            control.change_font_size(1, T0);
        }
        assert_eq!(control.change_font_size(1, T0), 200.0);
        for _ in 0..30 {
            control.change_font_size(-1, T0);
        }
        assert_eq!(other.preferences().font_size, 20.0);
    }

    #[test]
    fn test_invalid_color_not_written() {
        let (_hub, other, mut control) = controller();
        control.initialize(T0);

        assert!(!control.set_color_overtime("blood", T0));
        assert_eq!(other.read(keys::COLOR_OVERTIME), None);
        assert_eq!(control.status(T0), Some(labels::INVALID_COLOR));

        assert!(control.set_color_overtime("#0F0", T0));
        assert_eq!(other.read(keys::COLOR_OVERTIME).as_deref(), Some("#00ff00"));
    }

    #[test]
    fn test_theme_and_external_preference_change() {
        let (_hub, other, mut control) = controller();
        let changes = control.state.subscribe();
        control.initialize(T0);

        assert_eq!(control.toggle_theme(T0), Theme::Dark);
        assert_eq!(other.preferences().theme, Theme::Dark);

        other.write_color_normal("#123456");
        while let Ok(change) = changes.try_recv() {
            control.handle_change(&change);
        }
        assert_eq!(control.preferences().color_normal.to_string(), "#123456");
    }

    #[test]
    fn test_display_mirror_is_informational() {
        let (_hub, other, mut control) = controller();
        control.initialize(T0);
        other.publish_rendered_preview("-00:07");

        assert_eq!(control.display_mirror().as_deref(), Some("-00:07"));
        assert_eq!(control.preview().text, "00:00");
    }
}
