//! Store key layout and typed access
//!
//! This is the only place that knows key names and value encodings. Every
//! other module goes through [`SharedState`], which is also the failure
//! boundary: a read that fails is treated as an absent key and a write that
//! fails is logged and dropped. Nothing here returns an error to the caller.

use std::sync::mpsc::Receiver;
use tracing::{debug, warn};

use super::{SharedStore, StoreChange};
use crate::appearance::{DisplayPreferences, Theme};
use crate::constants::timer::MAX_PAUSED_ELAPSED_SECS;
use crate::timer::{RunState, TimerConfig};

/// Key names, as persisted by both surfaces
pub mod keys {
    pub const TIMER_MINUTES: &str = "timerMinutes";
    pub const TIMER_SECONDS: &str = "timerSeconds";
    pub const TIMER_STATE: &str = "timerState";
    pub const STATE_TIMESTAMP: &str = "stateTimestamp";
    pub const PAUSED_ELAPSED: &str = "pausedElapsed";
    pub const INDEX_DISPLAY: &str = "indexDisplay";
    pub const THEME: &str = "theme";
    pub const COLOR_NORMAL: &str = "timerColorNormal";
    pub const COLOR_OVERTIME: &str = "timerColorOvertime";
    pub const INDEX_FONT_SIZE: &str = "indexFontSize";
    pub const INDEX_FONT_SIZE_UPDATED_AT: &str = "indexFontSizeUpdatedAt";

    /// Older single-color key, read only as a fallback for `COLOR_NORMAL`
    pub const LEGACY_COLOR: &str = "timerColor";

    /// Every key the schema defines, in table order
    pub const ALL: &[&str] = &[
        TIMER_MINUTES,
        TIMER_SECONDS,
        TIMER_STATE,
        STATE_TIMESTAMP,
        PAUSED_ELAPSED,
        INDEX_DISPLAY,
        THEME,
        COLOR_NORMAL,
        COLOR_OVERTIME,
        INDEX_FONT_SIZE,
        INDEX_FONT_SIZE_UPDATED_AT,
        LEGACY_COLOR,
    ];
}

/// What a changed key means to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// `timerState`
    RunState,
    /// `stateTimestamp`, `pausedElapsed`
    Timing,
    /// `timerMinutes`, `timerSeconds`
    Config,
    /// theme, colors, font size
    Preferences,
    /// `indexDisplay`
    Preview,
    Other,
}

impl KeyClass {
    pub fn of(key: &str) -> Self {
        match key {
            keys::TIMER_STATE => KeyClass::RunState,
            keys::STATE_TIMESTAMP | keys::PAUSED_ELAPSED => KeyClass::Timing,
            keys::TIMER_MINUTES | keys::TIMER_SECONDS => KeyClass::Config,
            keys::INDEX_DISPLAY => KeyClass::Preview,
            keys::THEME => KeyClass::Preferences,
            k if k.starts_with("timerColor") || k.starts_with(keys::INDEX_FONT_SIZE) => {
                KeyClass::Preferences
            }
            _ => KeyClass::Other,
        }
    }
}

/// Parse the leading integer of `raw`, ignoring trailing garbage
///
/// `"42"` and `" 42px"` give 42, `"-3"` gives -3, `"abc"` and `""` give None.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let digits_start = usize::from(s.starts_with(['-', '+']));
    let len = s[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if len == 0 {
        return None;
    }
    s[..digits_start + len].parse().ok()
}

/// Parse the leading decimal number of `raw`, ignoring trailing garbage
pub fn parse_leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let mut end = usize::from(s.starts_with(['-', '+']));
    let mut seen_digit = false;
    let mut seen_dot = false;
    for b in s[end..].bytes() {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return None;
    }
    s[..end].trim_end_matches('.').parse().ok()
}

/// Typed view of the shared store
pub struct SharedState<S> {
    store: S,
}

impl<S: SharedStore> SharedState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// True when the backend answers reads at all
    pub fn is_reachable(&self) -> bool {
        self.store.get(keys::TIMER_STATE).is_ok()
    }

    pub fn subscribe(&self) -> Receiver<StoreChange> {
        self.store.subscribe()
    }

    /// Raw read; failures read as absent
    pub fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                debug!(backend = self.store.name(), key, error = %e, "Store read failed, using default");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(backend = self.store.name(), key, error = %e, "Store write dropped");
        }
    }

    fn clear(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(backend = self.store.name(), key, error = %e, "Store remove dropped");
        }
    }

    /// Leading-integer read with 0 for absent or malformed values
    pub fn read_int(&self, key: &str) -> i64 {
        self.read(key)
            .and_then(|raw| parse_leading_int(&raw))
            .unwrap_or(0)
    }

    // Timer configuration

    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig::new(
            self.read_int(keys::TIMER_MINUTES),
            self.read_int(keys::TIMER_SECONDS),
        )
    }

    pub fn write_timer_config(&self, config: TimerConfig) {
        self.write(keys::TIMER_MINUTES, &config.minutes.to_string());
        self.write(keys::TIMER_SECONDS, &config.seconds.to_string());
    }

    // Run state and timing

    /// Absent or unrecognised tags read as `Stopped`
    pub fn run_state(&self) -> RunState {
        self.read(keys::TIMER_STATE)
            .and_then(|tag| RunState::from_tag(&tag))
            .unwrap_or_default()
    }

    pub fn write_run_state(&self, state: RunState) {
        self.write(keys::TIMER_STATE, state.as_tag());
    }

    /// Origin timestamp in epoch ms, `None` when absent or not positive
    pub fn origin_ms(&self) -> Option<i64> {
        Some(self.read_int(keys::STATE_TIMESTAMP)).filter(|ts| *ts > 0)
    }

    pub fn write_origin_ms(&self, origin_ms: i64) {
        self.write(keys::STATE_TIMESTAMP, &origin_ms.to_string());
    }

    pub fn clear_origin(&self) {
        self.clear(keys::STATE_TIMESTAMP);
    }

    /// Seconds accumulated before the last pause, 0 when absent or negative
    pub fn paused_elapsed(&self) -> i64 {
        self.read_int(keys::PAUSED_ELAPSED).clamp(0, MAX_PAUSED_ELAPSED_SECS)
    }

    pub fn write_paused_elapsed(&self, elapsed_secs: i64) {
        self.write(keys::PAUSED_ELAPSED, &elapsed_secs.to_string());
    }

    pub fn clear_paused_elapsed(&self) {
        self.clear(keys::PAUSED_ELAPSED);
    }

    // Rendered preview mirror

    pub fn rendered_preview(&self) -> Option<String> {
        self.read(keys::INDEX_DISPLAY)
    }

    pub fn publish_rendered_preview(&self, text: &str) {
        self.write(keys::INDEX_DISPLAY, text);
    }

    // Display preferences

    pub fn preferences(&self) -> DisplayPreferences {
        let theme = self
            .read(keys::THEME)
            .and_then(|tag| Theme::from_tag(&tag))
            .unwrap_or_default();
        let color_normal = self
            .read(keys::COLOR_NORMAL)
            .or_else(|| self.read(keys::LEGACY_COLOR));
        let color_overtime = self.read(keys::COLOR_OVERTIME);
        let font_size = self
            .read(keys::INDEX_FONT_SIZE)
            .and_then(|raw| parse_leading_float(&raw));
        DisplayPreferences::resolve(theme, color_normal, color_overtime, font_size)
    }

    pub fn write_theme(&self, theme: Theme) {
        self.write(keys::THEME, theme.as_tag());
    }

    pub fn write_color_normal(&self, color: &str) {
        self.write(keys::COLOR_NORMAL, color);
    }

    pub fn write_color_overtime(&self, color: &str) {
        self.write(keys::COLOR_OVERTIME, color);
    }

    pub fn write_font_size(&self, size: f64, now_ms: i64) {
        self.write(keys::INDEX_FONT_SIZE, &size.to_string());
        self.write(keys::INDEX_FONT_SIZE_UPDATED_AT, &now_ms.to_string());
    }
}
