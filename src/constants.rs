//! Application-wide constants
//!
//! This module contains the magic numbers and string literals shared by both
//! surfaces, providing a single source of truth for constant values.
//! Store key names live in `store::schema::keys`, not here.

/// Scheduling constants (milliseconds)
pub mod timing {
    /// Period of the render tick on both surfaces
    pub const TICK_INTERVAL_MS: u64 = 100;

    /// How often the file store watcher rescans the store directory
    pub const WATCH_INTERVAL_MS: u64 = 50;

    /// Lifetime of the one-shot overtime pulse
    pub const OVERTIME_PULSE_MS: u64 = 900;

    /// Lifetime of the control surface's "nothing to pause" button feedback
    pub const BUTTON_PULSE_MS: u64 = 300;

    /// Default lifetime of a control surface status message
    pub const STATUS_MS: u64 = 2000;

    /// Lifetime of the "no active timer" status message
    pub const NOTHING_TO_TOGGLE_STATUS_MS: u64 = 1800;

    /// Longest a surface loop blocks before rechecking for shutdown
    pub const IDLE_WAIT_MS: u64 = 250;

    /// How often the display re-reads the store behind its notifications
    pub const RESYNC_INTERVAL_MS: u64 = 500;

    /// Milliseconds per second, for origin arithmetic
    pub const MS_PER_SEC: i64 = 1000;
}

/// Timer configuration defaults
pub mod timer {
    /// Duration Reset writes back so the next Start has something to run
    pub const RESET_DEFAULT_MINUTES: u32 = 1;
    pub const RESET_DEFAULT_SECONDS: u32 = 0;

    /// Largest value accepted for the seconds field
    pub const MAX_SECONDS_FIELD: u32 = 59;

    /// Largest `pausedElapsed` whose origin still fits in epoch ms
    pub const MAX_PAUSED_ELAPSED_SECS: i64 = i64::MAX / super::timing::MS_PER_SEC;

    /// Preview shown when nothing is configured or after Reset
    pub const ZERO_PREVIEW: &str = "00:00";
}

/// Appearance defaults shared by both surfaces
pub mod appearance {
    pub const DEFAULT_COLOR_NORMAL: &str = "#111111";
    pub const DEFAULT_COLOR_OVERTIME: &str = "#ff1f1f";

    /// Display font size, percent of viewport width
    pub const DEFAULT_FONT_SIZE: f64 = 60.0;
    pub const MIN_FONT_SIZE: f64 = 20.0;
    pub const MAX_FONT_SIZE: f64 = 200.0;

    /// Increment used by the font size buttons
    pub const FONT_SIZE_STEP: f64 = 10.0;
}

/// Control surface labels and status messages
pub mod labels {
    pub const PAUSE: &str = "Pause Timer";
    pub const CONTINUE: &str = "Continue Timer";

    pub const SAVED: &str = "Settings saved (timer not started)";
    pub const STARTED: &str = "Timer started";
    pub const PAUSED: &str = "Timer paused";
    pub const CONTINUED: &str = "Timer continued";
    pub const NOTHING_TO_TOGGLE: &str = "No active timer to pause/continue";
    pub const RESET: &str = "Settings saved to 01:00; preview cleared to 00:00";
    pub const FONT_UPDATED: &str = "Index font size updated";
    pub const THEME_UPDATED: &str = "Theme updated";
    pub const COLOR_UPDATED: &str = "Timer color updated";
    pub const INVALID_COLOR: &str = "Invalid color, expected #rrggbb";
}

/// Filesystem locations
pub mod paths {
    /// Directory under the platform config/data dirs
    pub const APP_DIR: &str = "countdown-sync";

    /// Config file name inside the config directory
    pub const CONFIG_FILENAME: &str = "config.json";

    /// Store directory name inside the data directory
    pub const STORE_DIRNAME: &str = "store";

    /// Suffix for in-flight store writes
    pub const TEMP_SUFFIX: &str = "tmp";
}
