//! Display surface state and reconciliation
//!
//! The display never edits the timer. It adopts whatever the shared store
//! says, re-deriving everything from scratch on each relevant notification,
//! and ticks the countdown locally while running.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::appearance::DisplayPreferences;
use crate::config::Timings;
use crate::constants::timer::ZERO_PREVIEW;
use crate::constants::timing::RESYNC_INTERVAL_MS;
use crate::poll::PollLoop;
use crate::render::{Frame, OvertimeEdge, Pulse, format_countdown};
use crate::store::{KeyClass, SharedState, SharedStore, StoreChange};
use crate::timer::{
    OriginSource, RunState, TimerSnapshot, TimerStateMachine, elapsed_secs, resolve_running_origin,
};

/// Receives every frame the display renders
pub trait FrameSink {
    fn present(&mut self, frame: &Frame, prefs: &DisplayPreferences) -> Result<()>;

    /// Called once when the surface shuts down
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Why a reconciliation runs; only matters for what a stopped timer shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Surface just loaded
    Initial,
    /// `timerState` changed
    RunState,
    /// `stateTimestamp` or `pausedElapsed` changed
    Timing,
    /// `timerMinutes` or `timerSeconds` changed
    Config,
}

pub struct DisplayController<S, K> {
    state: SharedState<S>,
    sink: K,
    poll: PollLoop,
    /// Re-reads the store in case a notification never arrived
    resync: PollLoop,
    edge: OvertimeEdge,
    pulse: Pulse,
    prefs: DisplayPreferences,
    is_running: bool,
    /// True from the first running frame until the timer stops
    in_run: bool,
    origin_ms: i64,
    target_secs: i64,
    /// Last elapsed seconds this surface computed, used when the store has
    /// no usable timing
    elapsed_secs: i64,
    frame: Option<Frame>,
    /// Timer keys as of the last reconcile, including our own publish-back
    adopted: Option<TimerSnapshot>,
    pulses_fired: u32,
}

impl<S: SharedStore, K: FrameSink> DisplayController<S, K> {
    pub fn new(state: SharedState<S>, sink: K, timings: &Timings) -> Self {
        Self {
            state,
            sink,
            poll: PollLoop::new("display", timings.tick_interval_ms),
            resync: PollLoop::new("display-resync", RESYNC_INTERVAL_MS),
            edge: OvertimeEdge::default(),
            pulse: Pulse::new(timings.pulse_ms),
            prefs: DisplayPreferences::default(),
            is_running: false,
            in_run: false,
            origin_ms: 0,
            target_secs: 0,
            elapsed_secs: 0,
            frame: None,
            adopted: None,
            pulses_fired: 0,
        }
    }

    /// Adopt whatever the store holds. A running or paused timer carries on;
    /// it is never reset by a surface loading.
    pub fn initialize(&mut self, now_ms: i64) {
        self.prefs = self.state.preferences();
        self.reconcile(Trigger::Initial, now_ms);
        self.resync.start(now_ms);
    }

    pub fn handle_change(&mut self, change: &StoreChange, now_ms: i64) {
        match KeyClass::of(&change.key) {
            KeyClass::RunState => self.reconcile(Trigger::RunState, now_ms),
            KeyClass::Timing => self.reconcile(Trigger::Timing, now_ms),
            KeyClass::Config => self.reconcile(Trigger::Config, now_ms),
            KeyClass::Preferences => self.apply_preferences(),
            KeyClass::Preview | KeyClass::Other => {}
        }
    }

    /// Rebuild local state from the store
    pub fn reconcile(&mut self, trigger: Trigger, now_ms: i64) {
        let snapshot = TimerStateMachine::new(&self.state).snapshot();
        debug!(trigger = ?trigger, run_state = ?snapshot.run_state, "Reconciling display");
        self.adopted = Some(snapshot);

        match snapshot.run_state {
            RunState::Running => {
                self.adopt_target(trigger, snapshot.config.target_secs());
                // A lone timing write can be the first half of a pause, so only
                // a run-state change or a load may resume from `pausedElapsed`
                let may_resume = matches!(trigger, Trigger::Initial | Trigger::RunState);
                let paused_elapsed = if may_resume { snapshot.paused_elapsed } else { 0 };
                let (origin, source) = resolve_running_origin(
                    paused_elapsed,
                    snapshot.origin_ms,
                    self.local_elapsed(now_ms),
                    now_ms,
                );
                if may_resume && source != OriginSource::Stored {
                    // Publish the origin we settled on so the other surface agrees
                    info!(origin_ms = origin, source = ?source, "Display derived timer origin");
                    self.state.write_origin_ms(origin);
                    self.state.clear_paused_elapsed();
                    self.adopted = Some(TimerSnapshot {
                        origin_ms: Some(origin).filter(|origin| *origin > 0),
                        paused_elapsed: 0,
                        ..snapshot
                    });
                }
                self.origin_ms = origin;
                self.is_running = true;
                self.in_run = true;
                self.poll.start(now_ms);
                self.render_running(now_ms);
            }
            RunState::Paused => {
                let local = self.local_elapsed(now_ms);
                self.poll.cancel();
                self.is_running = false;
                self.adopt_target(trigger, snapshot.config.target_secs());
                self.in_run = true;
                self.elapsed_secs = if snapshot.paused_elapsed > 0 {
                    snapshot.paused_elapsed
                } else {
                    local
                };
                let diff = self.target_secs.saturating_sub(self.elapsed_secs);
                // Keep edge state in step, but a frozen frame never pulses
                self.edge.observe(diff);
                self.present(Frame::new(format_countdown(diff), diff < 0, false));
            }
            RunState::Stopped => {
                let was_running = self.is_running;
                self.poll.cancel();
                self.is_running = false;
                match trigger {
                    // Timing fields mean nothing while stopped
                    Trigger::Timing if self.frame.is_some() => return,
                    Trigger::RunState => {
                        self.stop_to_zero();
                        self.present(Frame::new(ZERO_PREVIEW, false, false));
                    }
                    Trigger::Initial | Trigger::Config | Trigger::Timing => {
                        self.stop_to_zero();
                        let saved = snapshot.config.target_secs();
                        self.present(Frame::new(format_countdown(saved), false, false));
                    }
                }
                if was_running {
                    info!("Display stopped");
                }
            }
        }
    }

    /// Advance the countdown if a tick is due
    pub fn tick(&mut self, now_ms: i64) {
        if self.resync.fire(now_ms) {
            self.resync_with_store(now_ms);
        }
        if self.pulse.take_expired(now_ms) {
            if let Some(frame) = self.frame.clone() {
                self.present(Frame { pulse: false, ..frame });
            }
        }
        if self.poll.fire(now_ms) && self.is_running {
            self.render_running(now_ms);
        }
    }

    /// Earliest time `tick` has work to do
    pub fn next_deadline(&self) -> Option<i64> {
        [self.poll.next_due(), self.resync.next_due(), self.pulse.deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn apply_preferences(&mut self) {
        self.prefs = self.state.preferences();
        debug!(theme = ?self.prefs.theme, font_size = self.prefs.font_size, "Applied display preferences");
        let Some(frame) = self.frame.take() else {
            return;
        };
        // Force a redraw with the new appearance
        self.present(frame);
    }

    pub fn finish(&mut self) -> Result<()> {
        self.poll.cancel();
        self.resync.cancel();
        self.sink.finish()
    }

    /// Reconcile when the store no longer matches what was last adopted.
    /// An unreachable store is left alone so the countdown keeps going.
    fn resync_with_store(&mut self, now_ms: i64) {
        let Some(adopted) = self.adopted else {
            return;
        };
        if !self.state.is_reachable() {
            return;
        }
        let current = TimerStateMachine::new(&self.state).snapshot();
        if current == adopted {
            return;
        }
        let trigger = if current.run_state != adopted.run_state {
            Trigger::RunState
        } else if current.config != adopted.config {
            Trigger::Config
        } else {
            Trigger::Timing
        };
        debug!(trigger = ?trigger, "Store drifted from the adopted state");
        self.reconcile(trigger, now_ms);
    }

    fn local_elapsed(&self, now_ms: i64) -> i64 {
        if self.is_running {
            elapsed_secs(self.origin_ms, now_ms)
        } else {
            self.elapsed_secs
        }
    }

    /// A run in progress keeps the duration it started with when only the
    /// saved config changes. Resume and Start look alike in the store, so a
    /// resume picks up whatever duration is saved by then.
    fn adopt_target(&mut self, trigger: Trigger, saved_secs: i64) {
        if trigger != Trigger::Config || !self.in_run {
            self.target_secs = saved_secs;
        }
    }

    fn stop_to_zero(&mut self) {
        self.in_run = false;
        self.elapsed_secs = 0;
        self.target_secs = 0;
        self.edge.reset();
        self.pulse.clear();
    }

    fn render_running(&mut self, now_ms: i64) {
        self.elapsed_secs = elapsed_secs(self.origin_ms, now_ms);
        let diff = self.target_secs.saturating_sub(self.elapsed_secs);
        if self.edge.observe(diff) {
            self.pulse.trigger(now_ms);
            self.pulses_fired += 1;
            info!(diff_secs = diff, pulses = self.pulses_fired, "Countdown entered overtime");
        }
        let frame = Frame::new(format_countdown(diff), diff < 0, self.pulse.is_active(now_ms));
        self.present(frame);
    }

    fn present(&mut self, frame: Frame) {
        if self.frame.as_ref() != Some(&frame) {
            if let Err(e) = self.sink.present(&frame, &self.prefs) {
                warn!(error = %e, "Failed to draw display frame");
                return;
            }
        }
        self.state.publish_rendered_preview(&frame.text);
        self.frame = Some(frame);
    }
}

#[cfg(test)]
impl<S: SharedStore, K: FrameSink> DisplayController<S, K> {
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_active()
    }

    pub fn is_overtime(&self) -> bool {
        self.frame.as_ref().is_some_and(|f| f.overtime)
    }

    pub fn pulses_fired(&self) -> u32 {
        self.pulses_fired
    }

    pub fn preferences(&self) -> &DisplayPreferences {
        &self.prefs
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::Theme;
    use crate::store::schema::keys;
    use crate::store::MemoryHub;
    use crate::store::memory::MemoryStore;
    use crate::timer::TimerConfig;
    use std::sync::mpsc::Receiver;

    const T0: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Frame>,
    }

    impl FrameSink for RecordingSink {
        fn present(&mut self, frame: &Frame, _prefs: &DisplayPreferences) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    struct Harness {
        hub: MemoryHub,
        control: SharedState<MemoryStore>,
        display: DisplayController<MemoryStore, RecordingSink>,
        changes: Receiver<StoreChange>,
    }

    impl Harness {
        fn new() -> Self {
            let hub = MemoryHub::new();
            let control = SharedState::new(hub.context());
            let state = SharedState::new(hub.context());
            let changes = state.subscribe();
            let display = DisplayController::new(state, RecordingSink::default(), &Timings::default());
            Self {
                hub,
                control,
                display,
                changes,
            }
        }

        fn machine(&self) -> TimerStateMachine<'_, MemoryStore> {
            TimerStateMachine::new(&self.control)
        }

        /// Deliver pending notifications, then tick every 100ms up to `until`
        fn run(&mut self, from: i64, until: i64) {
            self.drain(from);
            let mut now = from;
            while now <= until {
                self.display.tick(now);
                now += 100;
            }
        }

        fn drain(&mut self, now: i64) {
            while let Ok(change) = self.changes.try_recv() {
                self.display.handle_change(&change, now);
            }
        }

        fn text(&self) -> &str {
            &self.display.frame().unwrap().text
        }
    }

    #[test]
    fn test_initial_stopped_shows_saved_duration() {
        let mut h = Harness::new();
        h.control.write_timer_config(TimerConfig::new(2, 30));
        h.display.initialize(T0);

        assert_eq!(h.text(), "02:30");
        assert!(!h.display.is_polling());
        assert_eq!(h.control.rendered_preview().as_deref(), Some("02:30"));
    }

    #[test]
    fn test_five_second_scenario() {
        let mut h = Harness::new();
        h.display.initialize(T0 - 1000);
        h.machine().start(TimerConfig::new(0, 5), T0);

        h.run(T0, T0 + 4000);
        assert_eq!(h.text(), "00:01");
        assert!(!h.display.is_overtime());
        assert_eq!(h.display.pulses_fired(), 0);

        h.run(T0 + 4100, T0 + 6000);
        assert_eq!(h.text(), "-00:01");
        assert!(h.display.is_overtime());
        assert_eq!(h.display.pulses_fired(), 1);

        // Seen by the other surface as the informational mirror
        assert_eq!(h.control.rendered_preview().as_deref(), Some("-00:01"));

        h.run(T0 + 6100, T0 + 20_000);
        assert_eq!(h.display.pulses_fired(), 1);
    }

    #[test]
    fn test_pulse_visible_then_cleared() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.machine().start(TimerConfig::new(0, 1), T0);

        h.run(T0, T0 + 2000);
        let frames = &h.display.sink().frames;
        let pulsing = frames.iter().filter(|f| f.pulse).count();
        assert!(pulsing >= 1);
        let first_over = frames.iter().position(|f| f.overtime).unwrap();
        assert!(frames[first_over].pulse);

        h.run(T0 + 2100, T0 + 3500);
        assert!(!h.display.frame().unwrap().pulse);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut h = Harness::new();
        h.machine().start(TimerConfig::new(1, 0), T0);
        h.display.initialize(T0 + 12_345);
        let first = h.display.frame().cloned();
        let sink_frames = h.display.sink().frames.len();

        h.display.reconcile(Trigger::Timing, T0 + 12_345);
        assert_eq!(h.display.frame().cloned(), first);
        assert_eq!(h.display.sink().frames.len(), sink_frames);
        assert_eq!(h.text(), "00:48");
    }

    #[test]
    fn test_restart_keeps_single_loop() {
        let mut h = Harness::new();
        h.machine().start(TimerConfig::new(1, 0), T0);
        h.display.initialize(T0);
        h.display.reconcile(Trigger::RunState, T0 + 50);

        assert!(h.display.is_polling());
        assert_eq!(h.display.next_deadline(), Some(T0 + 150));
    }

    #[test]
    fn test_pause_freezes_and_resume_continues() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.machine().start(TimerConfig::new(1, 0), T0);
        h.run(T0, T0 + 10_000);

        h.machine().pause(T0 + 10_000);
        h.drain(T0 + 10_000);
        assert!(!h.display.is_polling());
        assert_eq!(h.text(), "00:50");

        h.run(T0 + 10_100, T0 + 30_000);
        assert_eq!(h.text(), "00:50");

        h.machine().resume(T0 + 30_000);
        h.run(T0 + 30_000, T0 + 40_000);
        assert_eq!(h.text(), "00:40");
    }

    #[test]
    fn test_resume_from_paused_elapsed_publishes_origin() {
        let mut h = Harness::new();
        h.control.write_timer_config(TimerConfig::new(1, 0));
        h.control.write_paused_elapsed(10);
        h.control.write_run_state(RunState::Running);

        h.display.initialize(T0);
        assert_eq!(h.text(), "00:50");
        assert_eq!(h.control.origin_ms(), Some(T0 - 10_000));
        assert_eq!(h.control.read(keys::PAUSED_ELAPSED), None);
    }

    #[test]
    fn test_pause_writes_delivered_one_by_one() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.machine().start(TimerConfig::new(1, 0), T0);
        h.drain(T0);

        // The elapsed count lands while the tag still says running
        h.control.write_paused_elapsed(10);
        h.drain(T0 + 10_000);
        assert_eq!(h.control.read(keys::PAUSED_ELAPSED).as_deref(), Some("10"));
        assert_eq!(h.control.origin_ms(), Some(T0));

        h.control.write_run_state(RunState::Paused);
        h.drain(T0 + 10_000);
        assert_eq!(h.text(), "00:50");
        assert_eq!(h.control.read(keys::PAUSED_ELAPSED).as_deref(), Some("10"));

        assert_eq!(h.machine().resume(T0 + 30_000), Some(T0 + 20_000));
        assert_eq!(h.machine().snapshot().diff_secs(T0 + 30_000), Some(50));
    }

    #[test]
    fn test_huge_paused_elapsed_does_not_overflow() {
        let mut h = Harness::new();
        h.control.write_timer_config(TimerConfig::new(1, 0));
        h.control.write_paused_elapsed(i64::MAX);
        h.control.write_run_state(RunState::Running);

        h.display.initialize(T0);
        assert!(h.display.is_overtime());
        h.run(T0, T0 + 1000);
        assert!(h.display.is_running());
    }

    #[test]
    fn test_tick_catches_up_without_notifications() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.machine().start(TimerConfig::new(1, 0), T0);
        h.drain(T0);

        // Pause lands in the store but its notifications never do
        h.machine().pause(T0 + 10_000);
        while h.changes.try_recv().is_ok() {}
        let mut now = T0 + 10_000;
        while now <= T0 + 12_000 {
            h.display.tick(now);
            now += 100;
        }
        assert_eq!(h.text(), "00:50");
        assert!(!h.display.is_polling());

        h.machine().reset();
        while h.changes.try_recv().is_ok() {}
        while now <= T0 + 14_000 {
            h.display.tick(now);
            now += 100;
        }
        assert_eq!(h.text(), "00:00");
    }

    #[test]
    fn test_resume_picks_up_saved_duration() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.machine().start(TimerConfig::new(1, 0), T0);
        h.run(T0, T0 + 10_000);
        h.machine().pause(T0 + 10_000);
        h.drain(T0 + 10_000);

        h.control.write_timer_config(TimerConfig::new(2, 0));
        h.drain(T0 + 15_000);
        assert_eq!(h.text(), "00:50");

        h.machine().resume(T0 + 20_000);
        h.drain(T0 + 20_000);
        assert_eq!(h.text(), "01:50");
    }

    #[test]
    fn test_running_without_origin_does_not_crash() {
        let mut h = Harness::new();
        h.control.write_timer_config(TimerConfig::new(0, 30));
        h.control.write_run_state(RunState::Running);

        h.display.initialize(T0);
        assert_eq!(h.text(), "00:30");
        assert!(h.display.is_running());
        assert_eq!(h.control.origin_ms(), Some(T0));
    }

    #[test]
    fn test_stop_shows_zero_and_clears_overtime() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.machine().start(TimerConfig::new(0, 2), T0);
        h.run(T0, T0 + 4000);
        assert!(h.display.is_overtime());

        h.machine().reset();
        h.drain(T0 + 4000);
        assert_eq!(h.text(), "00:00");
        assert!(!h.display.is_overtime());
        assert!(!h.display.is_polling());

        // A new run pulses again on its own crossing
        h.machine().start(TimerConfig::new(0, 1), T0 + 5000);
        h.run(T0 + 5000, T0 + 7000);
        assert_eq!(h.display.pulses_fired(), 2);
    }

    #[test]
    fn test_config_change_while_stopped_updates_preview() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.control.write_timer_config(TimerConfig::new(3, 15));
        h.drain(T0);
        assert_eq!(h.text(), "03:15");
    }

    #[test]
    fn test_save_while_running_keeps_old_duration() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.machine().start(TimerConfig::new(1, 0), T0);
        h.run(T0, T0 + 5000);
        assert_eq!(h.text(), "00:55");

        h.control.write_timer_config(TimerConfig::new(2, 0));
        h.run(T0 + 5000, T0 + 6000);
        assert_eq!(h.text(), "00:54");

        // The next start picks the new duration up
        h.machine().start(TimerConfig::new(2, 0), T0 + 7000);
        h.drain(T0 + 7000);
        assert_eq!(h.text(), "02:00");
    }

    #[test]
    fn test_preference_change_reapplied() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.control.write_theme(Theme::Dark);
        h.control.write_font_size(250.0, T0);
        h.drain(T0);

        assert_eq!(h.display.preferences().theme, Theme::Dark);
        assert_eq!(h.display.preferences().font_size, 200.0);
        // Appearance change redraws the same text
        let frames = &h.display.sink().frames;
        assert!(frames.len() >= 2);
        assert_eq!(frames[frames.len() - 1], frames[0]);
    }

    #[test]
    fn test_store_unavailable_keeps_rendering() {
        let mut h = Harness::new();
        h.display.initialize(T0);
        h.machine().start(TimerConfig::new(0, 10), T0);
        h.drain(T0);
        h.hub.set_available(false);

        h.run(T0, T0 + 3000);
        assert_eq!(h.text(), "00:07");
        h.display.reconcile(Trigger::RunState, T0 + 3000);
        assert_eq!(h.text(), "00:00");
    }
}
