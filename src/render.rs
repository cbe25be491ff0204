//! Countdown text formatting and the overtime pulse

/// Format remaining seconds as `MM:SS`, with a leading `-` in overtime
pub fn format_countdown(diff_secs: i64) -> String {
    let sign = if diff_secs < 0 { "-" } else { "" };
    let abs = diff_secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 60, abs % 60)
}

/// One rendered state of a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
    pub overtime: bool,
    pub pulse: bool,
}

impl Frame {
    pub fn new(text: impl Into<String>, overtime: bool, pulse: bool) -> Self {
        Self {
            text: text.into(),
            overtime,
            pulse,
        }
    }
}

/// Detects the frame on which a countdown first goes negative
#[derive(Debug, Default)]
pub struct OvertimeEdge {
    was_overtime: bool,
}

impl OvertimeEdge {
    /// Feed the next diff. Returns true only on the transition into overtime.
    pub fn observe(&mut self, diff_secs: i64) -> bool {
        let now_overtime = diff_secs < 0;
        let crossed = now_overtime && !self.was_overtime;
        self.was_overtime = now_overtime;
        crossed
    }

    #[cfg(test)]
    pub fn is_overtime(&self) -> bool {
        self.was_overtime
    }

    pub fn reset(&mut self) {
        self.was_overtime = false;
    }
}

/// Fire-and-forget visual effect that switches itself off
#[derive(Debug)]
pub struct Pulse {
    duration_ms: i64,
    until_ms: Option<i64>,
}

impl Pulse {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms: duration_ms as i64,
            until_ms: None,
        }
    }

    pub fn trigger(&mut self, now_ms: i64) {
        self.until_ms = Some(now_ms + self.duration_ms);
    }

    pub fn is_active(&self, now_ms: i64) -> bool {
        self.until_ms.is_some_and(|until| now_ms < until)
    }

    /// True once, on the first call after the effect has run out
    pub fn take_expired(&mut self, now_ms: i64) -> bool {
        match self.until_ms {
            Some(until) if now_ms >= until => {
                self.until_ms = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<i64> {
        self.until_ms
    }

    pub fn clear(&mut self) {
        self.until_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(5), "00:05");
        assert_eq!(format_countdown(120), "02:00");
        assert_eq!(format_countdown(5999), "99:59");
        assert_eq!(format_countdown(6000), "100:00");
        assert_eq!(format_countdown(-1), "-00:01");
        assert_eq!(format_countdown(-125), "-02:05");
    }

    #[test]
    fn test_format_configured_durations() {
        for minutes in [0i64, 1, 9, 10, 59, 99] {
            for seconds in [0i64, 1, 30, 59] {
                let text = format_countdown(minutes * 60 + seconds);
                assert_eq!(text, format!("{minutes:02}:{seconds:02}"));
            }
        }
    }

    #[test]
    fn test_pulse_fires_once_per_crossing() {
        let mut edge = OvertimeEdge::default();
        let fired: Vec<bool> = [1, 0, -1, -2, -1].iter().map(|d| edge.observe(*d)).collect();
        assert_eq!(fired, vec![false, false, true, false, false]);
        assert!(edge.is_overtime());
    }

    #[test]
    fn test_edge_rearms_after_leaving_overtime() {
        let mut edge = OvertimeEdge::default();
        assert!(edge.observe(-1));
        assert!(!edge.observe(3));
        assert!(edge.observe(-1));

        edge.reset();
        assert!(!edge.is_overtime());
        assert!(edge.observe(-5));
    }

    #[test]
    fn test_pulse_expires() {
        let mut pulse = Pulse::new(900);
        assert!(!pulse.is_active(0));

        pulse.trigger(5000);
        assert!(pulse.is_active(5000));
        assert!(pulse.is_active(5899));
        assert!(!pulse.take_expired(5899));
        assert!(!pulse.is_active(5900));
        assert!(pulse.take_expired(5900));
        assert!(!pulse.take_expired(6000));
        assert_eq!(pulse.deadline(), None);
    }
}
