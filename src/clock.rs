//! Wall clock access for the surface loops

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time in epoch milliseconds
pub fn now_ms() -> i64 {
    // A clock before 1970 reads as the epoch
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// How long to block until `deadline_ms`, never longer than `max_ms`
pub fn wait_until(deadline_ms: Option<i64>, max_ms: u64) -> Duration {
    wait_between(now_ms(), deadline_ms, max_ms)
}

fn wait_between(now_ms: i64, deadline_ms: Option<i64>, max_ms: u64) -> Duration {
    let max = max_ms as i64;
    let ms = deadline_ms.map_or(max, |deadline| (deadline - now_ms).clamp(0, max));
    Duration::from_millis(ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_wait_between() {
        assert_eq!(wait_between(1000, None, 250), Duration::from_millis(250));
        assert_eq!(wait_between(1000, Some(1040), 250), Duration::from_millis(40));
        assert_eq!(wait_between(1000, Some(900), 250), Duration::ZERO);
        assert_eq!(wait_between(1000, Some(5000), 250), Duration::from_millis(250));
    }
}
