use chrono::{DateTime, TimeDelta, Utc};

/// Fixed-window counter for one (limiter, client) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

impl RateWindow {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    pub fn is_elapsed(&self, window: TimeDelta, now: DateTime<Utc>) -> bool {
        now - self.window_start >= window
    }

    /// Reset when the window has elapsed, then count one request.
    pub fn hit(&mut self, window: TimeDelta, now: DateTime<Utc>) {
        if self.is_elapsed(window, now) {
            *self = Self::start(now);
        }
        self.count = self.count.saturating_add(1);
    }

    /// Count as seen by a read that must not advance it.
    pub fn effective_count(&self, window: TimeDelta, now: DateTime<Utc>) -> u32 {
        if self.is_elapsed(window, now) {
            0
        } else {
            self.count
        }
    }

    /// Time until the window resets, never negative.
    pub fn remaining(&self, window: TimeDelta, now: DateTime<Utc>) -> TimeDelta {
        let left = self.window_start + window - now;
        left.max(TimeDelta::zero())
    }
}

/// Whole seconds a rejected client must wait, rounded up, at least 1.
pub fn retry_after_secs(remaining: TimeDelta) -> u64 {
    let millis = remaining.num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_hit_increments_inside_window() {
        let window = TimeDelta::minutes(1);
        let mut w = RateWindow::start(t0());
        w.hit(window, t0());
        w.hit(window, t0() + TimeDelta::seconds(30));
        assert_eq!(w.count, 2);
        assert_eq!(w.window_start, t0());
    }

    #[test]
    fn test_hit_resets_at_window_boundary() {
        let window = TimeDelta::minutes(1);
        let mut w = RateWindow::start(t0());
        w.hit(window, t0());
        w.hit(window, t0());
        w.hit(window, t0() + window);
        assert_eq!(w.count, 1);
        assert_eq!(w.window_start, t0() + window);
    }

    #[test]
    fn test_effective_count_ignores_elapsed_window() {
        let window = TimeDelta::minutes(15);
        let mut w = RateWindow::start(t0());
        w.hit(window, t0());
        assert_eq!(w.effective_count(window, t0() + TimeDelta::minutes(5)), 1);
        assert_eq!(w.effective_count(window, t0() + window), 0);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(TimeDelta::milliseconds(1)), 1);
        assert_eq!(retry_after_secs(TimeDelta::milliseconds(1500)), 2);
        assert_eq!(retry_after_secs(TimeDelta::seconds(60)), 60);
        assert_eq!(retry_after_secs(TimeDelta::zero()), 1);
    }
}
