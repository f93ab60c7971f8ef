//! Tick cadence and link watchdog.
//!
//! All times are milliseconds since engine start, supplied by the
//! caller. Keeping the clock outside makes the watchdog deterministic
//! under test.

#[derive(Debug)]
pub struct HeartbeatScheduler {
    tick_period_ms: u64,
    watchdog_deadline_ms: u64,
    next_tick_ms: u64,
    last_inbound_ms: Option<u64>,
}

impl HeartbeatScheduler {
    pub fn new(tick_period_ms: u64, watchdog_deadline_ms: u64) -> Self {
        Self {
            tick_period_ms,
            watchdog_deadline_ms,
            next_tick_ms: 0,
            last_inbound_ms: None,
        }
    }

    /// True when a control tick is due. Advances the schedule so a late
    /// caller is not asked to run a burst of catch-up ticks.
    pub fn tick_due(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_tick_ms {
            return false;
        }
        self.next_tick_ms = now_ms + self.tick_period_ms;
        true
    }

    /// Record a valid inbound message, rearming the watchdog.
    pub fn note_inbound(&mut self, now_ms: u64) {
        self.last_inbound_ms = Some(now_ms);
    }

    /// Restart the watchdog window without an inbound message, used
    /// when a peer first connects.
    pub fn reset_watchdog(&mut self, now_ms: u64) {
        self.last_inbound_ms = Some(now_ms);
    }

    /// True when the watchdog deadline has elapsed since the last
    /// inbound message. Never fires before any window has been started.
    pub fn watchdog_expired(&self, now_ms: u64) -> bool {
        match self.last_inbound_ms {
            Some(last) => now_ms.saturating_sub(last) > self.watchdog_deadline_ms,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_fires_immediately() {
        let mut sched = HeartbeatScheduler::new(200, 600);
        assert!(sched.tick_due(0));
        assert!(!sched.tick_due(100));
        assert!(sched.tick_due(200));
    }

    #[test]
    fn late_tick_does_not_burst() {
        let mut sched = HeartbeatScheduler::new(200, 600);
        assert!(sched.tick_due(0));
        // Caller stalled for several periods; only one catch-up tick.
        assert!(sched.tick_due(900));
        assert!(!sched.tick_due(1000));
        assert!(sched.tick_due(1100));
    }

    #[test]
    fn watchdog_idle_until_first_window() {
        let sched = HeartbeatScheduler::new(200, 600);
        assert!(!sched.watchdog_expired(10_000));
    }

    #[test]
    fn watchdog_expires_after_deadline() {
        let mut sched = HeartbeatScheduler::new(200, 600);
        sched.note_inbound(1_000);
        assert!(!sched.watchdog_expired(1_600));
        assert!(sched.watchdog_expired(1_601));
        sched.note_inbound(1_700);
        assert!(!sched.watchdog_expired(2_200));
    }
}
