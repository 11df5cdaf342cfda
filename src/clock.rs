use chrono::{DateTime, NaiveDateTime, Utc};

/// Source of wall-clock time, in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

/// Wall clock backed by the host's system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Detects forward crossings of a whole-second boundary.
///
/// Every observation replaces the stored second. Only a strictly greater
/// reading fires, so a clock stepped backwards is absorbed silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondEdge {
    last: i64,
}

impl SecondEdge {
    pub fn new(start: i64) -> Self {
        Self { last: start }
    }

    #[cfg(test)]
    fn last(&self) -> i64 {
        self.last
    }

    /// Record `now`; on a forward edge, return the second that just ended.
    pub fn observe(&mut self, now: i64) -> Option<i64> {
        let ended = (now > self.last).then_some(self.last);
        self.last = now;
        ended
    }
}

/// Calendar rendering of an already offset-adjusted timestamp.
pub fn wall_time(adjusted: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(adjusted, 0).map(|dt| dt.naive_utc())
}
