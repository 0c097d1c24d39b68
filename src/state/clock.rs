//! Countdown handle owned by a room and driven by the room task's one-second ticker.

/// Value emitted by a single tick of a running [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    /// Remaining seconds to broadcast for this tick.
    pub shown: i64,
    /// Set once the countdown has dropped below zero.
    pub expired: bool,
}

/// Server-authoritative countdown.
///
/// The clock never schedules anything itself: the owning room task calls
/// [`Clock::tick`] once per second while [`Clock::is_running`] holds. Cancelling
/// is a plain flag flip, so it is idempotent and leaves nothing behind that
/// could fire after the room has moved on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    remaining: i64,
    running: bool,
}

impl Clock {
    /// Restart the countdown from `seconds`.
    pub fn start(&mut self, seconds: i64) {
        self.remaining = seconds;
        self.running = true;
    }

    /// Continue counting from the current remaining value.
    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Stop ticking, keeping the remaining value so the clock can resume later.
    pub fn cancel(&mut self) {
        self.running = false;
    }

    /// Stop ticking and pin the remaining value.
    pub fn suspend_at(&mut self, remaining: i64) {
        self.remaining = remaining;
        self.running = false;
    }

    /// Whether the owner should keep ticking.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seconds the next tick will show.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Report the current value and count down by one second.
    pub fn tick(&mut self) -> Option<ClockTick> {
        if !self.running {
            return None;
        }

        let shown = self.remaining;
        self.remaining -= 1;
        Some(ClockTick {
            shown,
            expired: self.remaining == -1,
        })
    }
}
