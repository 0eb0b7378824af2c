//! Debounce / hysteresis timer.
//!
//! A [`Timer`] is either inactive or armed with a deadline.  It never
//! clears itself: once the deadline passes it reports "expired" on every
//! query until the owner cancels or restarts it.  Callers must check both
//! [`Timer::is_active`] and [`Timer::is_expired`] when the distinction
//! matters.
//!
//! Time is passed in explicitly as [`Millis`] from the environment's
//! monotonic clock (see [`Clock`](crate::app::ports::Clock)), so the timer
//! itself is deterministic and trivially testable.
//!
//! ```text
//!   start(now, d)            now >= deadline
//!  INACTIVE ────────▶ ARMED ─────────────────▶ EXPIRED (still active)
//!     ▲                 │                          │
//!     └──── cancel() ───┴──────── cancel() ────────┘
//! ```

/// Milliseconds on the monotonic control clock.
pub type Millis = u64;

/// Countdown timer with an explicit clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Millis>,
}

impl Timer {
    /// An inactive timer.
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer at `now + duration_ms`.  Restarting an armed timer
    /// replaces its deadline.
    pub fn start(&mut self, now: Millis, duration_ms: u32) {
        self.deadline = Some(now.saturating_add(Millis::from(duration_ms)));
    }

    /// Disarm without side effects.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// `true` only if armed and the deadline has been reached.
    pub fn is_expired(&self, now: Millis) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    /// Armed and still counting down.
    pub fn is_running(&self, now: Millis) -> bool {
        self.is_active() && !self.is_expired(now)
    }

    /// Milliseconds left before expiry; zero when expired or inactive.
    pub fn remaining_ms(&self, now: Millis) -> Millis {
        self.deadline.map_or(0, |d| d.saturating_sub(now))
    }
}
