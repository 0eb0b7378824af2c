//! Charging admission controller.
//!
//! Charging runs in intervals separated by zero-current rests so the
//! terminal voltage can relax toward true OCV before it is trusted again,
//! and so the charger relay is not chattered.
//!
//! ```text
//!            interval timer expired
//!  CHARGING ───────────────────────▶ RESTING
//!     ▲                                 │
//!     └──── settle timer expired ───────┘
//! ```
//!
//! [`ChargeAdmission::may_charge`] both answers and advances this cycle,
//! so it must be called at most once per tick.

use crate::config::BmsConfig;
use crate::pack::PackSnapshot;
use crate::timer::{Millis, Timer};

/// Two-timer hysteresis gate for charge current.
#[derive(Debug, Clone, Default)]
pub struct ChargeAdmission {
    /// How long charging may continue before a forced rest.
    countdown: Timer,
    /// How long the pack must rest before charging resumes.
    settle: Timer,
    interval_ms: u32,
    settle_ms: u32,
}

impl ChargeAdmission {
    pub fn new(config: &BmsConfig) -> Self {
        Self {
            countdown: Timer::new(),
            settle: Timer::new(),
            interval_ms: config.charge_interval_ms,
            settle_ms: config.charge_settle_ms,
        }
    }

    /// Pick up new interval lengths.  Running timers keep their deadlines.
    pub fn reconfigure(&mut self, config: &BmsConfig) {
        self.interval_ms = config.charge_interval_ms;
        self.settle_ms = config.charge_settle_ms;
    }

    /// Decide whether charge current may flow this tick.
    pub fn may_charge(&mut self, charger_connected: bool, now: Millis) -> bool {
        if !charger_connected {
            return false;
        }

        if self.settle.is_running(now) {
            return false;
        }

        if self.countdown.is_active() {
            if self.countdown.is_expired(now) {
                // Interval used up: rest, and start a fresh interval after.
                self.countdown.cancel();
                self.settle.start(now, self.settle_ms);
                return false;
            }
            return true;
        }

        self.countdown.start(now, self.interval_ms);
        true
    }

    /// Inside the post-charge rest window.
    pub fn is_settling(&self, now: Millis) -> bool {
        self.settle.is_running(now)
    }

    /// Forget the previous session: no pending rest, and the next
    /// `may_charge` arms a full interval.
    pub fn reset(&mut self) {
        self.countdown.cancel();
        self.settle.cancel();
    }

    pub fn countdown(&self) -> &Timer {
        &self.countdown
    }

    pub fn settle(&self) -> &Timer {
        &self.settle
    }
}

/// Whether cell balancing should run this tick.
///
/// Requires a connected charger, a top cell above the balancing floor, an
/// OCV spread above the minimum delta, and the pack not resting after a
/// charge interval.
pub fn should_balance(
    pack: &PackSnapshot,
    config: &BmsConfig,
    admission: &ChargeAdmission,
    now: Millis,
) -> bool {
    pack.is_charger_connected
        && pack.max_ocv.val > config.balance_min_voltage
        && pack.delta_ocv > config.balance_min_delta
        && !admission.is_settling(now)
}
