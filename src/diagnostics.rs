//! Runtime diagnostics.
//!
//! Counters for the things that go wrong without faulting the pack:
//! rejected transitions, skipped ticks, dropped bus messages.  Also keeps
//! a small ring of the most recent critical-fault latches so a bench tool
//! can see what tripped without scraping logs.

use heapless::Deque;
use serde::Serialize;

use crate::timer::Millis;

/// Latch records retained.
pub const FAULT_HISTORY_SLOTS: usize = 8;

/// One critical-fault latch: when, and the mask at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub at_ms: Millis,
    pub mask: u32,
}

/// Counters collected by the controller and the bus queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    /// Completed control ticks.
    pub ticks: u64,
    /// Ticks skipped because the pack lock timed out.
    pub lock_timeouts: u32,
    /// Transition requests the matrix refused.
    pub rejected_transitions: u32,
    /// Outgoing bus messages dropped on a full queue.
    pub queue_drops: u32,
    /// Times the critical mask went from clear to set.
    pub fault_latches: u32,
    #[serde(skip)]
    history: Deque<FaultRecord, FAULT_HISTORY_SLOTS>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a latch and push it into the history ring, evicting the
    /// oldest record when full.
    pub fn record_fault_latch(&mut self, at_ms: Millis, mask: u32) {
        self.fault_latches = self.fault_latches.saturating_add(1);
        if self.history.is_full() {
            self.history.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.history.push_back(FaultRecord { at_ms, mask });
    }

    /// Latch history, oldest first.
    pub fn fault_history(&self) -> impl Iterator<Item = &FaultRecord> {
        self.history.iter()
    }

    /// Reset every counter and the history.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Install a panic hook that logs the panic reason before the default
/// handler runs.  Call once during startup, after the logger.
pub fn install_panic_handler() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        log::error!("PANIC: {reason}");
        default_hook(info);
    }));
}
