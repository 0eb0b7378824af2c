//! Per-tick context handed to state hooks.

use crate::app::ports::OutputPort;
use crate::charging::ChargeAdmission;
use crate::config::BmsConfig;
use crate::pack::PackSnapshot;
use crate::timer::{Millis, Timer};

/// Everything a state hook may read or touch during one tick.
///
/// Built fresh by the controller while it holds the pack lock; the
/// borrows end with the tick.
pub struct FsmContext<'a, O: OutputPort> {
    /// Snapshot under lock.  Hooks own the control-decision fields.
    pub pack: &'a mut PackSnapshot,
    pub config: &'a BmsConfig,
    /// Tick timestamp.  All timers in this tick compare against it.
    pub now: Millis,
    /// Interval/rest hysteresis for charge current.
    pub admission: &'a mut ChargeAdmission,
    /// Rate limit for charger enable commands.
    pub charge_cmd_timer: &'a mut Timer,
    pub out: &'a mut O,
}
