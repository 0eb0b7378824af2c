//! Fault evaluation engine.
//!
//! The engine runs **every tick before the state machine**, in every
//! state (including `Faulted`), over a fixed table of [`FaultRule`]s.
//! Each rule compares one or two live snapshot quantities against limits
//! and owns a debounce [`Timer`]:
//!
//! ```text
//!  timer  present   result     side effect
//!  ─────  ───────   ───────    ─────────────────────────────
//!  off    no        None       -
//!  off    yes       None       start timer      (debouncing)
//!  on     no        Cleared    cancel timer
//!  on     yes       None       -                (not expired yet)
//!  exp    yes       Faulted    -                (standing fault)
//! ```
//!
//! A condition has to hold continuously for the whole window; any dropout
//! cancels the timer.  On `Faulted` the rule's code is OR-ed into the
//! critical or non-critical mask, on `Cleared` it is removed.
//!
//! Rules are built once with their operand *bindings*; each tick only the
//! operand values are refreshed from the snapshot.

use heapless::Vec;
use log::{debug, error, info};

use crate::app::events::{AppEvent, FaultTimerEvent, FaultTimerKind};
use crate::app::ports::EventSink;
use crate::config::BmsConfig;
use crate::error::FaultCode;
use crate::pack::PackSnapshot;
use crate::timer::{Millis, Timer};

/// Capacity of the fault table.
pub const MAX_FAULT_RULES: usize = 16;

// ---------------------------------------------------------------------------
// Operators and operands
// ---------------------------------------------------------------------------

/// Comparison applied as `data <op> limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Neq,
    /// Secondary condition unused; the rule is single-condition.
    None,
}

impl FaultOp {
    /// Evaluate `data <op> limit`.  `None` never holds.
    pub fn holds(self, data: f32, limit: f32) -> bool {
        match self {
            Self::Gt => data > limit,
            Self::Lt => data < limit,
            Self::Ge => data >= limit,
            Self::Le => data <= limit,
            Self::Eq => data == limit,
            Self::Neq => data != limit,
            Self::None => false,
        }
    }
}

/// Where an operand's value comes from.
#[derive(Clone, Copy)]
pub enum Operand {
    /// Read from the live snapshot each tick.
    Pack(fn(&PackSnapshot) -> f32),
    /// Fixed at table construction (usually a configuration limit).
    Const(f32),
}

impl Operand {
    fn read(&self, pack: &PackSnapshot) -> f32 {
        match self {
            Self::Pack(f) => f(pack),
            Self::Const(v) => *v,
        }
    }
}

impl core::fmt::Debug for Operand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pack(_) => f.write_str("Pack(..)"),
            Self::Const(v) => write!(f, "Const({v})"),
        }
    }
}

/// Per-rule outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStatus {
    None,
    Faulted,
    Cleared,
}

// ---------------------------------------------------------------------------
// FaultRule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Binding {
    data: Operand,
    limit: Operand,
}

/// One row of the fault table.
#[derive(Debug, Clone)]
pub struct FaultRule {
    pub id: &'static str,
    pub timer: Timer,

    pub data_1: f32,
    pub op_1: FaultOp,
    pub lim_1: f32,

    pub data_2: f32,
    pub op_2: FaultOp,
    pub lim_2: f32,

    pub timeout_ms: u32,
    pub code: FaultCode,
    pub is_critical: bool,

    primary: Binding,
    secondary: Binding,
    /// Set once the debounce window has elapsed; drives the one-shot
    /// "faulted" notification.
    latched: bool,
}

impl FaultRule {
    /// A critical single-condition rule.  Chain [`when`](Self::when),
    /// [`and`](Self::and) and [`non_critical`](Self::non_critical).
    pub fn new(id: &'static str, code: FaultCode, timeout_ms: u32) -> Self {
        let unused = Binding {
            data: Operand::Const(0.0),
            limit: Operand::Const(0.0),
        };
        Self {
            id,
            timer: Timer::new(),
            data_1: 0.0,
            op_1: FaultOp::None,
            lim_1: 0.0,
            data_2: 0.0,
            op_2: FaultOp::None,
            lim_2: 0.0,
            timeout_ms,
            code,
            is_critical: true,
            primary: unused,
            secondary: unused,
            latched: false,
        }
    }

    /// Primary condition.
    pub fn when(mut self, data: Operand, op: FaultOp, limit: Operand) -> Self {
        self.op_1 = op;
        self.primary = Binding { data, limit };
        self
    }

    /// Secondary condition, AND-ed with the primary.
    pub fn and(mut self, data: Operand, op: FaultOp, limit: Operand) -> Self {
        self.op_2 = op;
        self.secondary = Binding { data, limit };
        self
    }

    /// Report through the non-critical mask only.
    pub fn non_critical(mut self) -> Self {
        self.is_critical = false;
        self
    }

    /// Copy the current operand values out of the snapshot.
    pub fn refresh(&mut self, pack: &PackSnapshot) {
        self.data_1 = self.primary.data.read(pack);
        self.lim_1 = self.primary.limit.read(pack);
        if self.op_2 != FaultOp::None {
            self.data_2 = self.secondary.data.read(pack);
            self.lim_2 = self.secondary.limit.read(pack);
        }
    }

    /// Whether the fault condition holds on the current operands.
    pub fn is_present(&self) -> bool {
        let condition_1 = self.op_1.holds(self.data_1, self.lim_1);
        let single = self.op_2 == FaultOp::None;
        let condition_2 = !single && self.op_2.holds(self.data_2, self.lim_2);
        condition_1 && (condition_2 || single)
    }

    /// Run the debounce state machine for this rule.
    ///
    /// Timer start, first expiry and clear are reported to `sink` as
    /// [`AppEvent::FaultTimer`] with the primary operand's value.
    pub fn evaluate(&mut self, now: Millis, sink: &mut impl EventSink) -> FaultStatus {
        let present = self.is_present();

        if !self.timer.is_active() {
            if present {
                self.timer.start(now, self.timeout_ms);
                debug!("fault timer started: {} ({})", self.id, self.data_1);
                self.notify(FaultTimerKind::Started, sink);
            }
            return FaultStatus::None;
        }

        if !present {
            self.timer.cancel();
            self.latched = false;
            self.notify(FaultTimerKind::Cleared, sink);
            return FaultStatus::Cleared;
        }

        if self.timer.is_expired(now) {
            if !self.latched {
                self.latched = true;
                self.notify(FaultTimerKind::Faulted, sink);
            }
            return FaultStatus::Faulted;
        }

        FaultStatus::None
    }

    /// `true` while the rule holds a standing fault.
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Take over the debounce progress of `old`, so a rebuilt rule keeps
    /// its running timer and can still clear a fault it already raised.
    pub fn carry_state_from(&mut self, old: &FaultRule) {
        self.timer = old.timer;
        self.latched = old.latched;
    }

    fn notify(&self, kind: FaultTimerKind, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::FaultTimer(FaultTimerEvent {
            kind,
            code: self.code,
            value: self.data_1,
        }));
    }
}

// ---------------------------------------------------------------------------
// FaultTable
// ---------------------------------------------------------------------------

/// The fixed rule set, evaluated in full every tick.
#[derive(Debug, Clone)]
pub struct FaultTable {
    rules: Vec<FaultRule, MAX_FAULT_RULES>,
}

impl FaultTable {
    /// Build the standard pack fault table from `config`.
    pub fn new(config: &BmsConfig) -> Self {
        Self::from_rules(build_fault_table(config))
    }

    /// Build a table from explicit rules.  Rules past
    /// [`MAX_FAULT_RULES`] are dropped with an error log.
    pub fn from_rules(rules: impl IntoIterator<Item = FaultRule>) -> Self {
        let mut table = Vec::new();
        for rule in rules {
            if let Err(rule) = table.push(rule) {
                error!("fault table full, rule '{}' dropped", rule.id);
            }
        }
        Self { rules: table }
    }

    /// Rebuild the standard table for new limits, keeping each rule's
    /// timer and latch.
    pub fn reconfigure(&mut self, config: &BmsConfig) {
        let mut fresh = Self::new(config);
        for (new, old) in fresh.rules.iter_mut().zip(self.rules.iter()) {
            new.carry_state_from(old);
        }
        *self = fresh;
    }

    pub fn rules(&self) -> &[FaultRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Refresh every rule from `pack`, evaluate it, and apply the result
    /// to the pack's fault masks.  Returns the critical mask.
    ///
    /// Several rules may report the same code (over-voltage has a
    /// charging and an idle limit).  A bit is only removed when no other
    /// rule with that code is latched or still seeing its condition, so
    /// handing over from one rule to the other never clears the fault.
    pub fn evaluate_all(
        &mut self,
        pack: &mut PackSnapshot,
        now: Millis,
        sink: &mut impl EventSink,
    ) -> u32 {
        let mut statuses: Vec<FaultStatus, MAX_FAULT_RULES> = Vec::new();
        for rule in &mut self.rules {
            rule.refresh(pack);
            // Same capacity as `rules`, cannot overflow.
            let _ = statuses.push(rule.evaluate(now, sink));
        }

        for (idx, (rule, status)) in self.rules.iter().zip(&statuses).enumerate() {
            let mask = if rule.is_critical {
                &mut pack.fault_code_crit
            } else {
                &mut pack.fault_code_noncrit
            };

            match status {
                FaultStatus::Faulted => {
                    if *mask & rule.code.mask() == 0 {
                        error!(
                            "FAULT SET: {} [{}] value={:.3} limit={:.3}",
                            rule.id, rule.code, rule.data_1, rule.lim_1
                        );
                    }
                    *mask |= rule.code.mask();
                }
                FaultStatus::Cleared => {
                    if self.code_held_elsewhere(idx) {
                        debug!("fault {} handed over, {} still active", rule.id, rule.code);
                    } else {
                        if *mask & rule.code.mask() != 0 {
                            info!("FAULT CLEARED: {} [{}]", rule.id, rule.code);
                        }
                        *mask &= !rule.code.mask();
                    }
                }
                FaultStatus::None => {}
            }
        }
        pack.fault_code_crit
    }

    /// Whether a rule other than `idx`, reporting the same code through
    /// the same mask, is latched or has its condition present.
    fn code_held_elsewhere(&self, idx: usize) -> bool {
        let rule = &self.rules[idx];
        self.rules.iter().enumerate().any(|(i, other)| {
            i != idx
                && other.code == rule.code
                && other.is_critical == rule.is_critical
                && (other.is_latched() || other.is_present())
        })
    }
}

/// The standard rule set.
pub fn build_fault_table(c: &BmsConfig) -> [FaultRule; 8] {
    use FaultCode as Code;
    use FaultOp::{Eq, Gt, Lt};
    use Operand::{Const, Pack};

    fn charger(p: &PackSnapshot) -> f32 {
        f32::from(u8::from(p.is_charger_connected))
    }

    [
        FaultRule::new(
            "Discharge Current Limit",
            Code::DischargeLimitEnforcement,
            c.over_current_ms,
        )
        .when(Pack(|p| p.pack_current), Gt, Pack(|p| p.cont_discharge_limit)),
        FaultRule::new(
            "Charge Current Limit",
            Code::ChargeLimitEnforcement,
            c.over_charge_current_ms,
        )
        .when(Pack(|p| -p.pack_current), Gt, Pack(|p| p.cont_charge_limit))
        .and(Pack(|p| p.pack_current), Lt, Const(0.0)),
        FaultRule::new("Low Cell Voltage", Code::CellVoltageTooLow, c.under_volt_ms)
            .when(Pack(|p| p.min_voltage.val), Lt, Const(c.min_cell_voltage)),
        FaultRule::new(
            "High Cell Voltage (charging)",
            Code::CellVoltageTooHigh,
            c.over_volt_charge_ms,
        )
        .when(Pack(|p| p.max_voltage.val), Gt, Const(c.max_charge_voltage_fault))
        .and(Pack(charger), Eq, Const(1.0)),
        FaultRule::new("High Cell Voltage", Code::CellVoltageTooHigh, c.over_volt_ms)
            .when(Pack(|p| p.max_voltage.val), Gt, Const(c.max_cell_voltage))
            .and(Pack(charger), Eq, Const(0.0)),
        FaultRule::new("High Temp", Code::PackTooHot, c.high_temp_ms)
            .when(Pack(|p| p.max_temp.val), Gt, Const(c.max_cell_temp_c)),
        FaultRule::new("Extremely Low Voltage", Code::LowCellVoltage, c.low_cell_ms)
            .when(Pack(|p| p.min_voltage.val), Lt, Const(c.extremely_low_cell_voltage)),
        FaultRule::new("Die Temp Maximum", Code::DieTempMaximum, c.chip_temp_ms)
            .when(Pack(|p| p.max_chip_temp.val), Gt, Const(c.max_chip_temp_c))
            .non_critical(),
    ]
}
