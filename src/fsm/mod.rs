//! Pack state machine engine.
//!
//! Four states, each with an `init` hook (runs once on entry), a
//! `handle` hook (runs every tick while resident) and, for `Charging`, an
//! `exit` hook.  Dispatch is a flat `match` over the closed [`StateId`]
//! enum in [`states`].
//!
//! ```text
//!  BOOT ──[charger]──▶ CHARGING ◀──▶ READY ◀──[no charger]── BOOT
//!                          │            │
//!                          └──▶ FAULTED ◀┘      (any state, critical fault)
//!                                  │
//!                     [crit faults cleared]──▶ BOOT
//! ```
//!
//! Every transition is checked against [`TRANSITION_MATRIX`].  Illegal
//! requests leave the state untouched; they are logged and counted so a
//! logic error shows up in diagnostics.

pub mod context;
pub mod states;

use context::FsmContext;
use log::{info, warn};

use crate::app::ports::OutputPort;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all pack operating states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum StateId {
    Boot = 0,
    Ready = 1,
    Charging = 2,
    Faulted = 3,
}

impl StateId {
    /// Total number of states; sizes the transition matrix.
    pub const COUNT: usize = 4;

    pub const ALL: [StateId; Self::COUNT] =
        [Self::Boot, Self::Ready, Self::Charging, Self::Faulted];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Boot => "Boot",
            Self::Ready => "Ready",
            Self::Charging => "Charging",
            Self::Faulted => "Faulted",
        }
    }

    /// Whether `self -> to` is a legal transition.
    pub const fn can_transition_to(self, to: StateId) -> bool {
        TRANSITION_MATRIX[self.index()][to.index()]
    }
}

// ---------------------------------------------------------------------------
// Transition matrix
// ---------------------------------------------------------------------------

/// `TRANSITION_MATRIX[from][to]`.
pub const TRANSITION_MATRIX: [[bool; StateId::COUNT]; StateId::COUNT] = [
    //          Boot   Ready  Charging Faulted
    /* Boot */ [true, true, true, true],
    /* Ready */ [false, true, true, true],
    /* Charging */ [false, true, true, true],
    /* Faulted */ [true, false, false, true],
];

/// Result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target was the current state.
    Stayed,
    /// The matrix forbids the move; state unchanged.
    Rejected { from: StateId, to: StateId },
    /// The target's `init` ran and it is now current.
    Moved { from: StateId, to: StateId },
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The state machine engine.
///
/// The current state itself lives in the pack snapshot
/// (`PackSnapshot::current_state`) so that telemetry and the analytics
/// thread see it; the engine only tracks how long it has been there.
#[derive(Debug, Default)]
pub struct Fsm {
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `target` if legal: run exit/init hooks, then update the
    /// snapshot's current state.
    pub fn request_transition<O: OutputPort>(
        &mut self,
        ctx: &mut FsmContext<'_, O>,
        target: StateId,
    ) -> Transition {
        let from = ctx.pack.current_state;
        if from == target {
            return Transition::Stayed;
        }
        if !from.can_transition_to(target) {
            warn!(
                "FSM transition rejected: {} -> {}",
                from.name(),
                target.name()
            );
            return Transition::Rejected { from, to: target };
        }

        info!("FSM transition: {} -> {}", from.name(), target.name());
        states::exit(from, ctx);
        states::init(target, ctx);
        ctx.pack.current_state = target;
        self.state_entry_tick = self.tick_count;
        Transition::Moved { from, to: target }
    }

    /// Run the current state's handler and apply any transition it asks
    /// for.
    pub fn tick<O: OutputPort>(&mut self, ctx: &mut FsmContext<'_, O>) -> Transition {
        self.tick_count += 1;
        match states::handle(ctx.pack.current_state, ctx) {
            Some(next) => self.request_transition(ctx, next),
            None => Transition::Stayed,
        }
    }

    /// How many ticks since the current state was entered.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }
}
