//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per event to
//! the `log` facade.  Fault-timer chatter goes out at `debug` so a 10 Hz
//! loop does not flood the console.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::error::FaultCode;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | state={} ({} ticks) | I={:.1}A | ocv={:.3}..{:.3}V (d={:.3}) | \
                     charger={} charging={} balancing={} | crit=0x{:05X} noncrit=0x{:05X} code={}",
                    t.state.name(),
                    t.ticks_in_state,
                    t.pack_current,
                    t.min_ocv,
                    t.max_ocv,
                    t.delta_ocv,
                    t.charger_connected,
                    t.charging_enabled,
                    t.balancing_cells,
                    t.fault_code_crit,
                    t.fault_code_noncrit,
                    t.fault_display_code,
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            AppEvent::TransitionRejected { from, to } => {
                warn!("STATE | rejected {} -> {}", from.name(), to.name());
            }
            AppEvent::FaultTimer(e) => {
                debug!("FTIMER | {:?} {} value={:.3}", e.kind, e.code, e.value);
            }
            AppEvent::FaultLatched(mask) => {
                for code in FaultCode::iter_set(*mask) {
                    info!("FAULT | latched: {code}");
                }
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all critical faults cleared");
            }
            AppEvent::LockTimeout => {
                warn!("LOCK | pack lock timeout, tick skipped");
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state.name());
            }
        }
    }
}
