//! Inbound commands to the controller.
//!
//! These represent actions requested by the outside world (charger
//! detection on the bus, a bench tool, a config reload) that the
//! [`BmsController`](super::service::BmsController) interprets and acts upon.

use crate::config::BmsConfig;
use crate::fsm::StateId;

/// Commands that external adapters can send into the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// The charger announced itself on the bus.  Latches for the session.
    ChargerDetected,

    /// Ask for a state change (bench/testing).  Still subject to the
    /// transition matrix.
    RequestState(StateId),

    /// Hot-reload configuration.  Rejected if it fails validation.
    UpdateConfig(BmsConfig),

    /// Reset the diagnostics counters.
    ClearDiagnostics,
}
