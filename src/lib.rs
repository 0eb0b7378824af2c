//! Battery management decision core.
//!
//! Each control tick runs the fault table over the shared pack snapshot,
//! forces the state machine into `Faulted` on any critical fault, then
//! lets the current state decide charging, balancing and the limits
//! advertised to the motor controller.  Acquisition and analytics live
//! outside this crate; it only reads their results from the snapshot.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod balancing;
pub mod charging;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fsm;
pub mod pack;
pub mod safety;
pub mod timer;

pub use error::{Error, FaultCode, Result};
