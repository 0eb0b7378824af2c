//! Hardware fault line.
//!
//! The BMS holds the vehicle shutdown circuit open through a dedicated
//! GPIO.  [`FaultRelay`] drives any `embedded-hal` output pin and only
//! touches it when the requested level changes.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use log::{error, info};

/// Fault line driver over an `embedded-hal` output pin.
pub struct FaultRelay<P: OutputPin> {
    pin: P,
    /// Pin level that means "fault asserted".
    active_high: bool,
    asserted: Option<bool>,
}

impl<P: OutputPin> FaultRelay<P> {
    pub fn new(pin: P, active_high: bool) -> Self {
        Self {
            pin,
            active_high,
            asserted: None,
        }
    }

    /// Assert or release the fault line.  Pin errors are logged and the
    /// next call retries.
    pub fn set(&mut self, asserted: bool) {
        if self.asserted == Some(asserted) {
            return;
        }
        let high = asserted == self.active_high;
        let res = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match res {
            Ok(()) => {
                info!(
                    "Fault line {}",
                    if asserted { "ASSERTED" } else { "released" }
                );
                self.asserted = Some(asserted);
            }
            Err(e) => {
                error!("Fault line write failed: {e:?}");
                self.asserted = None;
            }
        }
    }

    /// Last level successfully written, if any.
    pub fn is_asserted(&self) -> Option<bool> {
        self.asserted
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}

/// In-memory pin for host runs and tests.
#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
    writes: u32,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}
